//! Broker Data Types

use crate::broker::error::{BrokerError, BrokerResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Value used for `customizeSync` when the account does not carry one
pub const DEFAULT_CUSTOMIZE_SYNC: bool = false;

/// Lifecycle events the view layer reports to the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Hook {
    AfterLoaded,
    BeforeSignIn,
    AfterSignIn,
    AfterSignUp,
    AfterForceAuth,
    BeforeSignUpConfirmationPoll,
    AfterSignInConfirmationPoll,
    AfterSignUpConfirmationPoll,
    AfterResetPasswordConfirmationPoll,
    AfterCompleteSignIn,
    AfterCompleteSignUp,
    AfterCompleteResetPassword,
    AfterChangePassword,
    AfterDeleteAccount,
}

impl Hook {
    /// Every hook, in declaration order
    pub const ALL: [Hook; 14] = [
        Hook::AfterLoaded,
        Hook::BeforeSignIn,
        Hook::AfterSignIn,
        Hook::AfterSignUp,
        Hook::AfterForceAuth,
        Hook::BeforeSignUpConfirmationPoll,
        Hook::AfterSignInConfirmationPoll,
        Hook::AfterSignUpConfirmationPoll,
        Hook::AfterResetPasswordConfirmationPoll,
        Hook::AfterCompleteSignIn,
        Hook::AfterCompleteSignUp,
        Hook::AfterCompleteResetPassword,
        Hook::AfterChangePassword,
        Hook::AfterDeleteAccount,
    ];

    /// Name the view layer uses for the hook
    pub fn as_str(&self) -> &'static str {
        match self {
            Hook::AfterLoaded => "afterLoaded",
            Hook::BeforeSignIn => "beforeSignIn",
            Hook::AfterSignIn => "afterSignIn",
            Hook::AfterSignUp => "afterSignUp",
            Hook::AfterForceAuth => "afterForceAuth",
            Hook::BeforeSignUpConfirmationPoll => "beforeSignUpConfirmationPoll",
            Hook::AfterSignInConfirmationPoll => "afterSignInConfirmationPoll",
            Hook::AfterSignUpConfirmationPoll => "afterSignUpConfirmationPoll",
            Hook::AfterResetPasswordConfirmationPoll => "afterResetPasswordConfirmationPoll",
            Hook::AfterCompleteSignIn => "afterCompleteSignIn",
            Hook::AfterCompleteSignUp => "afterCompleteSignUp",
            Hook::AfterCompleteResetPassword => "afterCompleteResetPassword",
            Hook::AfterChangePassword => "afterChangePassword",
            Hook::AfterDeleteAccount => "afterDeleteAccount",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Hook {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hook::ALL
            .iter()
            .copied()
            .find(|hook| hook.as_str() == s)
            .ok_or_else(|| BrokerError::UnknownHook(s.to_string()))
    }
}

/// Logical messages a broker may send to the embedding browser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Command {
    #[serde(rename = "can_link_account")]
    CanLinkAccount,
    #[serde(rename = "change_password")]
    ChangePassword,
    #[serde(rename = "delete_account")]
    DeleteAccount,
    #[serde(rename = "loaded")]
    Loaded,
    #[serde(rename = "login")]
    Login,
    #[serde(rename = "oauth_login")]
    OAuthLogin,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::CanLinkAccount => "can_link_account",
            Command::ChangePassword => "change_password",
            Command::DeleteAccount => "delete_account",
            Command::Loaded => "loaded",
            Command::Login => "login",
            Command::OAuthLogin => "oauth_login",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of the account an operation just completed for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Account {
    pub email: String,
    pub uid: Option<String>,
    pub session_token: Option<String>,
    pub key_fetch_token: Option<String>,
    pub unwrap_b_key: Option<String>,
    pub verified: bool,
    /// Whether the user asked to choose what to sync
    pub customize_sync: Option<bool>,
    pub declined_sync_engines: Option<Vec<String>>,
}

impl Account {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn verified(mut self, verified: bool) -> Self {
        self.verified = verified;
        self
    }

    pub fn with_customize_sync(mut self, customize_sync: bool) -> Self {
        self.customize_sync = Some(customize_sync);
        self
    }

    /// Copy of the account with sync defaults filled in where absent
    pub fn with_sync_defaults(&self) -> Account {
        let mut account = self.clone();
        if account.customize_sync.is_none() {
            log::debug!("customizeSync not set for {}, using default", account.email);
            account.customize_sync = Some(DEFAULT_CUSTOMIZE_SYNC);
        }
        account
    }
}

/// Body of the `login` message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_fetch_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unwrap_b_key: Option<String>,
    pub verified: bool,
    pub customize_sync: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declined_sync_engines: Option<Vec<String>>,
}

impl LoginPayload {
    /// Build the payload. The browser drops a login message without
    /// `customizeSync`, so the account must carry one.
    pub fn from_account(account: &Account) -> BrokerResult<Self> {
        let customize_sync = account
            .customize_sync
            .ok_or(BrokerError::MissingLoginField("customizeSync"))?;
        Ok(Self {
            email: account.email.clone(),
            uid: account.uid.clone(),
            session_token: account.session_token.clone(),
            key_fetch_token: account.key_fetch_token.clone(),
            unwrap_b_key: account.unwrap_b_key.clone(),
            verified: account.verified,
            customize_sync,
            declined_sync_engines: account.declined_sync_engines.clone(),
        })
    }
}

/// What the user did before an OAuth login notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthAction {
    Signin,
    Signup,
    ForceAuth,
}

impl OAuthAction {
    /// Action reported for `hook`
    pub fn for_hook(hook: Hook) -> Self {
        match hook {
            Hook::AfterSignUp | Hook::AfterSignUpConfirmationPoll | Hook::AfterCompleteSignUp => {
                OAuthAction::Signup
            }
            Hook::AfterForceAuth => OAuthAction::ForceAuth,
            _ => OAuthAction::Signin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_names_round_trip() {
        for hook in Hook::ALL {
            assert_eq!(hook.as_str().parse::<Hook>().unwrap(), hook);
            let json = serde_json::to_string(&hook).unwrap();
            assert_eq!(json, format!("\"{}\"", hook.as_str()));
        }
        assert_eq!(
            "afterNothing".parse::<Hook>().unwrap_err(),
            BrokerError::UnknownHook("afterNothing".to_string())
        );
    }

    #[test]
    fn test_command_wire_defaults() {
        assert_eq!(
            serde_json::to_string(&Command::OAuthLogin).unwrap(),
            "\"oauth_login\""
        );
        assert_eq!(Command::CanLinkAccount.to_string(), "can_link_account");
    }

    #[test]
    fn test_login_payload_requires_customize_sync() {
        let account = Account::new("a@b.c").with_uid("uid").verified(true);
        assert_eq!(
            LoginPayload::from_account(&account).unwrap_err(),
            BrokerError::MissingLoginField("customizeSync")
        );

        let payload = LoginPayload::from_account(&account.with_sync_defaults()).unwrap();
        assert!(!payload.customize_sync);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["customizeSync"], false);
        assert_eq!(json["uid"], "uid");
        assert!(json.get("sessionToken").is_none());
    }

    #[test]
    fn test_sync_defaults_keep_existing_choice() {
        let account = Account::new("a@b.c").with_customize_sync(true);
        assert_eq!(account.with_sync_defaults().customize_sync, Some(true));
    }

    #[test]
    fn test_account_deserializes_with_missing_fields() {
        let account: Account = serde_json::from_str(r#"{"email": "a@b.c", "verified": true}"#).unwrap();
        assert_eq!(account.email, "a@b.c");
        assert!(account.verified);
        assert_eq!(account.customize_sync, None);
    }

    #[test]
    fn test_oauth_action_for_hook() {
        assert_eq!(OAuthAction::for_hook(Hook::AfterSignIn), OAuthAction::Signin);
        assert_eq!(OAuthAction::for_hook(Hook::AfterCompleteSignUp), OAuthAction::Signup);
        assert_eq!(OAuthAction::for_hook(Hook::AfterForceAuth), OAuthAction::ForceAuth);
    }
}
