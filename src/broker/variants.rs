//! Broker variants
//!
//! A variant is the full configuration of one integration context: its
//! behavior table, capability set, wire command names, side effects and
//! channel. Variants are plain data. A derived variant is its parent's
//! tables with a [`VariantOverrides`] applied, resolved once when the
//! variant is registered.

use crate::broker::behavior::{Behavior, BehaviorRegistry};
use crate::broker::capabilities::{self, CapabilitySet};
use crate::broker::error::{BrokerError, BrokerResult};
use crate::broker::types::{Command, Hook};
use crate::channel::{ChannelKind, DEFAULT_WEB_CHANNEL_ID};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

pub const BASE: &str = "base";
pub const WEB: &str = "web";
pub const FX_SYNC: &str = "fx-sync";
pub const FX_DESKTOP_V1: &str = "fx-desktop-v1";
pub const FX_SYNC_WEB_CHANNEL: &str = "fx-sync-web-channel";
pub const FX_FENNEC_V1: &str = "fx-fennec-v1";
pub const OAUTH: &str = "oauth";

/// Work a hook performs before handing back its behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    /// Tell the browser the page finished loading
    NotifyLoaded,
    /// Ask the browser whether this account may be linked; refusal aborts
    CheckCanLinkAccount,
    /// Send the login message, sync defaults injected first
    NotifyLogin,
    NotifyPasswordChange,
    NotifyAccountDeleted,
    NotifyOAuthLogin,
}

impl SideEffect {
    /// Logical command the side effect sends
    pub fn command(&self) -> Command {
        match self {
            SideEffect::NotifyLoaded => Command::Loaded,
            SideEffect::CheckCanLinkAccount => Command::CanLinkAccount,
            SideEffect::NotifyLogin => Command::Login,
            SideEffect::NotifyPasswordChange => Command::ChangePassword,
            SideEffect::NotifyAccountDeleted => Command::DeleteAccount,
            SideEffect::NotifyOAuthLogin => Command::OAuthLogin,
        }
    }
}

/// Changes a derived variant makes to its parent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantOverrides {
    #[serde(rename = "type")]
    pub type_name: String,
    pub parent: Option<String>,
    pub behaviors: BTreeMap<Hook, Behavior>,
    pub capabilities: BTreeMap<String, bool>,
    pub commands: BTreeMap<Command, String>,
    pub side_effects: BTreeMap<Hook, Vec<SideEffect>>,
    pub channel: Option<ChannelKind>,
}

impl VariantOverrides {
    pub fn new(type_name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            parent: Some(parent.into()),
            ..Self::default()
        }
    }

    pub fn behavior(mut self, hook: Hook, behavior: Behavior) -> Self {
        self.behaviors.insert(hook, behavior);
        self
    }

    pub fn capability(mut self, name: &str, value: bool) -> Self {
        self.capabilities.insert(name.to_string(), value);
        self
    }

    pub fn command(mut self, command: Command, wire_name: impl Into<String>) -> Self {
        self.commands.insert(command, wire_name.into());
        self
    }

    pub fn side_effects(mut self, hook: Hook, effects: Vec<SideEffect>) -> Self {
        self.side_effects.insert(hook, effects);
        self
    }

    pub fn channel(mut self, channel: ChannelKind) -> Self {
        self.channel = Some(channel);
        self
    }

    fn parent_name(&self) -> &str {
        self.parent.as_deref().unwrap_or(BASE)
    }
}

/// Resolved configuration of one integration context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerVariant {
    type_name: String,
    parent: Option<String>,
    behaviors: BehaviorRegistry,
    capabilities: CapabilitySet,
    commands: BTreeMap<Command, String>,
    side_effects: BTreeMap<Hook, Vec<SideEffect>>,
    channel: ChannelKind,
}

impl BrokerVariant {
    /// The root variant every other one derives from
    pub fn base() -> Self {
        Self {
            type_name: BASE.to_string(),
            parent: None,
            behaviors: BehaviorRegistry::base(),
            capabilities: CapabilitySet::base(),
            commands: BTreeMap::new(),
            side_effects: BTreeMap::new(),
            channel: ChannelKind::None,
        }
    }

    /// Apply `overrides` on top of this variant
    pub fn derive(&self, overrides: &VariantOverrides) -> Self {
        let mut commands = self.commands.clone();
        commands.extend(overrides.commands.iter().map(|(c, w)| (*c, w.clone())));

        let mut side_effects = self.side_effects.clone();
        side_effects.extend(overrides.side_effects.iter().map(|(h, e)| (*h, e.clone())));

        Self {
            type_name: overrides.type_name.clone(),
            parent: Some(self.type_name.clone()),
            behaviors: self
                .behaviors
                .with_overrides(overrides.behaviors.iter().map(|(h, b)| (*h, b.clone()))),
            capabilities: self.capabilities.with_overrides(
                overrides
                    .capabilities
                    .iter()
                    .map(|(name, value)| (name.clone(), *value)),
            ),
            commands,
            side_effects,
            channel: overrides.channel.clone().unwrap_or_else(|| self.channel.clone()),
        }
    }

    /// The variant's `type` tag
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn behavior(&self, hook: Hook) -> Arc<Behavior> {
        self.behaviors.get(hook)
    }

    pub fn behaviors(&self) -> &BehaviorRegistry {
        &self.behaviors
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.has_capability(name)
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Wire name the embedding browser understands for `command`
    pub fn wire_command(&self, command: Command) -> Option<&str> {
        self.commands.get(&command).map(String::as_str)
    }

    pub fn commands(&self) -> &BTreeMap<Command, String> {
        &self.commands
    }

    pub fn side_effects(&self, hook: Hook) -> &[SideEffect] {
        self.side_effects.get(&hook).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn channel(&self) -> &ChannelKind {
        &self.channel
    }
}

/// Factory of variants keyed by `type`
#[derive(Debug, Clone)]
pub struct VariantRegistry {
    variants: HashMap<String, Arc<BrokerVariant>>,
}

impl VariantRegistry {
    /// Registry holding only the base variant
    pub fn empty() -> Self {
        let mut variants = HashMap::new();
        variants.insert(BASE.to_string(), Arc::new(BrokerVariant::base()));
        Self { variants }
    }

    /// Registry holding every built-in integration
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for overrides in builtin_overrides() {
            // Built-ins are listed parent first.
            if let Err(e) = registry.register(&overrides) {
                log::error!("Failed to register built-in variant {}: {}", overrides.type_name, e);
            }
        }
        registry
    }

    /// Resolve `overrides` against its parent and add it
    pub fn register(&mut self, overrides: &VariantOverrides) -> BrokerResult<Arc<BrokerVariant>> {
        if self.variants.contains_key(&overrides.type_name) {
            return Err(BrokerError::DuplicateVariant(overrides.type_name.clone()));
        }
        let parent = self.variants.get(overrides.parent_name()).ok_or_else(|| {
            BrokerError::unknown_parent(&overrides.type_name, overrides.parent_name())
        })?;
        let variant = Arc::new(parent.derive(overrides));
        log::debug!(
            "Registered broker variant {} (parent {})",
            variant.type_name(),
            overrides.parent_name()
        );
        self.variants
            .insert(overrides.type_name.clone(), variant.clone());
        Ok(variant)
    }

    /// Register several variants in any order; parents are resolved first.
    /// On error the registry is left unchanged.
    pub fn register_all(&mut self, all: &[VariantOverrides]) -> BrokerResult<()> {
        let by_name: HashMap<&str, &VariantOverrides> =
            all.iter().map(|o| (o.type_name.as_str(), o)).collect();
        let mut scratch = self.clone();
        let mut done: HashSet<&str> = HashSet::new();

        for overrides in all {
            let mut chain: Vec<&VariantOverrides> = Vec::new();
            let mut seen: HashSet<&str> = HashSet::new();
            let mut cursor = Some(overrides);
            while let Some(current) = cursor {
                if done.contains(current.type_name.as_str()) {
                    break;
                }
                if !seen.insert(current.type_name.as_str()) {
                    return Err(BrokerError::InheritanceCycle(current.type_name.clone()));
                }
                chain.push(current);
                cursor = by_name.get(current.parent_name()).copied();
            }
            for pending in chain.into_iter().rev() {
                scratch.register(pending)?;
                done.insert(pending.type_name.as_str());
            }
        }
        *self = scratch;
        Ok(())
    }

    pub fn get(&self, type_name: &str) -> BrokerResult<Arc<BrokerVariant>> {
        self.variants
            .get(type_name)
            .cloned()
            .ok_or_else(|| BrokerError::UnknownVariant(type_name.to_string()))
    }

    /// Registered type names, sorted
    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.variants.keys().cloned().collect();
        types.sort();
        types
    }
}

impl Default for VariantRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

const ACCOUNT_VERIFIED: &str = "Account verified successfully";
const PASSWORD_RESET: &str = "Password reset successfully";

fn web_channel() -> ChannelKind {
    ChannelKind::WebChannel {
        id: DEFAULT_WEB_CHANNEL_ID.to_string(),
    }
}

fn builtin_overrides() -> Vec<VariantOverrides> {
    let settings_after_verify = Behavior::navigate_with_success("settings", ACCOUNT_VERIFIED);

    let web = VariantOverrides::new(WEB, BASE)
        .behavior(
            Hook::AfterCompleteResetPassword,
            Behavior::navigate_with_success("settings", PASSWORD_RESET),
        )
        .behavior(
            Hook::AfterCompleteSignIn,
            Behavior::if_signed_in(Behavior::navigate("settings")),
        )
        .behavior(
            Hook::AfterCompleteSignUp,
            Behavior::if_signed_in(Behavior::navigate("settings")),
        )
        .behavior(Hook::AfterForceAuth, Behavior::navigate("settings"))
        .behavior(Hook::AfterResetPasswordConfirmationPoll, settings_after_verify.clone())
        .behavior(Hook::AfterSignIn, Behavior::navigate("settings"))
        .behavior(Hook::AfterSignInConfirmationPoll, settings_after_verify.clone())
        .behavior(Hook::AfterSignUpConfirmationPoll, settings_after_verify)
        .capability(capabilities::REUSE_EXISTING_SESSION, true);

    let fx_sync = VariantOverrides::new(FX_SYNC, BASE)
        .capability(capabilities::BROWSER_TRANSITIONS_AFTER_EMAIL_VERIFICATION, true)
        .capability(capabilities::CHOOSE_WHAT_TO_SYNC_CHECKBOX, true)
        .side_effects(Hook::AfterLoaded, vec![SideEffect::NotifyLoaded])
        .side_effects(Hook::BeforeSignIn, vec![SideEffect::CheckCanLinkAccount])
        .side_effects(Hook::AfterSignIn, vec![SideEffect::NotifyLogin])
        .side_effects(Hook::AfterForceAuth, vec![SideEffect::NotifyLogin])
        .side_effects(Hook::BeforeSignUpConfirmationPoll, vec![SideEffect::NotifyLogin])
        .side_effects(Hook::AfterChangePassword, vec![SideEffect::NotifyPasswordChange])
        .side_effects(Hook::AfterDeleteAccount, vec![SideEffect::NotifyAccountDeleted]);

    // about:accounts shows its own screens after these steps.
    let fx_desktop_v1 = VariantOverrides::new(FX_DESKTOP_V1, FX_SYNC)
        .channel(ChannelKind::FxDesktopV1)
        .command(Command::CanLinkAccount, "can_link_account")
        .command(Command::ChangePassword, "change_password")
        .command(Command::DeleteAccount, "delete_account")
        .command(Command::Loaded, "loaded")
        .command(Command::Login, "login")
        .behavior(Hook::AfterForceAuth, Behavior::Halt)
        .behavior(Hook::AfterResetPasswordConfirmationPoll, Behavior::Halt)
        .behavior(Hook::AfterSignIn, Behavior::Halt)
        .behavior(Hook::AfterSignInConfirmationPoll, Behavior::Halt)
        .behavior(Hook::AfterSignUpConfirmationPoll, Behavior::Halt)
        // No WebChannel, so the verifying tab cannot reach about:accounts.
        // The login message has to come from the polling tab.
        .side_effects(
            Hook::AfterResetPasswordConfirmationPoll,
            vec![SideEffect::NotifyLogin],
        );

    // Login after a reset is sent from the tab that completed the reset.
    let fx_sync_web_channel = VariantOverrides::new(FX_SYNC_WEB_CHANNEL, FX_SYNC)
        .channel(web_channel())
        .command(Command::CanLinkAccount, "fxaccounts:can_link_account")
        .command(Command::ChangePassword, "fxaccounts:change_password")
        .command(Command::DeleteAccount, "fxaccounts:delete_account")
        .command(Command::Loaded, "fxaccounts:loaded")
        .command(Command::Login, "fxaccounts:login")
        .side_effects(Hook::AfterCompleteResetPassword, vec![SideEffect::NotifyLogin]);

    let fx_fennec_v1 = VariantOverrides::new(FX_FENNEC_V1, FX_SYNC_WEB_CHANNEL)
        .capability(capabilities::BROWSER_TRANSITIONS_AFTER_EMAIL_VERIFICATION, false)
        .capability(capabilities::CHOOSE_WHAT_TO_SYNC_CHECKBOX, false)
        .capability(capabilities::CHOOSE_WHAT_TO_SYNC_WEB_V1, true)
        .capability(capabilities::EMAIL_VERIFICATION_MARKETING_SNIPPET, false);

    let oauth_login = vec![SideEffect::NotifyOAuthLogin];
    let oauth = VariantOverrides::new(OAUTH, BASE)
        .channel(web_channel())
        .command(Command::Loaded, "fxaccounts:loaded")
        .command(Command::OAuthLogin, "fxaccounts:oauth_login")
        .capability(capabilities::REUSE_EXISTING_SESSION, true)
        .side_effects(Hook::AfterLoaded, vec![SideEffect::NotifyLoaded])
        .side_effects(Hook::AfterSignIn, oauth_login.clone())
        .side_effects(Hook::AfterForceAuth, oauth_login.clone())
        .side_effects(Hook::AfterSignInConfirmationPoll, oauth_login.clone())
        .side_effects(Hook::AfterSignUpConfirmationPoll, oauth_login.clone())
        .side_effects(Hook::AfterCompleteSignIn, oauth_login.clone())
        .side_effects(Hook::AfterCompleteSignUp, oauth_login)
        .behavior(Hook::AfterSignIn, Behavior::Halt)
        .behavior(Hook::AfterForceAuth, Behavior::Halt)
        .behavior(Hook::AfterSignInConfirmationPoll, Behavior::Halt)
        .behavior(Hook::AfterSignUpConfirmationPoll, Behavior::Halt)
        .behavior(Hook::AfterCompleteSignIn, Behavior::Halt)
        .behavior(Hook::AfterCompleteSignUp, Behavior::Halt);

    vec![
        web,
        fx_sync,
        fx_desktop_v1,
        fx_sync_web_channel,
        fx_fennec_v1,
        oauth,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_types() {
        let registry = VariantRegistry::builtin();
        assert_eq!(
            registry.types(),
            vec![
                BASE,
                FX_DESKTOP_V1,
                FX_FENNEC_V1,
                FX_SYNC,
                FX_SYNC_WEB_CHANNEL,
                OAUTH,
                WEB
            ]
        );
    }

    #[test]
    fn test_every_variant_resolves_every_hook() {
        let registry = VariantRegistry::builtin();
        for type_name in registry.types() {
            let variant = registry.get(&type_name).unwrap();
            assert_eq!(variant.behaviors().iter().count(), Hook::ALL.len(), "{}", type_name);
            for hook in Hook::ALL {
                // Evaluating must not panic for any hook.
                let _ = variant.behavior(hook).evaluate(false);
            }
        }
    }

    #[test]
    fn test_desktop_v1_inherits_sync_side_effects() {
        let registry = VariantRegistry::builtin();
        let desktop = registry.get(FX_DESKTOP_V1).unwrap();
        assert_eq!(desktop.parent(), Some(FX_SYNC));
        assert_eq!(desktop.side_effects(Hook::AfterSignIn), &[SideEffect::NotifyLogin]);
        assert_eq!(
            desktop.side_effects(Hook::AfterResetPasswordConfirmationPoll),
            &[SideEffect::NotifyLogin]
        );
        assert_eq!(*desktop.behavior(Hook::AfterSignIn), Behavior::Halt);
        assert_eq!(desktop.wire_command(Command::Login), Some("login"));
        assert_eq!(desktop.channel(), &ChannelKind::FxDesktopV1);
    }

    #[test]
    fn test_web_channel_variants_do_not_login_from_reset_poll() {
        let registry = VariantRegistry::builtin();
        for type_name in [FX_SYNC_WEB_CHANNEL, FX_FENNEC_V1] {
            let variant = registry.get(type_name).unwrap();
            assert!(variant.side_effects(Hook::AfterResetPasswordConfirmationPoll).is_empty());
            assert_eq!(
                variant.side_effects(Hook::AfterCompleteResetPassword),
                &[SideEffect::NotifyLogin]
            );
            assert_eq!(variant.wire_command(Command::Login), Some("fxaccounts:login"));
        }
    }

    #[test]
    fn test_fennec_capability_overrides() {
        let registry = VariantRegistry::builtin();
        let parent = registry.get(FX_SYNC_WEB_CHANNEL).unwrap();
        let fennec = registry.get(FX_FENNEC_V1).unwrap();
        let overridden = [
            (capabilities::BROWSER_TRANSITIONS_AFTER_EMAIL_VERIFICATION, false),
            (capabilities::CHOOSE_WHAT_TO_SYNC_CHECKBOX, false),
            (capabilities::CHOOSE_WHAT_TO_SYNC_WEB_V1, true),
            (capabilities::EMAIL_VERIFICATION_MARKETING_SNIPPET, false),
        ];
        for (name, _) in parent.capabilities().iter() {
            let expected = overridden
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| *v)
                .unwrap_or_else(|| parent.has_capability(name));
            assert_eq!(fennec.has_capability(name), expected, "{}", name);
        }
    }

    #[test]
    fn test_register_rejects_unknown_parent_and_duplicates() {
        let mut registry = VariantRegistry::builtin();
        let orphan = VariantOverrides::new("orphan", "missing");
        assert_eq!(
            registry.register(&orphan).unwrap_err(),
            BrokerError::unknown_parent("orphan", "missing")
        );
        let again = VariantOverrides::new(WEB, BASE);
        assert_eq!(
            registry.register(&again).unwrap_err(),
            BrokerError::DuplicateVariant(WEB.to_string())
        );
    }

    #[test]
    fn test_register_all_resolves_parents_first() {
        let mut registry = VariantRegistry::builtin();
        let child = VariantOverrides::new("fx-ios-v1", "fx-ios-base")
            .capability(capabilities::SIGNUP, false);
        let parent = VariantOverrides::new("fx-ios-base", FX_SYNC_WEB_CHANNEL)
            .behavior(Hook::AfterSignIn, Behavior::Halt);
        registry.register_all(&[child, parent]).unwrap();

        let ios = registry.get("fx-ios-v1").unwrap();
        assert_eq!(ios.parent(), Some("fx-ios-base"));
        assert!(!ios.has_capability(capabilities::SIGNUP));
        assert_eq!(*ios.behavior(Hook::AfterSignIn), Behavior::Halt);
        assert_eq!(ios.wire_command(Command::Login), Some("fxaccounts:login"));
    }

    #[test]
    fn test_register_all_detects_cycles() {
        let mut registry = VariantRegistry::builtin();
        let a = VariantOverrides::new("a", "b");
        let b = VariantOverrides::new("b", "a");
        assert!(matches!(
            registry.register_all(&[a, b]).unwrap_err(),
            BrokerError::InheritanceCycle(_)
        ));
    }

    #[test]
    fn test_register_all_failure_leaves_registry_unchanged() {
        let mut registry = VariantRegistry::builtin();
        let before = registry.types();
        let good = VariantOverrides::new("partner", WEB);
        let child = VariantOverrides::new("partner-child", "partner");
        let orphan = VariantOverrides::new("orphan", "missing");

        assert_eq!(
            registry.register_all(&[good, child, orphan]).unwrap_err(),
            BrokerError::unknown_parent("orphan", "missing")
        );
        assert_eq!(registry.types(), before);
        assert!(registry.get("partner").is_err());
    }

    #[test]
    fn test_overrides_from_toml() {
        let overrides: VariantOverrides = toml::from_str(
            r#"
            type = "partner"
            parent = "web"

            [capabilities]
            signup = false

            [behaviors.afterSignIn]
            kind = "halt"

            [side_effects]
            afterSignIn = ["notify_login"]
            "#,
        )
        .unwrap();
        assert_eq!(overrides.type_name, "partner");
        assert_eq!(overrides.behaviors[&Hook::AfterSignIn], Behavior::Halt);
        assert_eq!(
            overrides.side_effects[&Hook::AfterSignIn],
            vec![SideEffect::NotifyLogin]
        );
    }
}
