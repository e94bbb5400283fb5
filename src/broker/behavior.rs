//! Behavior descriptors
//!
//! A behavior is the view's reaction to a lifecycle hook. Behaviors are
//! plain immutable data shared between every broker of a variant; the view
//! turns one into a [`Transition`] with [`Behavior::evaluate`].

use crate::broker::types::Hook;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Reaction to a lifecycle hook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Behavior {
    /// Nothing further to do
    Null,
    /// Stop here, the embedding browser shows its own UI
    Halt,
    /// Move to `route`, optionally flashing a success message
    Navigate {
        route: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        success: Option<String>,
    },
    /// Run `wrapped` when the user is signed in, otherwise `otherwise`
    ConditionalNavigate {
        wrapped: Box<Behavior>,
        #[serde(default = "null_behavior")]
        otherwise: Box<Behavior>,
    },
}

fn null_behavior() -> Box<Behavior> {
    Box::new(Behavior::Null)
}

impl Behavior {
    pub fn navigate(route: impl Into<String>) -> Self {
        Behavior::Navigate {
            route: route.into(),
            success: None,
        }
    }

    pub fn navigate_with_success(route: impl Into<String>, success: impl Into<String>) -> Self {
        Behavior::Navigate {
            route: route.into(),
            success: Some(success.into()),
        }
    }

    /// Conditional behavior that does nothing when signed out
    pub fn if_signed_in(wrapped: Behavior) -> Self {
        Behavior::ConditionalNavigate {
            wrapped: Box::new(wrapped),
            otherwise: null_behavior(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Behavior::Null => "null",
            Behavior::Halt => "halt",
            Behavior::Navigate { .. } => "navigate",
            Behavior::ConditionalNavigate { .. } => "conditional_navigate",
        }
    }

    /// Resolve to the UI transition the view performs
    pub fn evaluate(&self, signed_in: bool) -> Transition {
        match self {
            Behavior::Null => Transition::Stay,
            Behavior::Halt => Transition::Halt,
            Behavior::Navigate { route, success } => Transition::Navigate {
                route: route.clone(),
                success: success.clone(),
            },
            Behavior::ConditionalNavigate { wrapped, otherwise } => {
                if signed_in {
                    wrapped.evaluate(signed_in)
                } else {
                    otherwise.evaluate(signed_in)
                }
            }
        }
    }
}

/// What the view does with a behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum Transition {
    /// Remain on the current screen
    Stay,
    /// Remain on the current screen and let the browser take over
    Halt,
    Navigate {
        route: String,
        success: Option<String>,
    },
}

impl Transition {
    pub fn is_navigation(&self) -> bool {
        matches!(self, Transition::Navigate { .. })
    }
}

/// Hook to behavior table for one variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BehaviorRegistry {
    entries: BTreeMap<Hook, Arc<Behavior>>,
}

impl BehaviorRegistry {
    /// Table every variant starts from. Covers every hook.
    pub fn base() -> Self {
        let entries = Hook::ALL
            .iter()
            .map(|&hook| (hook, Arc::new(base_behavior(hook))))
            .collect();
        Self { entries }
    }

    /// Copy of this table with `overrides` replacing existing entries
    pub fn with_overrides<I>(&self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (Hook, Behavior)>,
    {
        let mut entries = self.entries.clone();
        for (hook, behavior) in overrides {
            entries.insert(hook, Arc::new(behavior));
        }
        Self { entries }
    }

    /// Behavior configured for `hook`
    pub fn get(&self, hook: Hook) -> Arc<Behavior> {
        match self.entries.get(&hook) {
            Some(behavior) => behavior.clone(),
            None => Arc::new(base_behavior(hook)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Hook, &Behavior)> {
        self.entries.iter().map(|(hook, behavior)| (*hook, behavior.as_ref()))
    }
}

fn base_behavior(hook: Hook) -> Behavior {
    match hook {
        Hook::AfterSignIn | Hook::AfterForceAuth | Hook::AfterSignInConfirmationPoll => {
            Behavior::navigate("signin_confirmed")
        }
        Hook::AfterSignUp => Behavior::navigate("confirm"),
        Hook::AfterSignUpConfirmationPoll => Behavior::navigate("signup_confirmed"),
        Hook::AfterResetPasswordConfirmationPoll | Hook::AfterCompleteResetPassword => {
            Behavior::navigate("reset_password_verified")
        }
        Hook::AfterCompleteSignIn => Behavior::navigate("signin_verified"),
        Hook::AfterCompleteSignUp => Behavior::navigate("signup_verified"),
        Hook::AfterLoaded
        | Hook::BeforeSignIn
        | Hook::BeforeSignUpConfirmationPoll
        | Hook::AfterChangePassword
        | Hook::AfterDeleteAccount => Behavior::Null,
    }
}
