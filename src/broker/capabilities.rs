//! Capability tables
//!
//! Named feature flags describing what an integration supports. A derived
//! variant starts from its parent's set and overrides individual names;
//! names are never removed. Unknown names read as `false`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const BROWSER_TRANSITIONS_AFTER_EMAIL_VERIFICATION: &str =
    "browserTransitionsAfterEmailVerification";
pub const CHOOSE_WHAT_TO_SYNC_CHECKBOX: &str = "chooseWhatToSyncCheckbox";
pub const CHOOSE_WHAT_TO_SYNC_WEB_V1: &str = "chooseWhatToSyncWebV1";
pub const EMAIL_VERIFICATION_MARKETING_SNIPPET: &str = "emailVerificationMarketingSnippet";
pub const HANDLE_SIGNED_IN_NOTIFICATION: &str = "handleSignedInNotification";
pub const OPEN_WEBMAIL_BUTTON_VISIBLE: &str = "openWebmailButtonVisible";
pub const REUSE_EXISTING_SESSION: &str = "reuseExistingSession";
pub const SIGNUP: &str = "signup";

/// Capability name to flag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet {
    flags: BTreeMap<String, bool>,
}

impl CapabilitySet {
    /// Capabilities of the base integration
    pub fn base() -> Self {
        Self::default().with_overrides([
            (BROWSER_TRANSITIONS_AFTER_EMAIL_VERIFICATION, false),
            (CHOOSE_WHAT_TO_SYNC_CHECKBOX, false),
            (CHOOSE_WHAT_TO_SYNC_WEB_V1, false),
            (EMAIL_VERIFICATION_MARKETING_SNIPPET, true),
            (HANDLE_SIGNED_IN_NOTIFICATION, true),
            (OPEN_WEBMAIL_BUTTON_VISIBLE, true),
            (REUSE_EXISTING_SESSION, false),
            (SIGNUP, true),
        ])
    }

    /// Copy of this set with `overrides` applied on top
    pub fn with_overrides<I, K>(&self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, bool)>,
        K: Into<String>,
    {
        let mut flags = self.flags.clone();
        for (name, value) in overrides {
            flags.insert(name.into(), value);
        }
        Self { flags }
    }

    /// Whether the integration supports `name`
    pub fn has_capability(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    /// Whether `name` is declared at all
    pub fn declares(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.flags.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_unknown_capability_is_false() {
        let caps = CapabilitySet::base();
        assert!(!caps.has_capability("teleport"));
        assert!(!caps.declares("teleport"));
        assert!(caps.has_capability(SIGNUP));
    }

    #[test]
    fn test_derived_equals_base_with_overrides() {
        let base = CapabilitySet::base();
        let overrides: HashMap<&str, bool> = [
            (CHOOSE_WHAT_TO_SYNC_WEB_V1, true),
            (EMAIL_VERIFICATION_MARKETING_SNIPPET, false),
            ("brandNewFlag", true),
        ]
        .into_iter()
        .collect();
        let derived = base.with_overrides(overrides.clone());

        let mut names: Vec<&str> = base.iter().map(|(name, _)| name).collect();
        names.extend(overrides.keys().copied());
        names.push("undeclared");
        for name in names {
            let expected = overrides
                .get(name)
                .copied()
                .unwrap_or_else(|| base.has_capability(name));
            assert_eq!(derived.has_capability(name), expected, "{}", name);
        }
        assert_eq!(derived.len(), base.len() + 1);
    }

    #[test]
    fn test_lookup_is_pure() {
        let caps = CapabilitySet::base().with_overrides([(REUSE_EXISTING_SESSION, true)]);
        let first = caps.has_capability(REUSE_EXISTING_SESSION);
        let second = caps.has_capability(REUSE_EXISTING_SESSION);
        assert_eq!(first, second);
        assert!(first);
    }
}
