//! Trusted origin resolution
//!
//! A channel session trusts exactly one origin, computed when the session is
//! created, plus the literal `"null"` origin that native browser shells
//! (Firefox Desktop `about:accounts`) attach to their messages.

use crate::channel::error::{ChannelError, ChannelResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Origin string sent by native browser shells
pub const NULL_ORIGIN: &str = "null";

/// The single origin a channel session accepts messages from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrustedOrigin(String);

impl TrustedOrigin {
    /// Resolve the origin of the hosting page.
    ///
    /// Uses the page's own origin when available, otherwise derives it from
    /// the full page URL. Older shells do not expose `location.origin`.
    pub fn resolve(page_origin: Option<&str>, href: &str) -> ChannelResult<Self> {
        match page_origin.map(str::trim) {
            Some(origin) if !origin.is_empty() => Ok(Self(origin.to_string())),
            _ => Self::from_href(href),
        }
    }

    /// Derive the origin from a full URL
    pub fn from_href(href: &str) -> ChannelResult<Self> {
        let url = Url::parse(href)
            .map_err(|e| ChannelError::InvalidOrigin(format!("{}: {}", href, e)))?;
        Ok(Self(url.origin().ascii_serialization()))
    }

    /// Whether a message from `sender` may be processed
    pub fn accepts(&self, sender: &str) -> bool {
        sender == self.0 || sender == NULL_ORIGIN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrustedOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
