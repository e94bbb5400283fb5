//! Reset password verification info
//!
//! Data carried by the link in a password reset email.

use crate::verification::error::VerificationResult;
use crate::verification::schema::{Schema, Validator};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Values parsed from a reset password link
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResetPasswordVerification {
    pub code: Option<String>,
    pub email: Option<String>,
    pub token: Option<String>,
    pub email_to_hash_with: Option<String>,
    pub uid: Option<String>,
}

impl ResetPasswordVerification {
    /// Read the link's query parameters
    pub fn from_query(params: &[(String, String)]) -> Self {
        let mut info = Self::default();
        for (key, value) in params {
            let value = Some(value.clone());
            match key.as_str() {
                "code" => info.code = value,
                "email" => info.email = value,
                "token" => info.token = value,
                "emailToHashWith" => info.email_to_hash_with = value,
                "uid" => info.uid = value,
                _ => {}
            }
        }
        info
    }

    pub fn schema() -> Schema {
        Schema::new()
            .field("code", Validator::VerificationCode.required())
            .field("email", Validator::Email.required())
            .field("emailToHashWith", Validator::Email.optional())
            .field("token", Validator::Token.required())
            .field("uid", Validator::Hex.optional())
    }

    pub fn validate(&self) -> VerificationResult<()> {
        Self::schema().validate(&self.to_map())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::VerificationError;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    const CODE: &str = "dea0fae1abc2fab3bed4dec5eec6ace7";
    const TOKEN: &str = "feed0cafe1dead2beef3face4bead5cab6fade7fed8bad9add0ace1bee2fab3c";

    #[test]
    fn test_valid_link() {
        let info = ResetPasswordVerification::from_query(&params(&[
            ("code", CODE),
            ("email", "a@b.co"),
            ("token", TOKEN),
            ("utm_source", "email"),
        ]));
        assert!(info.is_valid());
        assert_eq!(info.email.as_deref(), Some("a@b.co"));
    }

    #[test]
    fn test_missing_token() {
        let info = ResetPasswordVerification::from_query(&params(&[("code", CODE), ("email", "a@b.co")]));
        assert_eq!(
            info.validate(),
            Err(VerificationError::MissingProperty("token".to_string()))
        );
    }

    #[test]
    fn test_invalid_optional_uid() {
        let info = ResetPasswordVerification::from_query(&params(&[
            ("code", CODE),
            ("email", "a@b.co"),
            ("token", TOKEN),
            ("uid", "not-hex"),
        ]));
        assert_eq!(
            info.validate(),
            Err(VerificationError::InvalidProperty("uid".to_string()))
        );
    }
}
