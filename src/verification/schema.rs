//! Field validators
//!
//! A [`Schema`] is an ordered list of field rules. Validation stops at the
//! first failure and reports whether the field was missing or malformed.

use crate::verification::error::{VerificationError, VerificationResult};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Length of an email verification code, in hex digits
pub const VERIFICATION_CODE_LENGTH: usize = 32;
/// Length of a token, in hex digits
pub const TOKEN_LENGTH: usize = 64;

/// Shape a field value must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validator {
    Email,
    Hex,
    VerificationCode,
    Token,
    Uuid,
    String,
    Boolean,
}

impl Validator {
    pub fn is_valid(&self, value: &Value) -> bool {
        match (self, value) {
            (Validator::Boolean, Value::Bool(_)) => true,
            (Validator::Boolean, _) => false,
            (_, Value::String(s)) => self.is_valid_str(s),
            _ => false,
        }
    }

    fn is_valid_str(&self, s: &str) -> bool {
        match self {
            Validator::Email => email_regex().is_match(s),
            Validator::Hex => is_hex(s),
            Validator::VerificationCode => s.len() == VERIFICATION_CODE_LENGTH && is_hex(s),
            Validator::Token => s.len() == TOKEN_LENGTH && is_hex(s),
            Validator::Uuid => uuid::Uuid::parse_str(s).is_ok(),
            Validator::String => !s.is_empty(),
            Validator::Boolean => false,
        }
    }

    pub fn required(self) -> FieldRule {
        FieldRule {
            validator: self,
            required: true,
        }
    }

    pub fn optional(self) -> FieldRule {
        FieldRule {
            validator: self,
            required: false,
        }
    }
}

/// A validator plus whether the field must be present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub validator: Validator,
    pub required: bool,
}

/// Ordered field rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    rules: Vec<(String, FieldRule)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.rules.push((name.into(), rule));
        self
    }

    /// Check `values` against every rule, in declaration order.
    /// `null` counts as missing.
    pub fn validate(&self, values: &Map<String, Value>) -> VerificationResult<()> {
        for (name, rule) in &self.rules {
            match values.get(name) {
                None | Some(Value::Null) => {
                    if rule.required {
                        return Err(VerificationError::MissingProperty(name.clone()));
                    }
                }
                Some(value) => {
                    if !rule.validator.is_valid(value) {
                        return Err(VerificationError::InvalidProperty(name.clone()));
                    }
                }
            }
        }
        Ok(())
    }
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
}
