//! Resume tokens
//!
//! A resume token carries model state across an email verification round
//! trip as base64 encoded JSON in the `resume` query parameter. Models opt
//! in by implementing [`ResumeTokenModel`]; the free functions here do the
//! picking, parsing and validating on their behalf.

use crate::verification::error::VerificationError;
use crate::verification::schema::Schema;
use crate::verification::ErrorReporter;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Bag of values carried through a verification link
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResumeToken {
    values: Map<String, Value>,
}

impl ResumeToken {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Parse a stringified token. Anything unreadable yields an empty token.
    pub fn from_stringified(stringified: &str) -> Self {
        match Self::try_from_stringified(stringified) {
            Ok(token) => token,
            Err(e) => {
                log::debug!("Ignoring unreadable resume token: {}", e);
                Self::default()
            }
        }
    }

    pub fn try_from_stringified(stringified: &str) -> Result<Self, VerificationError> {
        let bytes = STANDARD
            .decode(stringified.trim())
            .map_err(|e| VerificationError::MalformedResumeToken(e.to_string()))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| VerificationError::MalformedResumeToken(e.to_string()))
    }

    /// Token as it appears in a URL
    pub fn stringify(&self) -> String {
        let json = Value::Object(self.values.clone()).to_string();
        STANDARD.encode(json.as_bytes())
    }

    /// Values for `fields` that are present in the token
    pub fn pick(&self, fields: &[&str]) -> Map<String, Value> {
        fields
            .iter()
            .filter_map(|field| {
                self.values
                    .get(*field)
                    .map(|value| (field.to_string(), value.clone()))
            })
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A model whose state survives a verification round trip
pub trait ResumeTokenModel {
    /// Fields written to and read from the token. Empty opts out.
    fn resume_token_fields(&self) -> &[&str];

    /// Rules applied when reading a token
    fn resume_token_schema(&self) -> Option<&Schema> {
        None
    }

    fn get_value(&self, key: &str) -> Option<Value>;

    fn set_values(&mut self, values: Map<String, Value>);
}

/// Values the model contributes to a resume token
pub fn pick_resume_token_info<M: ResumeTokenModel + ?Sized>(model: &M) -> Option<Map<String, Value>> {
    let fields = model.resume_token_fields();
    if fields.is_empty() {
        return None;
    }
    Some(
        fields
            .iter()
            .filter_map(|field| model.get_value(field).map(|v| (field.to_string(), v)))
            .collect(),
    )
}

/// Copy the model's fields out of `token`. An invalid token is reported
/// through `reporter` and leaves the model untouched.
pub fn populate_from_resume_token<M: ResumeTokenModel + ?Sized>(
    model: &mut M,
    token: &ResumeToken,
    reporter: &dyn ErrorReporter,
) {
    let fields = model.resume_token_fields();
    if fields.is_empty() {
        return;
    }
    let picked = token.pick(fields);
    if let Some(schema) = model.resume_token_schema() {
        if let Err(e) = schema.validate(&picked) {
            reporter.capture_error(&e.into_resume_token_error());
            return;
        }
    }
    model.set_values(picked);
}

/// [`populate_from_resume_token`] for a token taken from a URL
pub fn populate_from_stringified_resume_token<M: ResumeTokenModel + ?Sized>(
    model: &mut M,
    stringified: &str,
    reporter: &dyn ErrorReporter,
) {
    if model.resume_token_fields().is_empty() {
        return;
    }
    let token = ResumeToken::from_stringified(stringified);
    populate_from_resume_token(model, &token, reporter);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::schema::Validator;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingReporter {
        errors: Mutex<Vec<VerificationError>>,
    }

    impl ErrorReporter for RecordingReporter {
        fn capture_error(&self, error: &VerificationError) {
            self.errors.lock().unwrap().push(error.clone());
        }
    }

    struct Relier {
        values: Map<String, Value>,
        schema: Schema,
    }

    impl Relier {
        fn new() -> Self {
            Self {
                values: Map::new(),
                schema: Schema::new()
                    .field("entrypoint", Validator::String.optional())
                    .field("uniqueUserId", Validator::Uuid.required()),
            }
        }
    }

    impl ResumeTokenModel for Relier {
        fn resume_token_fields(&self) -> &[&str] {
            &["entrypoint", "uniqueUserId"]
        }

        fn resume_token_schema(&self) -> Option<&Schema> {
            Some(&self.schema)
        }

        fn get_value(&self, key: &str) -> Option<Value> {
            self.values.get(key).cloned()
        }

        fn set_values(&mut self, values: Map<String, Value>) {
            self.values.extend(values);
        }
    }

    const USER_ID: &str = "6ba7b810-9dad-11d1-80b4-00c04fd430c8";

    fn token(value: Value) -> ResumeToken {
        ResumeToken::new(value.as_object().unwrap().clone())
    }

    #[test]
    fn test_stringify_and_parse() {
        let original = token(json!({"entrypoint": "menupanel", "uniqueUserId": USER_ID}));
        let parsed = ResumeToken::from_stringified(&original.stringify());
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_garbage_parses_to_empty_token() {
        assert!(ResumeToken::from_stringified("!!not base64!!").is_empty());
        let not_json = STANDARD.encode("not json");
        assert!(ResumeToken::from_stringified(&not_json).is_empty());
        assert!(matches!(
            ResumeToken::try_from_stringified(&not_json),
            Err(VerificationError::MalformedResumeToken(_))
        ));
    }

    #[test]
    fn test_populate_copies_only_declared_fields() {
        let mut relier = Relier::new();
        let reporter = RecordingReporter::default();
        let stringified =
            token(json!({"entrypoint": "menupanel", "uniqueUserId": USER_ID, "secret": "x"})).stringify();

        populate_from_stringified_resume_token(&mut relier, &stringified, &reporter);

        assert_eq!(relier.values.get("entrypoint"), Some(&json!("menupanel")));
        assert!(relier.values.get("secret").is_none());
        assert!(reporter.errors.lock().unwrap().is_empty());

        let picked = pick_resume_token_info(&relier).unwrap();
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn test_missing_and_invalid_are_reported_not_applied() {
        let mut relier = Relier::new();
        let reporter = RecordingReporter::default();

        populate_from_resume_token(&mut relier, &token(json!({"entrypoint": "menupanel"})), &reporter);
        populate_from_resume_token(&mut relier, &token(json!({"uniqueUserId": "nope"})), &reporter);

        assert!(relier.values.is_empty());
        assert_eq!(
            *reporter.errors.lock().unwrap(),
            vec![
                VerificationError::MissingResumeTokenProperty("uniqueUserId".to_string()),
                VerificationError::InvalidResumeTokenProperty("uniqueUserId".to_string()),
            ]
        );
    }
}
