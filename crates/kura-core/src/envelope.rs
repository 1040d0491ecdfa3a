//! Result envelope codec.
//!
//! Every function exported by a compiled extension returns JSON text of the
//! shape `{"ok": true, "data": T}` or `{"ok": false, "error": string|object}`.
//! Exceptions cannot cross the script boundary, so this tagged union is the
//! only failure channel. It is decoded on the host side into a `Result`.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{EnvelopeError, EnvelopeResult};

/// Message used when an extension fails without saying why.
const UNSPECIFIED_FAILURE: &str = "extension reported a failure without an error message";

/// A decoded result envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultEnvelope<T> {
    /// `{"ok": true, "data": T}`
    Ok(T),
    /// `{"ok": false, "error": ...}`
    Err(ExtensionFailure),
}

impl<T> ResultEnvelope<T> {
    /// Convert into a standard `Result`.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Extension`] when the envelope reported failure.
    pub fn into_result(self) -> EnvelopeResult<T> {
        match self {
            Self::Ok(value) => Ok(value),
            Self::Err(failure) => Err(EnvelopeError::Extension(failure)),
        }
    }
}

/// The failure half of an envelope.
///
/// `message` is always human readable. When the extension reported a
/// structured error object, `detail` keeps the original value so callers can
/// inspect its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionFailure {
    message: String,
    detail: Option<Value>,
}

impl ExtensionFailure {
    /// Build a failure from a plain message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    /// Build a failure from the envelope's `error` field.
    ///
    /// Strings are taken verbatim, objects are pretty-printed.
    #[must_use]
    pub fn from_error_value(error: Option<Value>) -> Self {
        match error {
            None | Some(Value::Null) => Self::new(UNSPECIFIED_FAILURE),
            Some(Value::String(message)) => Self::new(message),
            Some(structured) => {
                let message = serde_json::to_string_pretty(&structured)
                    .unwrap_or_else(|_| structured.to_string());
                Self {
                    message,
                    detail: Some(structured),
                }
            },
        }
    }

    /// Human readable failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Structured error value, if the extension reported one.
    #[must_use]
    pub fn detail(&self) -> Option<&Value> {
        self.detail.as_ref()
    }
}

impl fmt::Display for ExtensionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Deserialize)]
struct RawEnvelope {
    ok: Option<Value>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Decode envelope text into a [`ResultEnvelope`].
///
/// # Errors
///
/// Returns [`EnvelopeError::Json`] for invalid JSON or a `data` payload that
/// does not deserialize into `T`, and [`EnvelopeError::Malformed`] when the
/// envelope shape is violated (missing or non-boolean `ok`, or an error
/// attached to a successful envelope).
pub fn decode<T: DeserializeOwned>(text: &str) -> EnvelopeResult<ResultEnvelope<T>> {
    let raw: RawEnvelope = serde_json::from_str(text)?;

    match raw.ok {
        Some(Value::Bool(true)) => {
            if raw.error.as_ref().is_some_and(|e| !e.is_null()) {
                return Err(EnvelopeError::Malformed(
                    "successful envelope must not carry an error".to_owned(),
                ));
            }
            let data = raw.data.unwrap_or(Value::Null);
            Ok(ResultEnvelope::Ok(serde_json::from_value(data)?))
        },
        Some(Value::Bool(false)) => Ok(ResultEnvelope::Err(ExtensionFailure::from_error_value(
            raw.error,
        ))),
        Some(other) => Err(EnvelopeError::Malformed(format!(
            "`ok` must be a boolean, got {other}"
        ))),
        None => Err(EnvelopeError::Malformed("missing `ok` field".to_owned())),
    }
}

/// Decode envelope text and return the payload, or fail with the extension's error.
///
/// # Errors
///
/// Returns [`EnvelopeError::Extension`] when the envelope reports `ok: false`,
/// otherwise the errors documented on [`decode`].
pub fn unwrap<T: DeserializeOwned>(text: &str) -> EnvelopeResult<T> {
    decode(text)?.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwrap_returns_data_unchanged() {
        let payload = json!({"mangas": [{"title": "a"}], "hasNextPage": true, "n": 1.5});
        let text = json!({"ok": true, "data": payload}).to_string();
        let value: Value = unwrap(&text).unwrap();
        assert_eq!(value, payload);
    }

    #[test]
    fn test_unwrap_scalar_and_null_data() {
        assert_eq!(unwrap::<String>(r#"{"ok":true,"data":"x"}"#).unwrap(), "x");
        assert_eq!(unwrap::<Value>(r#"{"ok":true}"#).unwrap(), Value::Null);
        assert_eq!(unwrap::<Option<u32>>(r#"{"ok":true,"data":null}"#).unwrap(), None);
    }

    #[test]
    fn test_unwrap_string_error_is_verbatim() {
        let err = unwrap::<Value>(r#"{"ok":false,"error":"boom"}"#).unwrap_err();
        let failure = err.as_extension_failure().unwrap();
        assert_eq!(failure.message(), "boom");
        assert!(failure.detail().is_none());
    }

    #[test]
    fn test_unwrap_object_error_is_pretty_printed() {
        let err = unwrap::<Value>(r#"{"ok":false,"error":{"code":1}}"#).unwrap_err();
        let failure = err.as_extension_failure().unwrap();
        assert_eq!(failure.message(), "{\n  \"code\": 1\n}");
        assert_eq!(failure.detail(), Some(&json!({"code": 1})));
    }

    #[test]
    fn test_failure_without_error_field() {
        let err = unwrap::<Value>(r#"{"ok":false}"#).unwrap_err();
        assert_eq!(
            err.as_extension_failure().unwrap().message(),
            UNSPECIFIED_FAILURE
        );
    }

    #[test]
    fn test_failure_ignores_data() {
        let envelope = decode::<u32>(r#"{"ok":false,"data":5,"error":"nope"}"#).unwrap();
        assert_eq!(envelope, ResultEnvelope::Err(ExtensionFailure::new("nope")));
    }

    #[test]
    fn test_success_with_error_is_malformed() {
        let err = unwrap::<u32>(r#"{"ok":true,"data":1,"error":"x"}"#).unwrap_err();
        assert!(matches!(err, EnvelopeError::Malformed(_)));
    }

    #[test]
    fn test_success_with_null_error_is_accepted() {
        assert_eq!(unwrap::<u32>(r#"{"ok":true,"data":1,"error":null}"#).unwrap(), 1);
    }

    #[test]
    fn test_shape_violations() {
        assert!(matches!(
            unwrap::<Value>(r#"{"data":1}"#).unwrap_err(),
            EnvelopeError::Malformed(_)
        ));
        assert!(matches!(
            unwrap::<Value>(r#"{"ok":"yes"}"#).unwrap_err(),
            EnvelopeError::Malformed(_)
        ));
        assert!(matches!(
            unwrap::<Value>("not json").unwrap_err(),
            EnvelopeError::Json(_)
        ));
        assert!(matches!(
            unwrap::<u32>(r#"{"ok":true,"data":"text"}"#).unwrap_err(),
            EnvelopeError::Json(_)
        ));
    }
}
