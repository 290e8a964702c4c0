//! Error types for voice sessions

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::classify::ErrorDetails;

/// Result type for voice session operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors surfaced by the session controller and its helpers
#[derive(Debug, Error)]
pub enum VoiceError {
    /// No authenticated user or no access token
    #[error("User is not authenticated")]
    NotAuthenticated,

    /// The voice SDK client was never created for this session
    #[error("Voice client is not initialized")]
    ClientUnavailable,

    /// A classified SDK failure; `source` is the error the SDK produced
    #[error("{}: {source}", .details.error_type)]
    Sdk {
        details: ErrorDetails,
        #[source]
        source: SdkError,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The owning session was disposed while an operation was pending
    #[error("Operation cancelled: session was shut down")]
    Cancelled,

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl VoiceError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The classification attached to an SDK failure, if any
    pub fn details(&self) -> Option<&ErrorDetails> {
        match self {
            Self::Sdk { details, .. } => Some(details),
            _ => None,
        }
    }
}

/// A raw error value produced by the voice SDK.
///
/// SDKs report failures either as bare strings or as loosely shaped payloads; both are kept
/// untouched so the classifier can look at the original message.
#[derive(Debug, Clone, PartialEq)]
pub enum SdkError {
    /// A plain text error
    Text(String),
    /// A structured payload as delivered by the SDK
    Payload(Value),
}

impl SdkError {
    /// Create a text error
    pub fn text(message: impl Into<String>) -> Self {
        Self::Text(message.into())
    }

    /// Extract a human-readable message.
    ///
    /// Text is returned as-is; a JSON string is returned as-is; an object with a string `message`
    /// field yields that field; anything else is serialized.
    pub fn message(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Payload(Value::String(text)) => text.clone(),
            Self::Payload(value) => match value.get("message").and_then(Value::as_str) {
                Some(message) => message.to_string(),
                None => value.to_string(),
            },
        }
    }
}

impl fmt::Display for SdkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for SdkError {}

impl From<&str> for SdkError {
    fn from(message: &str) -> Self {
        Self::Text(message.to_string())
    }
}

impl From<String> for SdkError {
    fn from(message: String) -> Self {
        Self::Text(message)
    }
}

impl From<Value> for SdkError {
    fn from(value: Value) -> Self {
        Self::Payload(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_from_text() {
        assert_eq!(SdkError::text("boom").message(), "boom");
    }

    #[test]
    fn test_message_from_payload_field() {
        let err = SdkError::from(json!({ "message": "Permission denied", "code": 1 }));
        assert_eq!(err.message(), "Permission denied");
    }

    #[test]
    fn test_message_from_json_string() {
        let err = SdkError::from(json!("socket closed"));
        assert_eq!(err.message(), "socket closed");
    }

    #[test]
    fn test_message_falls_back_to_serialization() {
        let err = SdkError::from(json!({ "code": 503 }));
        assert_eq!(err.message(), r#"{"code":503}"#);

        let err = SdkError::from(json!({ "message": 42 }));
        assert_eq!(err.message(), r#"{"message":42}"#);
    }

    #[test]
    fn test_voice_error_details() {
        let details = crate::classify::classify_message("network down");
        let err = VoiceError::Sdk {
            details: details.clone(),
            source: SdkError::text("network down"),
        };
        assert_eq!(err.details(), Some(&details));
        assert!(VoiceError::NotAuthenticated.details().is_none());
        assert!(err.to_string().contains("network down"));
    }
}
