//! Common error types for the creative studio
//!
//! Every failure that crosses a crate boundary is an [`Error`]. User-facing
//! categorisation goes through [`classify_error`], which is the only place
//! that inspects raw upstream message text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Common result type for studio operations
pub type Result<T> = std::result::Result<T, Error>;

/// Upstream signature for a revoked or unknown API credential
const CREDENTIAL_SIGNATURE: &str = "entity was not found";

/// Common error types across studio crates
#[derive(Error, Debug)]
pub enum Error {
    /// Network failure, timeout, or connection refused
    #[error("Transport error: {0}")]
    Transport(String),

    /// Remote service answered with a non-success status
    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Primary attempts and failover both exhausted
    #[error("Unrecoverable failure in {operation}: primary error: {primary}; failover error: {failover}")]
    Unrecoverable {
        operation: String,
        primary: String,
        failover: String,
    },

    /// API credential rejected upstream; the user must re-authenticate
    #[error("Credential error: {0}")]
    Credential(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialisation error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// User-visible error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Deliberate business-rule rejection
    Refusal,
    /// More input needed from the user
    Clarification,
    /// Network failure or timeout, safe to retry
    Transient,
    /// Retries and failover exhausted
    Unrecoverable,
    /// Credential rejected, re-authentication required
    Credential,
}

/// Classify a raw upstream error message
///
/// The "entity was not found" match is how the generation backend reports
/// an invalid API key. Anything else is treated as transient.
pub fn classify_error(raw: &str) -> ErrorKind {
    if raw.to_ascii_lowercase().contains(CREDENTIAL_SIGNATURE) {
        ErrorKind::Credential
    } else {
        ErrorKind::Transient
    }
}

impl Error {
    /// Category used to pick the UI state for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Credential(_) => ErrorKind::Credential,
            Error::Unrecoverable { primary, failover, .. } => {
                if classify_error(primary) == ErrorKind::Credential
                    || classify_error(failover) == ErrorKind::Credential
                {
                    ErrorKind::Credential
                } else {
                    ErrorKind::Unrecoverable
                }
            }
            Error::InvalidInput(_) | Error::NotFound(_) => ErrorKind::Clarification,
            other => classify_error(&other.to_string()),
        }
    }

    /// True for network-level failures (used by the workflow fallback policy)
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Build an error from an upstream status + body, promoting credential failures
    pub fn from_remote(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match classify_error(&message) {
            ErrorKind::Credential => Error::Credential(message),
            _ => Error::Remote { status, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_signature_is_case_insensitive() {
        assert_eq!(
            classify_error("Requested Entity was not found."),
            ErrorKind::Credential
        );
        assert_eq!(classify_error("connection reset"), ErrorKind::Transient);
    }

    #[test]
    fn remote_error_with_signature_becomes_credential() {
        let err = Error::from_remote(404, "Requested entity was not found.");
        assert!(matches!(err, Error::Credential(_)));
        assert_eq!(err.kind(), ErrorKind::Credential);

        let err = Error::from_remote(500, "backend overloaded");
        assert!(matches!(err, Error::Remote { status: 500, .. }));
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[test]
    fn unrecoverable_message_embeds_both_causes() {
        let err = Error::Unrecoverable {
            operation: "image generation".to_string(),
            primary: "4k timeout".to_string(),
            failover: "2k timeout".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("4k timeout"));
        assert!(msg.contains("2k timeout"));
        assert_eq!(err.kind(), ErrorKind::Unrecoverable);
    }

    #[test]
    fn unrecoverable_with_credential_cause_is_credential() {
        let err = Error::Unrecoverable {
            operation: "voiceover generation".to_string(),
            primary: "Requested entity was not found.".to_string(),
            failover: "timeout".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Credential);
    }
}
