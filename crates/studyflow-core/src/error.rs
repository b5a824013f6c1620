//! Error types for the StudyFlow pipeline.

use serde::Serialize;
use thiserror::Error;

/// A shared error type for the submission pipeline.
///
/// Variants map one-to-one onto the failure classes callers must branch on:
/// a missing session triggers a client-side restart, an invalid transition on
/// completion is treated as already-successful, a transport failure is queued
/// for retry, and a validation failure is surfaced immediately and never
/// retried.
#[derive(Error, Debug, Clone, Serialize)]
pub enum StudyError {
    /// Entity not found with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// A lifecycle or validation transition that the state machine forbids
    #[error("Invalid transition: {from} -> {to} ({reason})")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    /// Malformed payload; retrying cannot succeed, so this is never queued
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transient network/remote failure; always eligible for queued retry
    #[error("Transport error: {0}")]
    Transport(String),

    /// Local durable storage failure (queue persistence, blob store)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StudyError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an InvalidTransition error
    pub fn invalid_transition(
        from: impl Into<String>,
        to: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidTransition {
            from: from.into(),
            to: to.into(),
            reason: reason.into(),
        }
    }

    /// Creates a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is an InvalidTransition error
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }

    /// Check if this is a transient transport error
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check whether a second completion attempt produced this error.
    ///
    /// Callers that only care about eventual completion treat this as a
    /// success-equivalent outcome; it is still logged distinctly for audit.
    pub fn is_already_completed(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition { reason, .. } if reason == ALREADY_COMPLETED
        )
    }
}

/// Reason string used for the idempotent-completion rejection.
pub const ALREADY_COMPLETED: &str = "already completed";

impl From<std::io::Error> for StudyError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(format!("{} (kind: {:?})", err, err.kind()))
    }
}

impl From<serde_json::Error> for StudyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, StudyError>`.
pub type Result<T> = std::result::Result<T, StudyError>;
