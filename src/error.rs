//! Error types for the activation coordinator
//!
//! Provides the classified activation failures surfaced to callers and the
//! I/O errors raised by the durable slots, using thiserror.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// == Error Kind ==
/// Serializable discriminant of an [`ActivationError`].
///
/// Persisted on `Error` records so a cached failure is re-surfaced with the
/// same classification it was first reported with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NetworkUnavailable,
    EmptyContent,
    RemoteValidation,
    AuthenticationFailed,
    DocumentNotFound,
    Unknown,
}

// == Activation Error Enum ==
/// Classified failure of an activation attempt.
///
/// Every variant carries the human-readable detail that ends up in the
/// record's `error_detail`. The type is `Clone` because all callers joined
/// on one in-flight run receive the same value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActivationError {
    /// Transport failure, timeout, or failed availability probe
    #[error("Remote engine unavailable: {0}")]
    NetworkUnavailable(String),

    /// Source bytes were empty, detected before any upload
    #[error("Document has no content: {0}")]
    EmptyContent(String),

    /// Remote rejected the document content or format
    #[error("Remote rejected document: {0}")]
    RemoteValidation(String),

    /// Credential rejected by the remote engine
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Remote has no such identifier on a path that required it
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Anything not otherwise classified
    #[error("Activation failed: {0}")]
    Unknown(String),
}

impl ActivationError {
    /// Rebuilds an error from its persisted kind and detail.
    pub fn from_kind(kind: ErrorKind, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match kind {
            ErrorKind::NetworkUnavailable => Self::NetworkUnavailable(detail),
            ErrorKind::EmptyContent => Self::EmptyContent(detail),
            ErrorKind::RemoteValidation => Self::RemoteValidation(detail),
            ErrorKind::AuthenticationFailed => Self::AuthenticationFailed(detail),
            ErrorKind::DocumentNotFound => Self::DocumentNotFound(detail),
            ErrorKind::Unknown => Self::Unknown(detail),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NetworkUnavailable(_) => ErrorKind::NetworkUnavailable,
            Self::EmptyContent(_) => ErrorKind::EmptyContent,
            Self::RemoteValidation(_) => ErrorKind::RemoteValidation,
            Self::AuthenticationFailed(_) => ErrorKind::AuthenticationFailed,
            Self::DocumentNotFound(_) => ErrorKind::DocumentNotFound,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// The detail text without the classification prefix.
    pub fn detail(&self) -> &str {
        match self {
            Self::NetworkUnavailable(d)
            | Self::EmptyContent(d)
            | Self::RemoteValidation(d)
            | Self::AuthenticationFailed(d)
            | Self::DocumentNotFound(d)
            | Self::Unknown(d) => d,
        }
    }
}

// == Persistence Error Enum ==
/// Failure reading or writing a durable slot.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Slot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Slot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

// == Setup Error Enum ==
/// Failure constructing the coordinator or its HTTP engine.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Invalid remote engine URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP client setup failed: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

// == Result Type Aliases ==
/// Convenience Result type for activation outcomes.
pub type Result<T> = std::result::Result<T, ActivationError>;

/// Result type for durable slot operations.
pub type PersistResult<T> = std::result::Result<T, PersistenceError>;
