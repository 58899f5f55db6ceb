//! Cache Record Module
//!
//! Defines the per-document provisioning record and its TTL arithmetic.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ActivationError, ErrorKind};

// == Record Status ==
/// Provisioning state of a document on the remote engine.
///
/// The absence of a record is the implicit `NotLoaded` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    Loading,
    Loaded,
    Error,
}

// == Cache Record ==
/// One record per document identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    /// Opaque document identifier, unique key of the store
    pub document_id: String,
    /// Human-readable filename, informational only
    pub display_name: String,
    /// Last successful or attempted provisioning, drives the TTL
    pub last_activity: DateTime<Utc>,
    /// Identifier assigned by the remote engine
    #[serde(default)]
    pub remote_id: Option<String>,
    pub status: RecordStatus,
    /// Classification of the failure, only for `Error` records
    #[serde(default)]
    pub error_kind: Option<ErrorKind>,
    /// Diagnostic text, only for `Error` records
    #[serde(default)]
    pub error_detail: Option<String>,
}

impl CacheRecord {
    // == Constructors ==
    /// Record written when an activation attempt begins.
    pub fn loading(document_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            display_name: display_name.into(),
            last_activity: Utc::now(),
            remote_id: None,
            status: RecordStatus::Loading,
            error_kind: None,
            error_detail: None,
        }
    }

    /// Record written when an attempt resolves successfully.
    pub fn loaded(
        document_id: impl Into<String>,
        display_name: impl Into<String>,
        remote_id: impl Into<String>,
    ) -> Self {
        Self {
            remote_id: Some(remote_id.into()),
            status: RecordStatus::Loaded,
            ..Self::loading(document_id, display_name)
        }
    }

    /// Record written when an attempt resolves with a classified failure.
    pub fn failed(
        document_id: impl Into<String>,
        display_name: impl Into<String>,
        error: &ActivationError,
    ) -> Self {
        Self {
            status: RecordStatus::Error,
            error_kind: Some(error.kind()),
            error_detail: Some(error.detail().to_string()),
            ..Self::loading(document_id, display_name)
        }
    }

    /// Replaces the activity timestamp.
    pub fn with_last_activity(mut self, at: DateTime<Utc>) -> Self {
        self.last_activity = at;
        self
    }

    // == Age ==
    /// Time elapsed since `last_activity`; zero for timestamps in the future.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_activity).to_std().unwrap_or(Duration::ZERO)
    }

    // == Is Expired ==
    /// True once the record's age strictly exceeds the TTL.
    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age_at(now) > ttl
    }

    /// The failure recorded on an `Error` record.
    pub fn error(&self) -> Option<ActivationError> {
        if self.status != RecordStatus::Error {
            return None;
        }
        let kind = self.error_kind.unwrap_or(ErrorKind::Unknown);
        let detail = self.error_detail.clone().unwrap_or_default();
        Some(ActivationError::from_kind(kind, detail))
    }
}
