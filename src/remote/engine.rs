//! Remote engine trait and wire types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

// == Activation Status ==
/// Outcome reported by `POST /activate-document/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationStatus {
    ActivatedExisting,
    ReUploadedAndActivated,
    /// Any other status string; not a success
    Other(String),
}

impl ActivationStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "activated_existing" => Self::ActivatedExisting,
            "re_uploaded_and_activated" => Self::ReUploadedAndActivated,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Body of `POST /reactivate-document/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactivateResponse {
    pub status: String,
    /// Server-side processing time in seconds, informational only
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

// == Remote Engine ==
/// The calls the activation protocol makes against the remote engine.
///
/// Implementations classify every failure into an `ActivationError`.
#[async_trait]
pub trait RemoteEngine: Send + Sync {
    /// Availability probe. Any failure means the engine is unreachable.
    async fn health(&self) -> Result<()>;

    /// Whether the engine already holds `document_id`.
    async fn check_document(&self, document_id: &str) -> Result<bool>;

    /// Binds an ingested document to the current session.
    async fn activate_document(&self, document_id: &str) -> Result<ActivationStatus>;

    /// Ingests `bytes` under `document_id`, returning the remote identifier.
    async fn upload_document(
        &self,
        document_id: &str,
        display_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String>;

    /// Lightweight reactivation of a document known to exist remotely.
    async fn reactivate_document(&self, document_id: &str) -> Result<ReactivateResponse>;
}
