//! Remote Activation Protocol
//!
//! Drives the ordered provisioning sequence against a [`RemoteEngine`]:
//!
//! 1. Availability probe; failure is terminal (`NetworkUnavailable`).
//! 2. Existence check, then activation of the existing copy. A non-success
//!    status or a non-authentication failure falls through to step 3.
//! 3. Upload fallback: read the bytes (empty is terminal, `EmptyContent`),
//!    upload, then bind with a best-effort activation whose failure is
//!    reported as a diagnostic only.
//!
//! Reactivation skips all of that and issues one direct call.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{ActivationError, Result};
use crate::remote::{Activation, ActivationPath, ActivationStatus, ByteSource, RemoteEngine};

// == Activation Protocol ==
#[derive(Clone)]
pub struct ActivationProtocol {
    engine: Arc<dyn RemoteEngine>,
}

impl ActivationProtocol {
    pub fn new(engine: Arc<dyn RemoteEngine>) -> Self {
        Self { engine }
    }

    // == Full Protocol ==
    /// Provisions `document_id` on the remote engine.
    pub async fn activate(
        &self,
        document_id: &str,
        display_name: &str,
        source: &dyn ByteSource,
    ) -> Result<Activation> {
        self.engine.health().await.map_err(|e| match e {
            ActivationError::NetworkUnavailable(_) => e,
            other => ActivationError::NetworkUnavailable(other.detail().to_string()),
        })?;

        if let Some(activation) = self.activate_existing(document_id).await? {
            return Ok(activation);
        }

        self.upload_and_bind(document_id, display_name, source).await
    }

    /// Steps 2a-2c. `Ok(None)` means fall through to the upload.
    async fn activate_existing(&self, document_id: &str) -> Result<Option<Activation>> {
        match self.engine.check_document(document_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(document_id, "Document not held remotely, uploading");
                return Ok(None);
            }
            Err(e @ ActivationError::AuthenticationFailed(_)) => return Err(e),
            Err(e) => {
                warn!(document_id, error = %e, "Existence check failed, uploading");
                return Ok(None);
            }
        }

        match self.engine.activate_document(document_id).await {
            Ok(ActivationStatus::ActivatedExisting) => {
                info!(document_id, "Activated existing document");
                Ok(Some(Activation::new(
                    document_id,
                    document_id,
                    ActivationPath::ActivatedExisting,
                )))
            }
            Ok(ActivationStatus::ReUploadedAndActivated) => {
                info!(document_id, "Remote re-ingested and activated document");
                Ok(Some(Activation::new(
                    document_id,
                    document_id,
                    ActivationPath::ReIngested,
                )))
            }
            Ok(ActivationStatus::Other(status)) => {
                warn!(document_id, status = %status, "Unexpected activation status, uploading");
                Ok(None)
            }
            Err(e @ ActivationError::AuthenticationFailed(_)) => Err(e),
            Err(e) => {
                warn!(document_id, error = %e, "Activation of existing document failed, uploading");
                Ok(None)
            }
        }
    }

    /// Step 3.
    async fn upload_and_bind(
        &self,
        document_id: &str,
        display_name: &str,
        source: &dyn ByteSource,
    ) -> Result<Activation> {
        let bytes = source.read_bytes().await?;
        if bytes.is_empty() {
            return Err(ActivationError::EmptyContent(format!(
                "{} has no content",
                display_name
            )));
        }

        let remote_id = self
            .engine
            .upload_document(document_id, display_name, bytes)
            .await?;
        info!(document_id, remote_id = %remote_id, "Uploaded document");

        let diagnostic = self.bind_after_upload(document_id).await;
        Ok(Activation::new(document_id, remote_id, ActivationPath::Uploaded)
            .with_diagnostic(diagnostic))
    }

    /// Best-effort binding of a freshly ingested document. Never fails the
    /// activation; returns the failure text for the caller's diagnostics.
    async fn bind_after_upload(&self, document_id: &str) -> Option<String> {
        let diagnostic = match self.engine.activate_document(document_id).await {
            Ok(ActivationStatus::Other(status)) => {
                format!("post-upload activation returned status '{}'", status)
            }
            Ok(_) => return None,
            Err(e) => format!("post-upload activation failed: {}", e),
        };
        warn!(document_id, diagnostic = %diagnostic, "Best-effort activation did not succeed");
        Some(diagnostic)
    }

    // == Reactivation ==
    /// Single direct reactivation call with no fallback.
    pub async fn reactivate(&self, document_id: &str) -> Result<Activation> {
        let response = self.engine.reactivate_document(document_id).await?;
        let detail = || {
            response
                .message
                .clone()
                .unwrap_or_else(|| format!("reactivation returned status '{}'", response.status))
        };

        match response.status.as_str() {
            "not_found" => Err(ActivationError::DocumentNotFound(detail())),
            "error" | "failed" => Err(ActivationError::Unknown(detail())),
            _ => {
                info!(
                    document_id,
                    status = %response.status,
                    processing_time = ?response.processing_time,
                    "Reactivated document"
                );
                Ok(Activation::new(
                    document_id,
                    document_id,
                    ActivationPath::Reactivated,
                ))
            }
        }
    }
}
