//! Scripted in-process engine for unit tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ActivationError, Result};
use crate::remote::{ActivationStatus, ReactivateResponse, RemoteEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    Health,
    Check,
    Activate,
    Upload,
    Reactivate,
}

/// Returns the scripted result for each call and records the call.
pub(crate) struct ScriptedEngine {
    pub healthy: bool,
    pub exists: Result<bool>,
    pub activate: Result<ActivationStatus>,
    /// `Ok(None)` echoes the uploaded document identifier
    pub upload: Result<Option<String>>,
    pub reactivate: Result<ReactivateResponse>,
    /// Applied before answering upload and reactivation calls
    pub delay: Duration,
    pub(crate) calls: Mutex<Vec<Call>>,
}

impl ScriptedEngine {
    /// Reachable engine that does not hold the document and accepts uploads.
    pub fn new() -> Self {
        Self {
            healthy: true,
            exists: Ok(false),
            activate: Ok(ActivationStatus::ActivatedExisting),
            upload: Ok(None),
            reactivate: Ok(ReactivateResponse {
                status: "reactivated".to_string(),
                processing_time: Some(0.01),
                message: None,
            }),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == call)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn log(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl RemoteEngine for ScriptedEngine {
    async fn health(&self) -> Result<()> {
        self.log(Call::Health);
        if self.healthy {
            Ok(())
        } else {
            Err(ActivationError::NetworkUnavailable(
                "health probe failed".to_string(),
            ))
        }
    }

    async fn check_document(&self, _document_id: &str) -> Result<bool> {
        self.log(Call::Check);
        self.exists.clone()
    }

    async fn activate_document(&self, _document_id: &str) -> Result<ActivationStatus> {
        self.log(Call::Activate);
        self.activate.clone()
    }

    async fn upload_document(
        &self,
        document_id: &str,
        _display_name: &str,
        _bytes: Vec<u8>,
    ) -> Result<String> {
        self.log(Call::Upload);
        self.pause().await;
        self.upload
            .clone()
            .map(|id| id.unwrap_or_else(|| document_id.to_string()))
    }

    async fn reactivate_document(&self, _document_id: &str) -> Result<ReactivateResponse> {
        self.log(Call::Reactivate);
        self.pause().await;
        self.reactivate.clone()
    }
}
