//! Remote Module
//!
//! Everything that talks to the remote retrieval engine: the engine trait and
//! its HTTP implementation, the byte sources fed to uploads, and the ordered
//! activation protocol.

mod engine;
mod http;
mod protocol;
mod source;

#[cfg(test)]
pub(crate) mod mock;

pub use engine::{ActivationStatus, ReactivateResponse, RemoteEngine};
pub use http::{CredentialProvider, HttpRemoteEngine, StaticCredential, SESSION_HEADER};
pub use protocol::ActivationProtocol;
pub use source::{ByteSource, FileSource, InMemorySource};

use serde::Serialize;

// == Activation Path ==
/// How a successful activation was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationPath {
    /// Served from a live `Loaded` record, no network I/O
    CacheHit,
    /// Remote already held the document and bound it to the session
    ActivatedExisting,
    /// Remote had lost the document and re-ingested it on activation
    ReIngested,
    /// Bytes were uploaded through the ingestion fallback
    Uploaded,
    /// Lightweight reactivation of a previously provisioned document
    Reactivated,
}

// == Activation ==
/// Success signal: the document is ready to query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activation {
    pub document_id: String,
    /// Identifier assigned by the remote engine
    pub remote_id: String,
    pub path: ActivationPath,
    /// Failure of a best-effort sub-step that did not affect the outcome
    pub diagnostic: Option<String>,
}

impl Activation {
    pub fn new(
        document_id: impl Into<String>,
        remote_id: impl Into<String>,
        path: ActivationPath,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            remote_id: remote_id.into(),
            path,
            diagnostic: None,
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: Option<String>) -> Self {
        self.diagnostic = diagnostic;
        self
    }
}
