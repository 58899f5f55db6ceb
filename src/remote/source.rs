//! Byte-source accessors consulted by the upload fallback.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::{ActivationError, Result};

/// Lazily yields a document's bytes. Only read when the protocol reaches
/// the upload step.
#[async_trait]
pub trait ByteSource: Send + Sync {
    async fn read_bytes(&self) -> Result<Vec<u8>>;
}

/// Bytes already held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource(pub Vec<u8>);

#[async_trait]
impl ByteSource for InMemorySource {
    async fn read_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.0.clone())
    }
}

/// Bytes read from a local file at upload time.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ByteSource for FileSource {
    async fn read_bytes(&self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.path).await.map_err(|e| {
            ActivationError::Unknown(format!("failed to read {}: {}", self.path.display(), e))
        })
    }
}
