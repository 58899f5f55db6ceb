//! Document Activation - client-side cache coordinator for a remote
//! document retrieval engine
//!
//! Guarantees a document is provisioned on the remote engine before it is
//! queried, without redundant uploads. Outcomes are cached with a TTL and
//! persisted across restarts; concurrent requests for one document share a
//! single activation run.

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod inflight;
pub mod persistence;
pub mod remote;
pub mod tasks;

pub use cache::{CacheRecord, CacheRecordStore, CacheStats, RecordStatus};
pub use config::Config;
pub use coordinator::ActivationCoordinator;
pub use error::{ActivationError, ErrorKind, PersistenceError, SetupError};
pub use inflight::Outcome;
pub use remote::{
    Activation, ActivationPath, ByteSource, FileSource, HttpRemoteEngine, InMemorySource,
    RemoteEngine,
};
pub use tasks::spawn_sweeper_task;
