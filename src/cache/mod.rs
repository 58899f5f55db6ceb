//! Cache Module
//!
//! Per-document provisioning records with TTL expiry and write-through
//! persistence.

mod record;
mod stats;
mod store;


// Re-export public types
pub use record::{CacheRecord, RecordStatus};
pub use stats::CacheStats;
pub use store::CacheRecordStore;

// == Public Constants ==
/// Default record time-to-live (30 minutes)
pub const DEFAULT_TTL_SECS: u64 = 30 * 60;
