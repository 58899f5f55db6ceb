//! Background Tasks Module
//!
//! Periodic maintenance that runs alongside the coordinator.
//!
//! # Tasks
//! - Expiry sweep: removes records older than the TTL at a fixed interval

mod sweeper;

pub use sweeper::spawn_sweeper_task;

/// Default pause between expiry sweeps (5 minutes)
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 5 * 60;
