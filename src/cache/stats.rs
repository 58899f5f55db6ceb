//! Cache Statistics Module
//!
//! Diagnostic counters for the record store: lookup hits and misses, TTL
//! evictions, and a breakdown of live records by status.

use serde::Serialize;

// == Cache Stats ==
/// Snapshot of cache diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Lookups that found a live record
    pub hits: u64,
    /// Lookups that found nothing or an expired record
    pub misses: u64,
    /// Records removed because their TTL elapsed
    pub evictions: u64,
    /// Live records with status `Loading`
    pub loading: usize,
    /// Live records with status `Loaded`
    pub loaded: usize,
    /// Live records with status `Error`
    pub errored: usize,
    /// Activation runs currently registered as in flight
    pub in_flight: usize,
    /// Approximate size in bytes of the serialized record set
    pub approx_bytes: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of live records.
    pub fn total_records(&self) -> usize {
        self.loading + self.loaded + self.errored
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }
}
