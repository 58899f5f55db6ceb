//! Cache Store Module
//!
//! Record map keyed by document identifier, with lazy TTL eviction on read,
//! batched sweeping, and a write-through to the durable slot after every
//! mutation.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::cache::{CacheRecord, CacheStats, RecordStatus};
use crate::error::PersistResult;
use crate::persistence::{encode_records, RecordPersistence};

// == Cache Record Store ==
/// Provisioning records, one per document identifier.
#[derive(Debug)]
pub struct CacheRecordStore {
    /// Document identifier to record
    records: HashMap<String, CacheRecord>,
    /// Lookup and eviction counters
    stats: CacheStats,
    /// Maximum record age before it is treated as absent
    ttl: Duration,
    /// Durable backing slot, if any
    persistence: Option<RecordPersistence>,
}

impl CacheRecordStore {
    // == Constructor ==
    /// Creates an empty, purely in-memory store.
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: HashMap::new(),
            stats: CacheStats::new(),
            ttl,
            persistence: None,
        }
    }

    /// Creates a store backed by `persistence`, loading whatever it holds.
    ///
    /// Records that expired while the process was down are dropped and the
    /// slot is rewritten.
    pub fn open(ttl: Duration, persistence: RecordPersistence) -> Self {
        let records = persistence.load();
        let mut store = Self {
            records,
            stats: CacheStats::new(),
            ttl,
            persistence: Some(persistence),
        };
        let restored = store.records.len();
        let expired = store.sweep_expired(&HashSet::new());
        debug!(restored, expired, "Cache store opened");
        store
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // == Get ==
    /// Returns the record for `document_id`.
    ///
    /// A record older than the TTL is deleted and reported as absent.
    pub fn get(&mut self, document_id: &str) -> Option<CacheRecord> {
        let expired = match self.records.get(document_id) {
            Some(record) => record.is_expired_at(Utc::now(), self.ttl),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            self.records.remove(document_id);
            self.stats.record_miss();
            self.stats.record_evictions(1);
            debug!(document_id, "Evicted expired record on read");
            self.persist();
            return None;
        }

        self.stats.record_hit();
        self.records.get(document_id).cloned()
    }

    // == Put ==
    /// Inserts or replaces the record for its document identifier.
    pub fn put(&mut self, record: CacheRecord) {
        self.records.insert(record.document_id.clone(), record);
        self.persist();
    }

    // == Delete ==
    /// Removes the record for `document_id`, returning it if present.
    pub fn delete(&mut self, document_id: &str) -> Option<CacheRecord> {
        let removed = self.records.remove(document_id);
        if removed.is_some() {
            self.persist();
        }
        removed
    }

    /// True iff [`get`](Self::get) yields a `Loaded` record.
    pub fn is_loaded(&mut self, document_id: &str) -> bool {
        matches!(self.get(document_id), Some(r) if r.status == RecordStatus::Loaded)
    }

    /// True iff a live `Loading` record exists. Does not consult in-flight
    /// registrations; see `ActivationCoordinator::is_loading`.
    pub fn is_loading(&mut self, document_id: &str) -> bool {
        matches!(self.get(document_id), Some(r) if r.status == RecordStatus::Loading)
    }

    // == Sweep Expired ==
    /// Removes every expired record whose identifier is not in `pinned`,
    /// with a single persistence write for the whole batch.
    ///
    /// Returns the number of records removed.
    pub fn sweep_expired(&mut self, pinned: &HashSet<String>) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = self
            .records
            .iter()
            .filter(|(id, record)| !pinned.contains(*id) && record.is_expired_at(now, self.ttl))
            .map(|(id, _)| id.clone())
            .collect();

        let count = expired.len();
        if count == 0 {
            return 0;
        }

        for id in expired {
            self.records.remove(&id);
        }
        self.stats.record_evictions(count);
        self.persist();
        count
    }

    // == Clear ==
    /// Removes every record. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.records.len();
        self.records.clear();
        self.persist();
        count
    }

    /// Live records, ordered by document identifier.
    pub fn records(&self) -> Vec<CacheRecord> {
        let now = Utc::now();
        let mut live: Vec<CacheRecord> = self
            .records
            .values()
            .filter(|r| !r.is_expired_at(now, self.ttl))
            .cloned()
            .collect();
        live.sort_by(|a, b| a.document_id.cmp(&b.document_id));
        live
    }

    // == Stats ==
    /// Returns counters plus a per-status breakdown of live records.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        for record in self.records() {
            match record.status {
                RecordStatus::Loading => stats.loading += 1,
                RecordStatus::Loaded => stats.loaded += 1,
                RecordStatus::Error => stats.errored += 1,
            }
        }
        stats.approx_bytes = encode_records(self.records.values())
            .map(|s| s.len())
            .unwrap_or(0);
        stats
    }

    // == Flush ==
    /// Writes the record set to the durable slot now, surfacing failures.
    pub fn flush(&self) -> PersistResult<usize> {
        match &self.persistence {
            Some(persistence) => persistence.save(&self.records),
            None => Ok(0),
        }
    }

    /// Write-through after a mutation. Failures are logged; the in-memory
    /// map stays authoritative and the next write retries.
    ///
    /// Blocks the calling task under the store lock. The slot holds one
    /// small JSON array and is written once per user-driven state change.
    fn persist(&self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "Failed to persist cache records");
        }
    }

    // == Length ==
    /// Returns the number of records held, expired or not.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
