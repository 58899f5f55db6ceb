//! Record set codec and the persistence adapter used by the store.
//!
//! The slot holds a JSON array of `[documentId, record]` pairs, with
//! timestamps as RFC 3339 strings.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::cache::CacheRecord;
use crate::error::PersistResult;
use crate::persistence::{SlotStore, RECORDS_SLOT};

/// Serializes records as `[[id, record], ...]`.
pub fn encode_records<'a, I>(records: I) -> PersistResult<String>
where
    I: IntoIterator<Item = &'a CacheRecord>,
{
    let pairs: Vec<(&str, &CacheRecord)> = records
        .into_iter()
        .map(|record| (record.document_id.as_str(), record))
        .collect();
    Ok(serde_json::to_string(&pairs)?)
}

/// Parses the output of [`encode_records`]. The pair key is authoritative
/// for the record's document identifier.
pub fn decode_records(raw: &str) -> PersistResult<Vec<CacheRecord>> {
    let pairs: Vec<(String, CacheRecord)> = serde_json::from_str(raw)?;
    Ok(pairs
        .into_iter()
        .map(|(document_id, mut record)| {
            record.document_id = document_id;
            record
        })
        .collect())
}

// == Record Persistence ==
/// Reads and writes the full record set to one named slot.
#[derive(Debug, Clone)]
pub struct RecordPersistence {
    slots: Arc<dyn SlotStore>,
    slot: String,
}

impl RecordPersistence {
    pub fn new(slots: Arc<dyn SlotStore>) -> Self {
        Self {
            slots,
            slot: RECORDS_SLOT.to_string(),
        }
    }

    /// Loads the persisted records.
    ///
    /// Unreadable or corrupt contents yield an empty set; the slot is
    /// overwritten by the next save.
    pub fn load(&self) -> HashMap<String, CacheRecord> {
        let raw = match self.slots.read(&self.slot) {
            Ok(Some(raw)) => raw,
            Ok(None) => return HashMap::new(),
            Err(e) => {
                warn!(slot = %self.slot, error = %e, "Failed to read persisted cache, starting empty");
                return HashMap::new();
            }
        };

        match decode_records(&raw) {
            Ok(records) => records
                .into_iter()
                .map(|record| (record.document_id.clone(), record))
                .collect(),
            Err(e) => {
                warn!(slot = %self.slot, error = %e, "Discarding corrupt persisted cache");
                HashMap::new()
            }
        }
    }

    /// Writes the full record set, returning the serialized size in bytes.
    pub fn save(&self, records: &HashMap<String, CacheRecord>) -> PersistResult<usize> {
        let encoded = encode_records(records.values())?;
        self.slots.write(&self.slot, &encoded)?;
        Ok(encoded.len())
    }
}
