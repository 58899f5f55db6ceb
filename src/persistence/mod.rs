//! Persistence Module
//!
//! Durable named slots that survive process restarts, the JSON codec for the
//! record set, and the per-installation session identifier.

mod codec;
mod session;
mod slot;

pub use codec::{decode_records, encode_records, RecordPersistence};
pub use session::load_or_create_session_id;
pub use slot::{FileSlotStore, MemorySlotStore, SlotStore};

// == Slot Names ==
/// Slot holding the serialized cache records
pub const RECORDS_SLOT: &str = "document_cache";

/// Slot holding the generated session identifier
pub const SESSION_SLOT: &str = "session_id";
