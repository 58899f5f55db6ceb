//! Per-installation session identifier.

use tracing::info;
use uuid::Uuid;

use crate::error::PersistResult;
use crate::persistence::{SlotStore, SESSION_SLOT};

/// Returns the persisted session identifier, generating and persisting a new
/// one on first use.
pub fn load_or_create_session_id(slots: &dyn SlotStore) -> PersistResult<String> {
    if let Some(existing) = slots.read(SESSION_SLOT)? {
        let existing = existing.trim();
        if !existing.is_empty() {
            return Ok(existing.to_string());
        }
    }

    let session_id = format!("session_{}", Uuid::new_v4().simple());
    slots.write(SESSION_SLOT, &session_id)?;
    info!(session_id = %session_id, "Generated new session identifier");
    Ok(session_id)
}
