//! In-Flight Operation Tracker
//!
//! Maps a document identifier to the shared handle of its running activation
//! so concurrent callers await one run instead of starting another.
//!
//! The tracker itself is not synchronized; the coordinator keeps it behind a
//! mutex so that check-then-register is atomic.

use std::collections::{HashMap, HashSet};
use std::fmt;

use futures::future::{BoxFuture, Shared};

use crate::remote::Activation;

/// Terminal outcome of one activation run.
pub type Outcome = crate::error::Result<Activation>;

/// Cloneable handle every joined caller awaits.
pub type SharedOutcome = Shared<BoxFuture<'static, Outcome>>;

// == Ticket ==
/// Identifies one registration. A run may only release the registration it
/// was issued, so a run superseded by a reset cannot clear its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

struct Registration {
    ticket: Ticket,
    handle: SharedOutcome,
}

// == In-Flight Tracker ==
#[derive(Default)]
pub struct InFlightTracker {
    entries: HashMap<String, Registration>,
    next_ticket: u64,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // == Register ==
    /// Registers `handle` as the run for `document_id`.
    ///
    /// If a run is already registered it is left untouched and its handle
    /// is returned as the error, so the caller can join it instead.
    pub fn register(
        &mut self,
        document_id: &str,
        handle: SharedOutcome,
    ) -> std::result::Result<Ticket, SharedOutcome> {
        if let Some(existing) = self.join(document_id) {
            return Err(existing);
        }
        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        self.entries
            .insert(document_id.to_string(), Registration { ticket, handle });
        Ok(ticket)
    }

    // == Join ==
    /// Returns a handle to the running activation, if any.
    pub fn join(&self, document_id: &str) -> Option<SharedOutcome> {
        self.entries.get(document_id).map(|r| r.handle.clone())
    }

    // == Release ==
    /// Removes the registration if it still carries `ticket`.
    ///
    /// Returns false when the registration was revoked or replaced.
    pub fn release(&mut self, document_id: &str, ticket: Ticket) -> bool {
        match self.entries.get(document_id) {
            Some(r) if r.ticket == ticket => {
                self.entries.remove(document_id);
                true
            }
            _ => false,
        }
    }

    /// Drops the registration regardless of ticket. The run keeps going and
    /// its joined callers still receive its outcome.
    pub fn revoke(&mut self, document_id: &str) -> bool {
        self.entries.remove(document_id).is_some()
    }

    pub fn revoke_all(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn contains(&self, document_id: &str) -> bool {
        self.entries.contains_key(document_id)
    }

    pub fn document_ids(&self) -> HashSet<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for InFlightTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlightTracker")
            .field("documents", &self.entries.keys().collect::<Vec<_>>())
            .field("next_ticket", &self.next_ticket)
            .finish()
    }
}
