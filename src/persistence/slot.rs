//! Durable slot backends.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use uuid::Uuid;

use crate::error::PersistResult;

/// A local key-value store of named string slots.
///
/// Not shared across machines. Implementations must make `write` atomic with
/// respect to a concurrent `read` of the same slot.
pub trait SlotStore: Send + Sync + std::fmt::Debug {
    /// Returns the slot contents, or `None` if the slot was never written.
    fn read(&self, slot: &str) -> PersistResult<Option<String>>;

    /// Replaces the slot contents.
    fn write(&self, slot: &str, contents: &str) -> PersistResult<()>;
}

// == File Slot Store ==
/// Stores each slot as `<dir>/<slot>.json`.
#[derive(Debug, Clone)]
pub struct FileSlotStore {
    dir: PathBuf,
}

impl FileSlotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slot))
    }
}

impl SlotStore for FileSlotStore {
    fn read(&self, slot: &str) -> PersistResult<Option<String>> {
        match fs::read_to_string(self.slot_path(slot)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, slot: &str, contents: &str) -> PersistResult<()> {
        fs::create_dir_all(&self.dir)?;

        // Write to a sibling temp file, then rename over the slot
        let temp_path = self.dir.join(format!(".{}.tmp", Uuid::new_v4()));
        let result = (|| {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
            fs::rename(&temp_path, self.slot_path(slot))
        })();

        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        Ok(result?)
    }
}

// == Memory Slot Store ==
/// Process-local slots, for embedding without a filesystem and for tests.
#[derive(Debug, Default)]
pub struct MemorySlotStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SlotStore for MemorySlotStore {
    fn read(&self, slot: &str) -> PersistResult<Option<String>> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Ok(slots.get(slot).cloned())
    }

    fn write(&self, slot: &str, contents: &str) -> PersistResult<()> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.insert(slot.to_string(), contents.to_string());
        Ok(())
    }
}
