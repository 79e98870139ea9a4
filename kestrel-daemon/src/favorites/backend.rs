use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::FavoriteRecord;
use crate::error::StoreError;
use crate::persist::JsonFile;

/// Durable home of the favorite records.
pub trait FavoritesBackend: Send + Sync {
    fn load(&self) -> Result<Vec<FavoriteRecord>, StoreError>;

    /// Replaces the whole persisted set.
    fn save(&self, records: &[FavoriteRecord]) -> Result<(), StoreError>;

    /// Moves unreadable content out of the way so that saving cannot
    /// destroy it.
    fn set_aside(&self) -> Result<PathBuf, StoreError>;
}

impl FavoritesBackend for JsonFile {
    fn load(&self) -> Result<Vec<FavoriteRecord>, StoreError> {
        JsonFile::load(self)
    }

    fn save(&self, records: &[FavoriteRecord]) -> Result<(), StoreError> {
        JsonFile::save(self, records)
    }

    fn set_aside(&self) -> Result<PathBuf, StoreError> {
        JsonFile::set_aside(self)
    }
}

/// Keeps records in memory. Reads and writes can be made to fail for
/// testing error paths; unreadable content cannot be set aside.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Mutex<Vec<FavoriteRecord>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryBackend {
    pub fn with_records(records: Vec<FavoriteRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<FavoriteRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl FavoritesBackend for MemoryBackend {
    fn load(&self) -> Result<Vec<FavoriteRecord>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Read {
                path: "memory".into(),
                source: std::io::Error::other("reads disabled"),
            });
        }
        Ok(self.records())
    }

    fn save(&self, records: &[FavoriteRecord]) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(unavailable("writes disabled"));
        }
        if let Ok(mut stored) = self.records.lock() {
            *stored = records.to_vec();
        }
        Ok(())
    }

    fn set_aside(&self) -> Result<PathBuf, StoreError> {
        Err(unavailable("nothing to move"))
    }
}

fn unavailable(reason: &str) -> StoreError {
    StoreError::Write {
        path: "memory".into(),
        source: std::io::Error::other(reason.to_string()),
    }
}
