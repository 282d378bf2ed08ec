//! Persistence gateway.
//!
//! The engine treats storage as an opaque async key-value store of JSON
//! values. Keys are composed by [`crate::identity`]; no schema versioning
//! exists, so readers backfill defaults for anything missing or malformed.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to read store: {0}")]
    Read(String),
    #[error("Failed to write store: {0}")]
    Write(String),
    #[error("Failed to parse store: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageRecord = HashMap<String, Value>;

#[async_trait(?Send)]
pub trait StorageGateway {
    /// Read the given keys. Missing keys are simply absent from the result.
    async fn read(&self, keys: &[String]) -> Result<StorageRecord, StorageError>;

    /// Upsert every entry of `record`.
    async fn write(&self, record: StorageRecord) -> Result<(), StorageError>;

    async fn clear(&self) -> Result<(), StorageError>;
}

/// Read a single key, treating any failure as absent.
pub async fn read_one(storage: &dyn StorageGateway, key: &str) -> Option<Value> {
    match storage.read(&[key.to_string()]).await {
        Ok(mut record) => record.remove(key),
        Err(e) => {
            tracing::warn!("Storage read of {} failed: {}", key, e);
            None
        }
    }
}

/// Write a single key, logging failures. The next write retries implicitly.
pub async fn write_one(storage: &dyn StorageGateway, key: &str, value: Value) -> bool {
    let record = StorageRecord::from([(key.to_string(), value)]);
    match storage.write(record).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Storage write of {} failed: {}", key, e);
            false
        }
    }
}

// =============================================================================
// MemoryStorage
// =============================================================================

/// In-process store. Counts reads so callers can assert batching.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<StorageRecord>,
    reads: Cell<usize>,
    writes: Cell<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: StorageRecord) -> Self {
        Self {
            entries: RefCell::new(entries),
            ..Self::default()
        }
    }

    /// Number of `read` calls served so far
    pub fn read_count(&self) -> usize {
        self.reads.get()
    }

    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: Value) {
        self.entries.borrow_mut().insert(key.to_string(), value);
    }
}

#[async_trait(?Send)]
impl StorageGateway for MemoryStorage {
    async fn read(&self, keys: &[String]) -> Result<StorageRecord, StorageError> {
        self.reads.set(self.reads.get() + 1);
        let entries = self.entries.borrow();
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }

    async fn write(&self, record: StorageRecord) -> Result<(), StorageError> {
        self.writes.set(self.writes.get() + 1);
        self.entries.borrow_mut().extend(record);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.entries.borrow_mut().clear();
        Ok(())
    }
}

// =============================================================================
// JsonFileStorage - pretty-printed JSON map on disk
// =============================================================================

/// File-backed store: the whole map is loaded on open and rewritten on every
/// write (write-to-temp-then-rename so a crash never leaves a torn file).
pub struct JsonFileStorage {
    path: PathBuf,
    entries: RefCell<StorageRecord>,
    /// Error encountered while loading (surfaced to the caller once)
    load_error: RefCell<Option<String>>,
}

impl JsonFileStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let (entries, load_error) = match Self::load_from_file(&path) {
            Ok(entries) => (entries, None),
            Err(e) => (StorageRecord::new(), Some(e.to_string())),
        };
        Self {
            path,
            entries: RefCell::new(entries),
            load_error: RefCell::new(load_error),
        }
    }

    fn load_from_file(path: &Path) -> Result<StorageRecord, StorageError> {
        if !path.exists() {
            return Ok(StorageRecord::new());
        }
        let contents = fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(StorageRecord::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn save_to_file(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&*self.entries.borrow())?;
        let temp_file = self.path.with_extension("json.tmp");
        fs::write(&temp_file, json).map_err(|e| StorageError::Write(e.to_string()))?;
        fs::rename(&temp_file, &self.path).map_err(|e| StorageError::Write(e.to_string()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the load error, if the file existed but could not be parsed
    pub fn take_load_error(&self) -> Option<String> {
        self.load_error.borrow_mut().take()
    }
}

#[async_trait(?Send)]
impl StorageGateway for JsonFileStorage {
    async fn read(&self, keys: &[String]) -> Result<StorageRecord, StorageError> {
        let entries = self.entries.borrow();
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }

    async fn write(&self, record: StorageRecord) -> Result<(), StorageError> {
        self.entries.borrow_mut().extend(record);
        self.save_to_file()
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.entries.borrow_mut().clear();
        self.save_to_file()
    }
}
