//! File-based repository implementation
//!
//! Records are kept in memory and the whole set is rewritten as one JSON
//! document after every successful mutation. A mutation whose write fails is
//! rolled back, so memory never holds what the file does not.

use super::memory::MemoryRecordRepository;
use super::traits::{Record, RecordKey, RecordRepository};
use crate::error::{TenantryError, TenantryResult};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// JSON-file backed record repository
pub struct FileRecordRepository {
    store_path: PathBuf,
    inner: MemoryRecordRepository,
    /// Serializes writers so the file always reflects a complete snapshot
    write_lock: Mutex<()>,
}

impl FileRecordRepository {
    /// Open the store at `store_path`, loading existing records if the file exists
    pub fn open(store_path: impl Into<PathBuf>) -> TenantryResult<Self> {
        let store_path = store_path.into();
        let records = if store_path.exists() {
            let content = std::fs::read_to_string(&store_path)?;
            if content.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str::<Vec<Record>>(&content).map_err(|e| {
                    TenantryError::Repository(format!(
                        "Failed to parse {}: {}",
                        store_path.display(),
                        e
                    ))
                })?
            }
        } else {
            Vec::new()
        };

        tracing::debug!(
            path = %store_path.display(),
            records = records.len(),
            "Opened record store"
        );

        Ok(Self {
            store_path,
            inner: MemoryRecordRepository::with_records(records),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.store_path
    }

    fn persist(&self) -> TenantryResult<()> {
        let records: Vec<Record> = self
            .inner
            .snapshot()?
            .into_iter()
            .map(|(key, data)| Record {
                tenant: key.tenant,
                collection: key.collection,
                id: key.id,
                data,
            })
            .collect();

        if let Some(parent) = self.store_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(&records)?;
        let tmp_path = self.store_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)
            .map_err(|e| TenantryError::Repository(format!("Failed to write store: {}", e)))?;
        std::fs::rename(&tmp_path, &self.store_path)
            .map_err(|e| TenantryError::Repository(format!("Failed to replace store: {}", e)))?;
        Ok(())
    }
}

impl RecordRepository for FileRecordRepository {
    fn insert(&self, key: &RecordKey, data: Value) -> TenantryResult<Record> {
        let _guard = self.write_lock.lock()?;
        let record = self.inner.insert(key, data)?;
        if let Err(e) = self.persist() {
            self.inner.delete(key)?;
            return Err(e);
        }
        Ok(record)
    }

    fn update(&self, key: &RecordKey, data: Value) -> TenantryResult<Record> {
        let _guard = self.write_lock.lock()?;
        let previous = self.inner.get(key)?;
        let record = self.inner.update(key, data)?;
        if let Err(e) = self.persist() {
            if let Some(previous) = previous {
                self.inner.update(key, previous.data)?;
            }
            return Err(e);
        }
        Ok(record)
    }

    fn get(&self, key: &RecordKey) -> TenantryResult<Option<Record>> {
        self.inner.get(key)
    }

    fn list(&self, tenant: &str, collection: &str) -> TenantryResult<Vec<Record>> {
        self.inner.list(tenant, collection)
    }

    fn delete(&self, key: &RecordKey) -> TenantryResult<()> {
        let _guard = self.write_lock.lock()?;
        let previous = self.inner.get(key)?;
        self.inner.delete(key)?;
        if let Err(e) = self.persist() {
            if let Some(previous) = previous {
                self.inner.insert(key, previous.data)?;
            }
            return Err(e);
        }
        Ok(())
    }
}
