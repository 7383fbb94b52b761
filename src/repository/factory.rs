//! Repository factory for creating repository instances
//!
//! This factory provides a centralized way to create the record repository
//! with the appropriate backend based on configuration.

use super::file::FileRecordRepository;
use super::memory::MemoryRecordRepository;
use super::traits::RecordRepository;
use crate::config::StorageConfig;
use crate::error::TenantryResult;
use std::sync::Arc;

pub struct RepositoryFactory;

impl RepositoryFactory {
    /// File-backed when `storage.path` is set, in-memory otherwise
    pub fn from_config(storage: &StorageConfig) -> TenantryResult<Arc<dyn RecordRepository>> {
        match &storage.path {
            Some(path) => {
                tracing::info!(path = %path.display(), "Using file record repository");
                Ok(Arc::new(FileRecordRepository::open(path.clone())?))
            }
            None => {
                tracing::info!("Using in-memory record repository");
                Ok(Arc::new(MemoryRecordRepository::new()))
            }
        }
    }
}
