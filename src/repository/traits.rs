//! Repository trait definitions

use crate::error::TenantryResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Address of one record
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub tenant: String,
    pub collection: String,
    pub id: String,
}

impl RecordKey {
    pub fn new(
        tenant: impl Into<String>,
        collection: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.tenant, self.collection, self.id)
    }
}

/// A stored record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub tenant: String,
    pub collection: String,
    pub id: String,
    pub data: Value,
}

impl Record {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.tenant, &self.collection, &self.id)
    }
}

/// Tenant-scoped record storage
///
/// Implementations must be safe to share across concurrently running
/// pipelines.
pub trait RecordRepository: Send + Sync {
    /// Insert a new record; fails with `Conflict` if the key already exists
    fn insert(&self, key: &RecordKey, data: Value) -> TenantryResult<Record>;

    /// Replace the data of an existing record; fails with `NotFound` if absent
    fn update(&self, key: &RecordKey, data: Value) -> TenantryResult<Record>;

    fn get(&self, key: &RecordKey) -> TenantryResult<Option<Record>>;

    /// All records of one tenant's collection, ordered by id
    fn list(&self, tenant: &str, collection: &str) -> TenantryResult<Vec<Record>>;

    /// Remove a record; fails with `NotFound` if absent
    fn delete(&self, key: &RecordKey) -> TenantryResult<()>;

    fn exists(&self, key: &RecordKey) -> TenantryResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    fn count(&self, tenant: &str, collection: &str) -> TenantryResult<usize> {
        Ok(self.list(tenant, collection)?.len())
    }
}
