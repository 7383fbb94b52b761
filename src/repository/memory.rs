//! In-memory repository implementation

use super::traits::{Record, RecordKey, RecordRepository};
use crate::error::{TenantryError, TenantryResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Record repository held entirely in memory
#[derive(Default)]
pub struct MemoryRecordRepository {
    records: RwLock<BTreeMap<RecordKey, Value>>,
}

impl MemoryRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository pre-populated with `records`
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let map = records
            .into_iter()
            .map(|record| (record.key(), record.data))
            .collect();
        Self {
            records: RwLock::new(map),
        }
    }

    pub(crate) fn snapshot(&self) -> TenantryResult<BTreeMap<RecordKey, Value>> {
        Ok(self.records.read()?.clone())
    }
}

fn to_record(key: &RecordKey, data: Value) -> Record {
    Record {
        tenant: key.tenant.clone(),
        collection: key.collection.clone(),
        id: key.id.clone(),
        data,
    }
}

impl RecordRepository for MemoryRecordRepository {
    fn insert(&self, key: &RecordKey, data: Value) -> TenantryResult<Record> {
        let mut records = self.records.write()?;
        if records.contains_key(key) {
            return Err(TenantryError::Conflict(format!("record {} already exists", key)));
        }
        records.insert(key.clone(), data.clone());
        Ok(to_record(key, data))
    }

    fn update(&self, key: &RecordKey, data: Value) -> TenantryResult<Record> {
        let mut records = self.records.write()?;
        match records.get_mut(key) {
            Some(existing) => {
                *existing = data.clone();
                Ok(to_record(key, data))
            }
            None => Err(TenantryError::NotFound(format!("record {}", key))),
        }
    }

    fn get(&self, key: &RecordKey) -> TenantryResult<Option<Record>> {
        let records = self.records.read()?;
        Ok(records.get(key).map(|data| to_record(key, data.clone())))
    }

    fn list(&self, tenant: &str, collection: &str) -> TenantryResult<Vec<Record>> {
        let records = self.records.read()?;
        Ok(records
            .iter()
            .filter(|(key, _)| key.tenant == tenant && key.collection == collection)
            .map(|(key, data)| to_record(key, data.clone()))
            .collect())
    }

    fn delete(&self, key: &RecordKey) -> TenantryResult<()> {
        let mut records = self.records.write()?;
        records
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| TenantryError::NotFound(format!("record {}", key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_get_list() {
        let repo = MemoryRecordRepository::new();
        repo.insert(&RecordKey::new("acme", "items", "b"), json!({"q": 2}))
            .unwrap();
        repo.insert(&RecordKey::new("acme", "items", "a"), json!({"q": 1}))
            .unwrap();
        repo.insert(&RecordKey::new("globex", "items", "a"), json!({"q": 9}))
            .unwrap();

        let acme = repo.list("acme", "items").unwrap();
        assert_eq!(acme.len(), 2);
        assert_eq!(acme[0].id, "a");

        let record = repo.get(&RecordKey::new("globex", "items", "a")).unwrap().unwrap();
        assert_eq!(record.data["q"], 9);
        assert_eq!(repo.count("acme", "items").unwrap(), 2);
    }

    #[test]
    fn test_insert_conflict() {
        let repo = MemoryRecordRepository::new();
        let key = RecordKey::new("acme", "items", "a");
        repo.insert(&key, json!({})).unwrap();
        let result = repo.insert(&key, json!({}));
        assert!(matches!(result, Err(TenantryError::Conflict(_))));
    }

    #[test]
    fn test_update_and_delete_missing() {
        let repo = MemoryRecordRepository::new();
        let key = RecordKey::new("acme", "items", "missing");
        assert!(matches!(repo.update(&key, json!({})), Err(TenantryError::NotFound(_))));
        assert!(matches!(repo.delete(&key), Err(TenantryError::NotFound(_))));
    }

    #[test]
    fn test_update_replaces_data() {
        let key = RecordKey::new("acme", "items", "a");
        let repo = MemoryRecordRepository::with_records(vec![Record {
            tenant: "acme".to_string(),
            collection: "items".to_string(),
            id: "a".to_string(),
            data: json!({"q": 1}),
        }]);

        repo.update(&key, json!({"q": 5})).unwrap();
        assert_eq!(repo.get(&key).unwrap().unwrap().data["q"], 5);

        repo.delete(&key).unwrap();
        assert!(!repo.exists(&key).unwrap());
    }
}
