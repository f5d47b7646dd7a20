use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::StorageError;
use crate::kv::{InsertOutcome, KvStore};

/// Process-local store. Suitable for a single gateway instance; a shared
/// deployment swaps in another `KvStore` implementation.
#[derive(Clone, Default)]
pub struct MemoryKvStore {
    inner: Arc<RwLock<HashMap<String, HashMap<String, serde_json::Value>>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, store: &str, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        let guard = self.inner.read();
        Ok(guard.get(store).and_then(|m| m.get(key).cloned()))
    }

    async fn put(
        &self,
        store: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), StorageError> {
        let mut guard = self.inner.write();
        guard
            .entry(store.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn insert_if_absent(
        &self,
        store: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<InsertOutcome, StorageError> {
        let mut guard = self.inner.write();
        let map = guard.entry(store.to_string()).or_default();
        match map.get(key) {
            Some(existing) => Ok(InsertOutcome::Existing(existing.clone())),
            None => {
                map.insert(key.to_string(), value);
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn delete(&self, store: &str, key: &str) -> Result<(), StorageError> {
        let mut guard = self.inner.write();
        if let Some(map) = guard.get_mut(store) {
            map.remove(key);
        }
        Ok(())
    }

    async fn entries(&self, store: &str) -> Result<Vec<(String, serde_json::Value)>, StorageError> {
        let guard = self.inner.read();
        Ok(guard
            .get(store)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn values_cycle_through_put_get_delete() {
        let store = MemoryKvStore::new();
        store.put("conv", "k1", json!({"field": 1})).await.unwrap();

        assert_eq!(
            store.get("conv", "k1").await.unwrap(),
            Some(json!({"field": 1}))
        );

        store.delete("conv", "k1").await.unwrap();
        assert!(store.get("conv", "k1").await.unwrap().is_none());

        // Deleting again stays quiet.
        store.delete("conv", "k1").await.unwrap();
    }

    #[tokio::test]
    async fn stores_are_isolated_by_name() {
        let store = MemoryKvStore::new();
        store.put("a", "k", json!(1)).await.unwrap();
        assert!(store.get("b", "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_if_absent_reports_existing_value() {
        let store = MemoryKvStore::new();
        let first = store
            .insert_if_absent("conv", "k1", json!({"winner": true}))
            .await
            .unwrap();
        assert_eq!(first, InsertOutcome::Inserted);

        let second = store
            .insert_if_absent("conv", "k1", json!({"winner": false}))
            .await
            .unwrap();
        assert_eq!(second, InsertOutcome::Existing(json!({"winner": true})));
    }

    #[tokio::test]
    async fn concurrent_insert_if_absent_has_one_winner() {
        let store = MemoryKvStore::new();
        let mut tasks = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .insert_if_absent("conv", "shared", json!({ "attempt": i }))
                    .await
                    .unwrap()
            }));
        }

        let mut inserted = 0;
        for task in tasks {
            if task.await.unwrap() == InsertOutcome::Inserted {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(store.entries("conv").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn entries_snapshot_lists_current_keys() {
        let store = MemoryKvStore::new();
        store.put("conv", "k1", json!(1)).await.unwrap();
        store.put("conv", "k2", json!(2)).await.unwrap();

        let mut keys: Vec<String> = store
            .entries("conv")
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["k1".to_string(), "k2".to_string()]);
    }
}
