use async_trait::async_trait;

use crate::errors::StorageError;

/// Result of an atomic check-and-insert.
#[derive(Clone, Debug, PartialEq)]
pub enum InsertOutcome {
    /// The key was vacant; the supplied value is now stored.
    Inserted,
    /// The key was occupied; the stored value is returned untouched.
    Existing(serde_json::Value),
}

/// Key/value contract backing the conversation stores. Each logical store is
/// addressed by name; operations are atomic per key within a store.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, store: &str, key: &str) -> Result<Option<serde_json::Value>, StorageError>;

    /// Overwrite semantics; a reader never observes a partial value.
    async fn put(
        &self,
        store: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), StorageError>;

    /// Single combined check-then-insert. Under concurrent attempts for one
    /// key, exactly one caller gets `Inserted`; the rest observe the winner.
    async fn insert_if_absent(
        &self,
        store: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<InsertOutcome, StorageError>;

    /// Idempotent; removing an absent key is not an error.
    async fn delete(&self, store: &str, key: &str) -> Result<(), StorageError>;

    /// Snapshot of the store's current entries, for maintenance sweeps.
    async fn entries(&self, store: &str) -> Result<Vec<(String, serde_json::Value)>, StorageError>;
}
