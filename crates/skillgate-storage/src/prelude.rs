pub use crate::errors::StorageError;
pub use crate::kv::{InsertOutcome, KvStore};
pub use crate::memory::MemoryKvStore;
