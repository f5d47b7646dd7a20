pub mod errors;
pub mod kv;
pub mod memory;
pub mod prelude;

pub use errors::StorageError;
pub use kv::{InsertOutcome, KvStore};
pub use memory::MemoryKvStore;
