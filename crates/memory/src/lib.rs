//! Persistent store implementations for Sleuth.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteKeyValueStore, SqliteSocialStore};
