//! Key-value persistence for cache and quota state.
//!
//! This module handles:
//! - The [`Store`] trait injected into the feed layer
//! - In-memory store for tests
//! - JSON-file-per-key store for production

pub mod file;

use dashmap::DashMap;

use crate::error::PersistenceError;

pub use file::JsonFileStore;

/// Durable key-value storage.
///
/// Reads fail open at the call sites (a missing or corrupt value degrades to
/// empty state); writes fail loud so data loss stays visible in the logs.
pub trait Store: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Write `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

/// In-memory store used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries.get(key).map(|v| v.clone()))
    }

    fn put(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
