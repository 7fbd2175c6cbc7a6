//! The storage collaborator: a narrow put/get contract addressed to whichever
//! node the router resolves as responsible for a key's identifier.
//!
//! The core supplies only the "who is responsible" answer; placement,
//! replication and migration on membership change are explicitly someone
//! else's job.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::StorageError;

#[async_trait]
pub trait StorageService: Send + Sync {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
}

/// Volatile in-memory backend, one per node in the simulation.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StorageService for MemoryStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        self.entries
            .write()
            .unwrap()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }
}
