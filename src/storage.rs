// ABOUTME: PIIStorageProvider trait for session-bound encrypted map persistence
// ABOUTME: In-memory default backend, mirroring the cache::CacheProvider pluggable-backend shape
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Storage (C18, §4.15).

use crate::errors::StorageError;
use crate::types::EncryptedPIIMap;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Session-keyed persistence for encrypted PII maps (§4.13, §4.15).
#[async_trait]
pub trait PIIStorageProvider: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<EncryptedPIIMap>, StorageError>;
    async fn store(&self, session_id: &str, map: EncryptedPIIMap) -> Result<(), StorageError>;
    async fn delete(&self, session_id: &str) -> Result<(), StorageError>;
    async fn exists(&self, session_id: &str) -> Result<bool, StorageError>;
}

/// Reference in-memory backend: a mutex-guarded hash map, mirroring the
/// teacher's `memory.rs` cache backend (§4.15).
#[derive(Default)]
pub struct MemoryPiiStorage {
    entries: Mutex<HashMap<String, EncryptedPIIMap>>,
}

impl MemoryPiiStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PIIStorageProvider for MemoryPiiStorage {
    async fn load(&self, session_id: &str) -> Result<Option<EncryptedPIIMap>, StorageError> {
        let entries = self.entries.lock().await;
        Ok(entries.get(session_id).cloned())
    }

    async fn store(&self, session_id: &str, map: EncryptedPIIMap) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().await;
        entries.insert(session_id.to_string(), map);
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().await;
        entries.remove(session_id);
        Ok(())
    }

    async fn exists(&self, session_id: &str) -> Result<bool, StorageError> {
        let entries = self.entries.lock().await;
        Ok(entries.contains_key(session_id))
    }
}
