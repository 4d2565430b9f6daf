//! Persistence for tasks and chat transcripts over a flat key/value backend.

pub mod messages;
pub mod tasks;

use crate::errors::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Flat JSON key/value storage. Batched writes land atomically so a task and
/// its pending pointer never persist half-updated.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    async fn remove_many(&self, keys: &[String]) -> Result<()>;
    async fn entries(&self) -> Result<Vec<(String, Value)>>;
}

/// In-memory backend.
#[derive(Default)]
pub struct MemoryStorage {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<()> {
        let mut values = self.values.write().await;
        for (key, value) in entries {
            values.insert(key, value);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.write().await.remove(key);
        Ok(())
    }

    async fn remove_many(&self, keys: &[String]) -> Result<()> {
        let mut values = self.values.write().await;
        for key in keys {
            values.remove(key);
        }
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<(String, Value)>> {
        Ok(self
            .values
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
