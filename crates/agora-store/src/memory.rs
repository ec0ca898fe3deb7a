//! In-memory storage backend

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::backend::StorageBackend;
use crate::error::StorageResult;

/// In-memory storage backed by a `HashMap<key, value>`.
///
/// Satisfies the `StorageBackend` contract without touching the filesystem.
/// State dies with the process; use `FileStorage` for durable runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl StorageBackend for MemoryStorage {
    async fn append(&self, key: &str, text: &str) -> StorageResult<()> {
        let mut entries = self.entries.write().await;
        entries.entry(key.to_string()).or_default().push_str(text);
        Ok(())
    }

    async fn read(&self, key: &str) -> StorageResult<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn write(&self, key: &str, text: &str) -> StorageResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), text.to_string());
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let entries = self.entries.read().await;
        let mut names: Vec<String> = entries
            .keys()
            .filter_map(|k| k.strip_prefix(prefix))
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let entries = self.entries.read().await;
        Ok(entries.contains_key(key))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
