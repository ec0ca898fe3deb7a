//! The `StorageBackend` trait

use crate::error::StorageResult;

/// Backend-agnostic storage on named logical keys.
///
/// This trait allows different storage implementations (in-memory, file-backed)
/// to be used interchangeably by the coordination layer. Each method is atomic
/// per call; concurrent appenders to the same key are serialized by the
/// backend.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Append `text` to the value under `key`, creating the key if absent.
    async fn append(&self, key: &str, text: &str) -> StorageResult<()>;

    /// Read the full value under `key`, or `None` if the key is absent.
    async fn read(&self, key: &str) -> StorageResult<Option<String>>;

    /// Overwrite the value under `key`, creating the key if absent.
    async fn write(&self, key: &str, text: &str) -> StorageResult<()>;

    /// List key remainders under `prefix` (the part after the prefix).
    ///
    /// `list("document/")` returns the document names, not the full keys.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Whether `key` currently holds a value.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Backend name (for logging)
    fn name(&self) -> &str;
}
