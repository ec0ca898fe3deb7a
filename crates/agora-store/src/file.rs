//! File-backed storage backend

use std::path::{Component, Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};

/// File-backed storage rooted at a directory.
///
/// Each logical key maps to a relative file path under the root; `/` in the
/// key becomes a directory separator. Keys that are empty, absolute, or
/// contain `..` segments are rejected before any I/O happens.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Create a file store rooted at `root`. The directory is created lazily
    /// on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory this store writes under.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a logical key to a path under the root.
    fn resolve(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() {
            return Err(StorageError::invalid_key(key, "empty key"));
        }
        let rel = Path::new(key);
        for component in rel.components() {
            match component {
                Component::Normal(_) => {}
                Component::ParentDir => {
                    return Err(StorageError::invalid_key(key, "'..' segment"));
                }
                Component::CurDir => {
                    return Err(StorageError::invalid_key(key, "'.' segment"));
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageError::invalid_key(key, "absolute path"));
                }
            }
        }
        Ok(self.root.join(rel))
    }

    async fn ensure_parent(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Recursively collect file names under `dir`, relative to `dir`.
    fn walk<'a>(
        dir: PathBuf,
        base: PathBuf,
        names: &'a mut Vec<String>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = StorageResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    Self::walk(path, base.clone(), names).await?;
                } else if let Ok(rel) = path.strip_prefix(&base) {
                    // Logical keys always use '/', regardless of platform.
                    let name = rel
                        .components()
                        .filter_map(|c| c.as_os_str().to_str())
                        .collect::<Vec<_>>()
                        .join("/");
                    names.push(name);
                }
            }
            Ok(())
        })
    }
}

#[async_trait::async_trait]
impl StorageBackend for FileStorage {
    #[instrument(skip(self, text), fields(root = %self.root.display()))]
    async fn append(&self, key: &str, text: &str) -> StorageResult<()> {
        let path = self.resolve(key)?;
        self.ensure_parent(&path).await?;
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .await?;
        file.write_all(text.as_bytes()).await?;
        file.flush().await?;
        debug!(key, bytes = text.len(), "Appended to file store");
        Ok(())
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn read(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.resolve(key)?;
        match fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, text), fields(root = %self.root.display()))]
    async fn write(&self, key: &str, text: &str) -> StorageResult<()> {
        let path = self.resolve(key)?;
        self.ensure_parent(&path).await?;
        fs::write(&path, text).await?;
        debug!(key, bytes = text.len(), "Wrote file store key");
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        // A trailing '/' on the prefix means "directory"; everything else is
        // a name prefix within its parent directory.
        let (dir_key, name_prefix) = match prefix.rsplit_once('/') {
            Some((dir, rest)) => (dir.to_string(), rest.to_string()),
            None => (String::new(), prefix.to_string()),
        };
        let dir = if dir_key.is_empty() {
            self.root.clone()
        } else {
            self.resolve(&dir_key)?
        };

        let mut names = Vec::new();
        Self::walk(dir.clone(), dir, &mut names).await?;
        let mut names: Vec<String> = names
            .into_iter()
            .filter_map(|n| n.strip_prefix(&name_prefix).map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.resolve(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    fn name(&self) -> &str {
        "file"
    }
}
