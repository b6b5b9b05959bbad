//! Disk-backed cache stores.
//!
//! One directory per store under a root directory, one JSON file per entry.
//! File names are the URL-safe base64 of the key so any path is a valid name.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::StorageError;
use super::storage::{CacheStorage, CachedResponse};

const ENTRY_EXTENSION: &str = "json";

/// Entry as written to disk.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    status: u16,
    content_type: Option<String>,
    /// Base64 body.
    body: String,
    stored_at: DateTime<Utc>,
}

/// Stores persisted under a root directory.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
    tmp_counter: Arc<AtomicU64>,
}

impl DiskStorage {
    /// Open storage rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tmp_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn store_dir(&self, store: &str) -> Result<PathBuf, StorageError> {
        if store.is_empty()
            || store.starts_with('.')
            || store.contains(['/', '\\'])
            || store.contains("..")
        {
            return Err(StorageError::InvalidName(store.to_string()));
        }
        Ok(self.root.join(store))
    }

    fn entry_path(&self, store: &str, key: &str) -> Result<PathBuf, StorageError> {
        let file = format!("{}.{}", URL_SAFE_NO_PAD.encode(key), ENTRY_EXTENSION);
        Ok(self.store_dir(store)?.join(file))
    }

    /// Write via a temporary file and rename so readers never see a partial entry.
    async fn write_atomic(&self, dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(dir).await?;

        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let tmp = dir.join(format!(".tmp-{}-{}", std::process::id(), n));
        tokio::fs::write(&tmp, bytes).await?;

        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StorageError::Io(e));
        }
        Ok(())
    }
}

impl CacheStorage for DiskStorage {
    async fn store_names(&self) -> Result<Vec<String>, StorageError> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && !name.starts_with('.')
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn get(&self, store: &str, key: &str) -> Result<Option<CachedResponse>, StorageError> {
        let path = self.entry_path(store, key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stored: StoredEntry =
            serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupt {
                message: format!("{}: {}", path.display(), e),
            })?;
        if stored.key != key {
            return Err(StorageError::Corrupt {
                message: format!("{}: key mismatch", path.display()),
            });
        }
        let body = STANDARD
            .decode(stored.body.as_bytes())
            .map_err(|e| StorageError::Corrupt {
                message: format!("{}: {}", path.display(), e),
            })?;

        Ok(Some(CachedResponse {
            status: stored.status,
            content_type: stored.content_type,
            body,
            stored_at: stored.stored_at,
        }))
    }

    async fn put(&self, store: &str, key: &str, entry: CachedResponse) -> Result<(), StorageError> {
        let dir = self.store_dir(store)?;
        let path = self.entry_path(store, key)?;

        let stored = StoredEntry {
            key: key.to_string(),
            status: entry.status,
            content_type: entry.content_type,
            body: STANDARD.encode(&entry.body),
            stored_at: entry.stored_at,
        };
        let json = serde_json::to_vec(&stored).map_err(|e| StorageError::Corrupt {
            message: format!("failed to serialize entry: {}", e),
        })?;

        self.write_atomic(&dir, &path, &json).await
    }

    async fn delete_store(&self, store: &str) -> Result<bool, StorageError> {
        let dir = self.store_dir(store)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
