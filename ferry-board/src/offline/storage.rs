//! Named cache stores.
//!
//! Each deployed version owns two stores, one per resource class. A store
//! maps normalized keys to stored responses. [`MemoryStorage`] keeps stores
//! in process; [`DiskStorage`](super::DiskStorage) persists them.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use moka::future::Cache as MokaCache;
use tokio::sync::RwLock;

use super::disk::DiskStorage;
use super::error::StorageError;

/// A response as held in a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub stored_at: DateTime<Utc>,
}

impl CachedResponse {
    pub fn new(status: u16, content_type: Option<String>, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type,
            body,
            stored_at: Utc::now(),
        }
    }
}

/// A collection of named key → response stores.
///
/// Reading from a store that does not exist yields `None`; writing to one
/// creates it.
pub trait CacheStorage: Send + Sync {
    /// Names of all existing stores.
    fn store_names(&self) -> impl Future<Output = Result<Vec<String>, StorageError>> + Send;

    fn get(
        &self,
        store: &str,
        key: &str,
    ) -> impl Future<Output = Result<Option<CachedResponse>, StorageError>> + Send;

    fn put(
        &self,
        store: &str,
        key: &str,
        entry: CachedResponse,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Delete a whole store. Returns whether it existed.
    fn delete_store(&self, store: &str) -> impl Future<Output = Result<bool, StorageError>> + Send;
}

type Store = MokaCache<String, Arc<CachedResponse>>;

/// In-process stores backed by `moka`.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    stores: Arc<RwLock<HashMap<String, Store>>>,
    /// Per-store entry limit; least recently used entries are evicted.
    max_entries: Option<u64>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit each store to `max_entries` entries.
    pub fn with_max_entries(mut self, max_entries: u64) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    fn build_store(&self) -> Store {
        let mut builder = MokaCache::builder();
        if let Some(max) = self.max_entries {
            builder = builder.max_capacity(max);
        }
        builder.build()
    }

    async fn open(&self, store: &str) -> Store {
        if let Some(existing) = self.stores.read().await.get(store) {
            return existing.clone();
        }

        let mut stores = self.stores.write().await;
        stores
            .entry(store.to_string())
            .or_insert_with(|| self.build_store())
            .clone()
    }
}

impl CacheStorage for MemoryStorage {
    async fn store_names(&self) -> Result<Vec<String>, StorageError> {
        let mut names: Vec<String> = self.stores.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn get(&self, store: &str, key: &str) -> Result<Option<CachedResponse>, StorageError> {
        let cache = self.stores.read().await.get(store).cloned();
        match cache {
            Some(cache) => Ok(cache.get(key).await.map(|entry| (*entry).clone())),
            None => Ok(None),
        }
    }

    async fn put(&self, store: &str, key: &str, entry: CachedResponse) -> Result<(), StorageError> {
        let cache = self.open(store).await;
        cache.insert(key.to_string(), Arc::new(entry)).await;
        Ok(())
    }

    async fn delete_store(&self, store: &str) -> Result<bool, StorageError> {
        let removed = self.stores.write().await.remove(store);
        if let Some(cache) = &removed {
            cache.invalidate_all();
        }
        Ok(removed.is_some())
    }
}

/// Storage chosen at start-up.
#[derive(Clone)]
pub enum StorageBackend {
    Memory(MemoryStorage),
    Disk(DiskStorage),
}

impl CacheStorage for StorageBackend {
    async fn store_names(&self) -> Result<Vec<String>, StorageError> {
        match self {
            StorageBackend::Memory(s) => s.store_names().await,
            StorageBackend::Disk(s) => s.store_names().await,
        }
    }

    async fn get(&self, store: &str, key: &str) -> Result<Option<CachedResponse>, StorageError> {
        match self {
            StorageBackend::Memory(s) => s.get(store, key).await,
            StorageBackend::Disk(s) => s.get(store, key).await,
        }
    }

    async fn put(&self, store: &str, key: &str, entry: CachedResponse) -> Result<(), StorageError> {
        match self {
            StorageBackend::Memory(s) => s.put(store, key, entry).await,
            StorageBackend::Disk(s) => s.put(store, key, entry).await,
        }
    }

    async fn delete_store(&self, store: &str) -> Result<bool, StorageError> {
        match self {
            StorageBackend::Memory(s) => s.delete_store(store).await,
            StorageBackend::Disk(s) => s.delete_store(store).await,
        }
    }
}
