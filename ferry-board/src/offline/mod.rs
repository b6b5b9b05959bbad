//! Offline-capable resource layer.
//!
//! [`CacheCoordinator`] sits between clients and the upstream site. It is
//! generic over a [`Fetcher`] for the network and a [`CacheStorage`] for the
//! named stores so both can be swapped out.

mod coordinator;
mod disk;
mod error;
mod fetch;
mod key;
mod messages;
mod mock;
mod storage;

pub use coordinator::{
    APP_VERSION, CacheCoordinator, CacheNames, CoordinatorConfig, Lifecycle, VersionCheck,
};
pub use disk::DiskStorage;
pub use error::{CoordinatorError, FetchError, StorageError};
pub use fetch::{Fetcher, HttpFetcher, HttpFetcherConfig, Request, Response, ResponseSource};
pub use key::{ResourceClass, Unkeyable, normalize_key};
pub use messages::{Acknowledgement, ControlMessage, CoordinatorEvent};
pub use mock::MockFetcher;
pub use storage::{CacheStorage, CachedResponse, MemoryStorage, StorageBackend};
