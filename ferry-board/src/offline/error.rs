//! Offline layer error types.

/// Errors from fetching a resource over the network.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Network is unreachable
    #[error("network unavailable: {0}")]
    Unavailable(String),
}

/// Errors from a cache store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Filesystem operation failed
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored entry could not be decoded
    #[error("corrupt cache entry: {message}")]
    Corrupt { message: String },

    /// Store name is not usable
    #[error("invalid store name: {0}")]
    InvalidName(String),

    /// Store refused the write
    #[error("store quota exceeded: {0}")]
    Quota(String),
}

/// Errors surfaced by the cache coordinator.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// Manifest URL could not be parsed
    #[error("invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// Manifest fetch failed
    #[error("manifest fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Manifest endpoint returned an error status
    #[error("manifest returned status {0}")]
    ManifestStatus(u16),

    /// Manifest body was not a version document
    #[error("invalid manifest: {0}")]
    Manifest(String),

    /// Store enumeration or deletion failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}
