//! Application state for the web layer.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::{AppConfig, ConfigError};
use crate::controller::{BoardController, TimerGroup};
use crate::offline::{CacheCoordinator, CacheStorage, Fetcher, HttpFetcher, StorageBackend};

/// Re-reads configuration on reset.
pub type ConfigSource = Arc<dyn Fn() -> Result<AppConfig, ConfigError> + Send + Sync>;

/// Shared application state.
///
/// Generic over the coordinator's fetcher and storage; the server uses the
/// defaults.
pub struct AppState<F = HttpFetcher, S = StorageBackend> {
    /// Request mediator
    pub coordinator: Arc<CacheCoordinator<F, S>>,

    /// Board data and display
    pub controller: Arc<BoardController<F, S>>,

    /// Periodic refresh tasks
    pub timers: Arc<Mutex<TimerGroup>>,

    pub config_source: ConfigSource,
}

impl<F, S> Clone for AppState<F, S> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
            controller: Arc::clone(&self.controller),
            timers: Arc::clone(&self.timers),
            config_source: Arc::clone(&self.config_source),
        }
    }
}

impl<F: Fetcher, S: CacheStorage> AppState<F, S> {
    pub fn new(
        controller: Arc<BoardController<F, S>>,
        timers: TimerGroup,
        config_source: ConfigSource,
    ) -> Self {
        Self {
            coordinator: Arc::clone(controller.coordinator()),
            controller,
            timers: Arc::new(Mutex::new(timers)),
            config_source,
        }
    }
}
