//! The cache coordinator.
//!
//! Every outbound resource request goes through [`CacheCoordinator::handle`].
//! JSON documents are fetched network-first and everything else cache-first,
//! each class in its own store named after the running version. Activating a
//! version deletes the stores of every other version.

use chrono::Utc;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};

use super::error::CoordinatorError;
use super::fetch::{Fetcher, Request, Response};
use super::key::{ResourceClass, normalize_key};
use super::messages::{Acknowledgement, ControlMessage, CoordinatorEvent};
use super::storage::{CacheStorage, CachedResponse};

/// Version compiled into this build.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Capacity of the event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Core static paths cached on install.
const DEFAULT_PRECACHE: &[&str] = &["/", "/index.html", "/style.css", "/app.js"];

/// Root documents served to HTML requests when offline.
const HTML_FALLBACKS: &[&str] = &["/", "/index.html"];

/// Store names owned by one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheNames {
    pub data: String,
    pub assets: String,
}

impl CacheNames {
    pub fn for_version(version: &str) -> Self {
        Self {
            data: format!("ferry-data-{version}"),
            assets: format!("ferry-static-{version}"),
        }
    }

    pub fn for_class(&self, class: ResourceClass) -> &str {
        match class {
            ResourceClass::MutableData => &self.data,
            ResourceClass::StaticAsset => &self.assets,
        }
    }

    pub fn contains(&self, store: &str) -> bool {
        store == self.data || store == self.assets
    }
}

/// Configuration for the cache coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Version identifier of this build.
    pub version: String,
    /// Base URL that relative paths resolve against.
    pub origin: String,
    /// Path of the deployment manifest.
    pub manifest_path: String,
    /// Paths cached on install.
    pub precache: Vec<String>,
}

impl CoordinatorConfig {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            version: APP_VERSION.to_string(),
            origin: origin.into(),
            manifest_path: "/version.json".to_string(),
            precache: DEFAULT_PRECACHE.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_manifest_path(mut self, path: impl Into<String>) -> Self {
        self.manifest_path = path.into();
        self
    }

    pub fn with_precache(mut self, paths: Vec<String>) -> Self {
        self.precache = paths;
        self
    }

    /// Absolute URL for `path` under the origin.
    pub fn url_for(&self, path: &str) -> Result<Url, CoordinatorError> {
        let invalid = |message: String| CoordinatorError::InvalidUrl {
            url: format!("{}{}", self.origin, path),
            message,
        };
        Url::parse(&self.origin)
            .and_then(|base| base.join(path))
            .map_err(|e| invalid(e.to_string()))
    }
}

/// Where a coordinator version is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Installing,
    /// Installed, waiting for the signal to take over.
    Waiting,
    Active,
}

/// Outcome of comparing the running version with the deployed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionCheck {
    pub current: String,
    pub remote: String,
    pub update_available: bool,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    version: String,
}

/// Mediates resource requests between clients, the network and the stores.
pub struct CacheCoordinator<F, S> {
    fetcher: F,
    storage: S,
    config: CoordinatorConfig,
    names: CacheNames,
    lifecycle: RwLock<Lifecycle>,
    events: broadcast::Sender<CoordinatorEvent>,
}

impl<F: Fetcher, S: CacheStorage> CacheCoordinator<F, S> {
    pub fn new(fetcher: F, storage: S, config: CoordinatorConfig) -> Self {
        let names = CacheNames::for_version(&config.version);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            fetcher,
            storage,
            config,
            names,
            lifecycle: RwLock::new(Lifecycle::Installing),
            events,
        }
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn names(&self) -> &CacheNames {
        &self.names
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Receive events broadcast from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.events.subscribe()
    }

    pub async fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.read().await
    }

    /// Pre-cache the configured static paths and move to `Waiting`.
    ///
    /// Returns how many paths were cached. Individual failures are logged.
    pub async fn install(&self) -> usize {
        let mut cached = 0;
        for path in &self.config.precache {
            let url = match self.config.url_for(path) {
                Ok(url) => url,
                Err(e) => {
                    warn!(path = %path, error = %e, "skipping pre-cache entry");
                    continue;
                }
            };
            let Ok(key) = normalize_key(url.as_str()) else {
                continue;
            };

            match self.fetcher.fetch(&Request::get(url.as_str())).await {
                Ok(response) if response.is_success() => {
                    self.store(&self.names.assets, &key, &response).await;
                    cached += 1;
                }
                Ok(response) => {
                    warn!(path = %path, status = response.status, "pre-cache fetch rejected");
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "pre-cache fetch failed");
                }
            }
        }

        let mut lifecycle = self.lifecycle.write().await;
        if *lifecycle == Lifecycle::Installing {
            *lifecycle = Lifecycle::Waiting;
        }
        info!(
            version = %self.config.version,
            cached,
            total = self.config.precache.len(),
            "coordinator installed"
        );
        cached
    }

    /// Take over request handling.
    ///
    /// Deletes every store not owned by this version, announces the takeover
    /// and runs one version check. Returns the names of deleted stores.
    pub async fn activate(&self) -> Vec<String> {
        let deleted = match self.evict_other_generations().await {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!(error = %e, "failed to evict old stores");
                Vec::new()
            }
        };

        *self.lifecycle.write().await = Lifecycle::Active;
        info!(version = %self.config.version, evicted = deleted.len(), "coordinator active");

        let _ = self.events.send(CoordinatorEvent::ControllerChanged {
            version: self.config.version.clone(),
        });

        if let Err(e) = self.check_version().await {
            warn!(error = %e, "version check failed");
        }
        deleted
    }

    async fn evict_other_generations(&self) -> Result<Vec<String>, CoordinatorError> {
        let mut deleted = Vec::new();
        for store in self.storage.store_names().await? {
            if self.names.contains(&store) {
                continue;
            }
            if self.storage.delete_store(&store).await? {
                info!(store = %store, "deleted store from previous version");
                deleted.push(store);
            }
        }
        Ok(deleted)
    }

    /// Answer a resource request.
    ///
    /// Never fails: when neither network nor store can answer, a synthetic
    /// error response is returned.
    pub async fn handle(&self, request: &Request) -> Response {
        let key = match normalize_key(&request.url) {
            Ok(key) => key,
            Err(e) => {
                debug!(error = %e, "not intercepting");
                return self.passthrough(request).await;
            }
        };

        if self.lifecycle().await != Lifecycle::Active {
            return self.passthrough(request).await;
        }

        match ResourceClass::for_path(&key) {
            ResourceClass::MutableData => self.network_first(request, &key).await,
            ResourceClass::StaticAsset => self.cache_first(request, &key).await,
        }
    }

    async fn passthrough(&self, request: &Request) -> Response {
        match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %request.url, error = %e, "upstream fetch failed");
                Response::synthetic(502, "text/plain; charset=utf-8", "upstream unavailable")
            }
        }
    }

    async fn network_first(&self, request: &Request, key: &str) -> Response {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.store(&self.names.data, key, &response).await;
                }
                response
            }
            Err(e) => {
                warn!(key = %key, error = %e, "network failed, trying cache");
                match self.lookup(&self.names.data, key).await {
                    Some(entry) => Response::from_cache(entry),
                    None => offline_data_response(key),
                }
            }
        }
    }

    async fn cache_first(&self, request: &Request, key: &str) -> Response {
        if let Some(entry) = self.lookup(&self.names.assets, key).await {
            return Response::from_cache(entry);
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.store(&self.names.assets, key, &response).await;
                }
                response
            }
            Err(e) => {
                warn!(key = %key, error = %e, "asset unavailable");
                if request.accepts_html() {
                    for root in HTML_FALLBACKS {
                        if let Some(entry) = self.lookup(&self.names.assets, root).await {
                            debug!(key = %key, fallback = %root, "serving cached root document");
                            return Response::from_cache(entry);
                        }
                    }
                }
                Response::synthetic(503, "text/plain; charset=utf-8", "offline")
            }
        }
    }

    async fn lookup(&self, store: &str, key: &str) -> Option<CachedResponse> {
        match self.storage.get(store, key).await {
            Ok(Some(entry)) => {
                debug!(store = %store, key = %key, "cache hit");
                Some(entry)
            }
            Ok(None) => {
                debug!(store = %store, key = %key, "cache miss");
                None
            }
            Err(e) => {
                warn!(store = %store, key = %key, error = %e, "cache read failed");
                None
            }
        }
    }

    async fn store(&self, store: &str, key: &str, response: &Response) {
        let entry = CachedResponse::new(
            response.status,
            response.content_type.clone(),
            response.body.clone(),
        );
        if let Err(e) = self.storage.put(store, key, entry).await {
            warn!(store = %store, key = %key, error = %e, "cache write failed");
        }
    }

    /// Compare the deployed manifest's version with ours.
    ///
    /// Broadcasts [`CoordinatorEvent::UpdateAvailable`] on mismatch. Never
    /// evicts anything.
    pub async fn check_version(&self) -> Result<VersionCheck, CoordinatorError> {
        let mut url = self.config.url_for(&self.config.manifest_path)?;
        url.query_pairs_mut()
            .append_pair("t", &Utc::now().timestamp_millis().to_string());

        let request = Request::get(url.as_str()).with_accept("application/json");
        let response = self.fetcher.fetch(&request).await?;
        if !response.is_success() {
            return Err(CoordinatorError::ManifestStatus(response.status));
        }

        let manifest: Manifest = serde_json::from_slice(&response.body)
            .map_err(|e| CoordinatorError::Manifest(e.to_string()))?;

        let check = VersionCheck {
            current: self.config.version.clone(),
            update_available: manifest.version != self.config.version,
            remote: manifest.version,
        };

        if check.update_available {
            info!(current = %check.current, new = %check.remote, "update available");
            let _ = self.events.send(CoordinatorEvent::UpdateAvailable {
                current: check.current.clone(),
                new: check.remote.clone(),
            });
        } else {
            debug!(version = %check.current, "version up to date");
        }
        Ok(check)
    }

    /// Delete every store. Returns how many were deleted.
    pub async fn clear_all(&self) -> Result<usize, CoordinatorError> {
        let mut deleted = 0;
        for store in self.storage.store_names().await? {
            if self.storage.delete_store(&store).await? {
                deleted += 1;
            }
        }
        info!(deleted, "cleared all stores");
        Ok(deleted)
    }

    /// Apply a control message, returning a reply if the message has one.
    pub async fn handle_message(&self, message: ControlMessage) -> Option<Acknowledgement> {
        match message {
            ControlMessage::SkipWaiting => {
                match self.lifecycle().await {
                    Lifecycle::Waiting => {
                        self.activate().await;
                    }
                    state => debug!(?state, "skip-waiting ignored"),
                }
                None
            }
            ControlMessage::CheckVersion => {
                if let Err(e) = self.check_version().await {
                    warn!(error = %e, "version check failed");
                }
                None
            }
            ControlMessage::ClearCaches => {
                let success = match self.clear_all().await {
                    Ok(_) => true,
                    Err(e) => {
                        warn!(error = %e, "failed to clear stores");
                        false
                    }
                };
                Some(Acknowledgement::CacheCleared { success })
            }
        }
    }
}

fn offline_data_response(key: &str) -> Response {
    let body = serde_json::json!({
        "error": "offline",
        "message": format!("{key} is not available offline"),
    });
    Response::synthetic(503, "application/json", body.to_string())
}
