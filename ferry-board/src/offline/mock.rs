//! In-memory fetcher for running without an upstream.
//!
//! Serves canned responses keyed by URL path and can be switched offline to
//! simulate network loss.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::error::FetchError;
use super::fetch::{Fetcher, Request, Response, ResponseSource};
use super::key::normalize_key;

/// Fetcher serving responses from memory.
#[derive(Default)]
pub struct MockFetcher {
    routes: Mutex<HashMap<String, (u16, String, Vec<u8>)>>,
    offline: AtomicBool,
    requests: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 for `path`.
    pub fn route(&self, path: &str, content_type: &str, body: impl Into<Vec<u8>>) {
        self.route_status(path, 200, content_type, body);
    }

    pub fn route_status(
        &self,
        path: &str,
        status: u16,
        content_type: &str,
        body: impl Into<Vec<u8>>,
    ) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(
                path.to_string(),
                (status, content_type.to_string(), body.into()),
            );
        }
    }

    /// Serve a JSON document for `path`.
    pub fn route_json(&self, path: &str, value: &serde_json::Value) {
        self.route(path, "application/json", value.to_string());
    }

    /// Make every fetch fail as if the network were down.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.url.clone());
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Unavailable(request.url.clone()));
        }

        let path =
            normalize_key(&request.url).map_err(|e| FetchError::Unavailable(e.to_string()))?;
        let route = self
            .routes
            .lock()
            .ok()
            .and_then(|routes| routes.get(&path).cloned());

        Ok(match route {
            Some((status, content_type, body)) => Response {
                status,
                content_type: Some(content_type),
                body,
                source: ResponseSource::Network,
            },
            None => Response {
                status: 404,
                content_type: Some("text/plain".to_string()),
                body: b"not found".to_vec(),
                source: ResponseSource::Network,
            },
        })
    }
}
