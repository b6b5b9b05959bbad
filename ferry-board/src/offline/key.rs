//! Cache keys and resource classes.

use reqwest::Url;
use serde::Serialize;

/// Error returned for a request URL the coordinator will not intercept.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot intercept {url}: {reason}")]
pub struct Unkeyable {
    url: String,
    reason: String,
}

/// Caching policy family of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceClass {
    /// Season configs and timetables: network first.
    MutableData,
    /// Markup, styles, scripts, icons: cache first.
    StaticAsset,
}

impl ResourceClass {
    /// JSON documents are data; everything else is a static asset.
    pub fn for_path(path: &str) -> Self {
        if path.to_ascii_lowercase().ends_with(".json") {
            ResourceClass::MutableData
        } else {
            ResourceClass::StaticAsset
        }
    }
}

/// Store key for a request URL: its path, without query string or fragment.
///
/// # Examples
///
/// ```
/// use ferry_board::offline::normalize_key;
///
/// let a = normalize_key("https://ferry.example/data/city/config.json?v=1").unwrap();
/// let b = normalize_key("https://ferry.example/data/city/config.json?v=2").unwrap();
/// assert_eq!(a, "/data/city/config.json");
/// assert_eq!(a, b);
///
/// assert!(normalize_key("not a url").is_err());
/// ```
pub fn normalize_key(url: &str) -> Result<String, Unkeyable> {
    let parsed = Url::parse(url).map_err(|e| Unkeyable {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Unkeyable {
            url: url.to_string(),
            reason: format!("unsupported scheme {}", parsed.scheme()),
        });
    }

    Ok(parsed.path().to_string())
}
