//! Application configuration from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::controller::{DEFAULT_MAX_DEPARTURES, TimerIntervals};
use crate::web::MAX_DEPARTURES_LIMIT;
use crate::domain::LineId;

/// Errors from reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Variable is set but its value is unusable
    #[error("invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

/// Configuration for the board server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Base URL of the upstream static site.
    pub upstream_url: String,
    /// Listen address.
    pub bind: SocketAddr,
    /// Root for disk-backed stores; in-memory stores when `None`.
    pub cache_dir: Option<PathBuf>,
    /// Lines to load.
    pub lines: Vec<LineId>,
    pub intervals: TimerIntervals,
    /// Transport timeout.
    pub http_timeout: Duration,
    /// Departures per stop on the periodically computed display.
    pub max_departures: usize,
    /// Path of the deployment manifest on the upstream site.
    pub manifest_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            upstream_url: "http://127.0.0.1:8080".to_string(),
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            cache_dir: None,
            lines: ["shuttle", "city"]
                .iter()
                .filter_map(|l| LineId::parse(l).ok())
                .collect(),
            intervals: TimerIntervals::default(),
            http_timeout: Duration::from_secs(30),
            max_departures: DEFAULT_MAX_DEPARTURES,
            manifest_path: "/version.json".to_string(),
        }
    }
}

impl AppConfig {
    /// Read from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read from an arbitrary variable lookup; unset variables keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("FERRY_UPSTREAM_URL") {
            reqwest::Url::parse(&url).map_err(|e| ConfigError::Invalid {
                name: "FERRY_UPSTREAM_URL",
                message: e.to_string(),
            })?;
            config.upstream_url = url.trim_end_matches('/').to_string();
        }

        if let Some(bind) = get("FERRY_BIND") {
            config.bind = bind.parse().map_err(|e: std::net::AddrParseError| {
                ConfigError::Invalid {
                    name: "FERRY_BIND",
                    message: e.to_string(),
                }
            })?;
        }

        config.cache_dir = get("FERRY_CACHE_DIR").map(PathBuf::from);

        if let Some(lines) = get("FERRY_LINES") {
            config.lines = parse_lines(&lines).map_err(|message| ConfigError::Invalid {
                name: "FERRY_LINES",
                message,
            })?;
        }

        let secs = |name: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match get(name) {
                None => Ok(default),
                Some(v) => match v.trim().parse::<u64>() {
                    Ok(0) => Err(ConfigError::Invalid {
                        name,
                        message: "must be at least 1 second".to_string(),
                    }),
                    Ok(n) => Ok(Duration::from_secs(n)),
                    Err(e) => Err(ConfigError::Invalid {
                        name,
                        message: e.to_string(),
                    }),
                },
            }
        };

        config.intervals = TimerIntervals {
            display: secs("FERRY_DISPLAY_REFRESH_SECS", config.intervals.display)?,
            data: secs("FERRY_DATA_REFRESH_SECS", config.intervals.data)?,
            rollover: secs("FERRY_ROLLOVER_CHECK_SECS", config.intervals.rollover)?,
            version: secs("FERRY_VERSION_CHECK_SECS", config.intervals.version)?,
        };
        config.http_timeout = secs("FERRY_HTTP_TIMEOUT_SECS", config.http_timeout)?;

        if let Some(n) = get("FERRY_MAX_DEPARTURES") {
            config.max_departures = match n.trim().parse::<usize>() {
                Ok(n) if (1..=MAX_DEPARTURES_LIMIT).contains(&n) => n,
                Ok(_) => {
                    return Err(ConfigError::Invalid {
                        name: "FERRY_MAX_DEPARTURES",
                        message: format!("must be between 1 and {MAX_DEPARTURES_LIMIT}"),
                    });
                }
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        name: "FERRY_MAX_DEPARTURES",
                        message: e.to_string(),
                    });
                }
            };
        }

        if let Some(path) = get("FERRY_MANIFEST_PATH") {
            let path = path.trim();
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid {
                    name: "FERRY_MANIFEST_PATH",
                    message: "must start with '/'".to_string(),
                });
            }
            config.manifest_path = path.to_string();
        }

        Ok(config)
    }

    pub fn with_upstream_url(mut self, url: impl Into<String>) -> Self {
        self.upstream_url = url.into();
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_lines(mut self, lines: Vec<LineId>) -> Self {
        self.lines = lines;
        self
    }
}

/// Parse a comma-separated line list. Empty items are ignored; duplicates
/// are dropped keeping the first occurrence.
pub fn parse_lines(s: &str) -> Result<Vec<LineId>, String> {
    let mut lines: Vec<LineId> = Vec::new();
    for item in s.split(',').map(str::trim).filter(|i| !i.is_empty()) {
        let line = LineId::parse_normalized(item).map_err(|e| format!("{item}: {e}"))?;
        if !lines.contains(&line) {
            lines.push(line);
        }
    }
    if lines.is_empty() {
        return Err("no lines given".to_string());
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.bind.to_string(), "127.0.0.1:3000");
        assert_eq!(config.lines.len(), 2);
        assert!(config.cache_dir.is_none());
    }

    #[test]
    fn reads_every_variable() {
        let config = AppConfig::from_lookup(lookup(&[
            ("FERRY_UPSTREAM_URL", "https://ferry.example/"),
            ("FERRY_BIND", "0.0.0.0:8000"),
            ("FERRY_CACHE_DIR", "/var/cache/ferry"),
            ("FERRY_LINES", "city"),
            ("FERRY_DISPLAY_REFRESH_SECS", "10"),
            ("FERRY_DATA_REFRESH_SECS", "600"),
            ("FERRY_ROLLOVER_CHECK_SECS", "30"),
            ("FERRY_VERSION_CHECK_SECS", "120"),
            ("FERRY_HTTP_TIMEOUT_SECS", "5"),
            ("FERRY_MAX_DEPARTURES", "8"),
            ("FERRY_MANIFEST_PATH", "/build/version.json"),
        ]))
        .unwrap();

        assert_eq!(config.upstream_url, "https://ferry.example");
        assert_eq!(config.bind.port(), 8000);
        assert_eq!(config.cache_dir, Some(PathBuf::from("/var/cache/ferry")));
        assert_eq!(config.lines, vec![LineId::parse("city").unwrap()]);
        assert_eq!(config.intervals.display, Duration::from_secs(10));
        assert_eq!(config.intervals.data, Duration::from_secs(600));
        assert_eq!(config.intervals.rollover, Duration::from_secs(30));
        assert_eq!(config.intervals.version, Duration::from_secs(120));
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert_eq!(config.max_departures, 8);
        assert_eq!(config.manifest_path, "/build/version.json");
    }

    #[test]
    fn rejects_bad_values() {
        let err = AppConfig::from_lookup(lookup(&[("FERRY_BIND", "nowhere")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "FERRY_BIND", .. }));

        let err =
            AppConfig::from_lookup(lookup(&[("FERRY_DATA_REFRESH_SECS", "0")])).unwrap_err();
        assert!(err.to_string().contains("FERRY_DATA_REFRESH_SECS"));

        assert!(AppConfig::from_lookup(lookup(&[("FERRY_UPSTREAM_URL", "not a url")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("FERRY_LINES", "City Line")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("FERRY_MAX_DEPARTURES", "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("FERRY_MAX_DEPARTURES", "51")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("FERRY_MANIFEST_PATH", "version.json")])).is_err());
    }

    #[test]
    fn blank_values_are_unset() {
        let config = AppConfig::from_lookup(lookup(&[("FERRY_CACHE_DIR", "  ")])).unwrap();
        assert!(config.cache_dir.is_none());
    }

    #[test]
    fn line_list_parsing() {
        let lines = parse_lines(" Shuttle, city,,shuttle ").unwrap();
        let names: Vec<_> = lines.iter().map(LineId::as_str).collect();
        assert_eq!(names, vec!["shuttle", "city"]);
        assert!(parse_lines(" , ").is_err());
    }
}
