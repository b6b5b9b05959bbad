//! Loading season configs and timetables through the coordinator.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, warn};

use crate::domain::{DayType, LineId};
use crate::offline::{CacheCoordinator, CacheStorage, Fetcher, Request};
use crate::schedule::{LoadedDocument, SeasonConfig, SeasonDefinition, overlapping_periods, resolve};

use super::state::LoadedDay;

/// Errors from loading a line's documents.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// Request URL could not be built
    #[error("invalid URL for {path}: {message}")]
    InvalidUrl { path: String, message: String },

    /// Document request returned an error status
    #[error("{path} returned status {status}")]
    Status { path: String, status: u16 },

    /// Document was not valid
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    /// No season applies to the line at all
    #[error("no season defined for line {0}")]
    Unresolved(LineId),
}

/// Fetches a line's documents via the coordinator.
pub struct DataLoader<F, S> {
    coordinator: Arc<CacheCoordinator<F, S>>,
}

impl<F, S> Clone for DataLoader<F, S> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
        }
    }
}

/// Path of a line's season config.
pub fn config_path(line: &LineId) -> String {
    format!("/data/{line}/config.json")
}

/// Path of one of a line's timetable files.
pub fn timetable_path(line: &LineId, file: &str) -> String {
    format!("/data/{line}/{}", file.trim_start_matches('/'))
}

impl<F: Fetcher, S: CacheStorage> DataLoader<F, S> {
    pub fn new(coordinator: Arc<CacheCoordinator<F, S>>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<CacheCoordinator<F, S>> {
        &self.coordinator
    }

    /// Fetch a JSON document. A timestamp parameter defeats HTTP caches; the
    /// coordinator's store key ignores it.
    async fn fetch_json(&self, path: &str) -> Result<Vec<u8>, LoadError> {
        let mut url =
            self.coordinator
                .config()
                .url_for(path)
                .map_err(|e| LoadError::InvalidUrl {
                    path: path.to_string(),
                    message: e.to_string(),
                })?;
        url.query_pairs_mut()
            .append_pair("t", &Utc::now().timestamp_millis().to_string());

        let request = Request::get(url.as_str()).with_accept("application/json");
        let response = self.coordinator.handle(&request).await;
        debug!(path = %path, status = response.status, source = response.source.as_str(), "loaded document");

        if !response.is_success() {
            return Err(LoadError::Status {
                path: path.to_string(),
                status: response.status,
            });
        }
        Ok(response.body)
    }

    /// Load a line's season list. Overlapping periods are logged, not rejected.
    pub async fn load_seasons(&self, line: &LineId) -> Result<Vec<SeasonDefinition>, LoadError> {
        let path = config_path(line);
        let body = self.fetch_json(&path).await?;
        let config: SeasonConfig =
            serde_json::from_slice(&body).map_err(|e| LoadError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?;

        for (first, second) in overlapping_periods(&config.season_mapping) {
            warn!(
                line = %line,
                first = %first,
                second = %second,
                "season periods overlap, first listed wins"
            );
        }
        Ok(config.season_mapping)
    }

    /// Resolve and load the timetable a line runs on `date`.
    pub async fn load_day(
        &self,
        line: &LineId,
        seasons: &[SeasonDefinition],
        date: NaiveDate,
    ) -> Result<LoadedDay, LoadError> {
        let resolution = resolve(seasons, date, DayType::from_date(date));
        let Some(file) = resolution.file_name.as_deref() else {
            return Err(LoadError::Unresolved(line.clone()));
        };

        let path = timetable_path(line, file);
        let body = self.fetch_json(&path).await?;
        let document =
            LoadedDocument::parse(&body, resolution.day_type).map_err(|e| LoadError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?;

        Ok(LoadedDay {
            date,
            resolution,
            document,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::{CoordinatorConfig, MemoryStorage, MockFetcher};

    fn line(s: &str) -> LineId {
        LineId::parse(s).unwrap()
    }

    async fn loader() -> (Arc<MockFetcher>, DataLoader<Arc<MockFetcher>, MemoryStorage>) {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.route_json("/version.json", &serde_json::json!({"version": "t"}));
        let config = CoordinatorConfig::new("http://ferry.test")
            .with_version("t")
            .with_precache(Vec::new());
        let coordinator = Arc::new(CacheCoordinator::new(
            fetcher.clone(),
            MemoryStorage::new(),
            config,
        ));
        coordinator.install().await;
        coordinator.activate().await;
        (fetcher, DataLoader::new(coordinator))
    }

    #[test]
    fn paths() {
        assert_eq!(config_path(&line("city")), "/data/city/config.json");
        assert_eq!(
            timetable_path(&line("city"), "summer.json"),
            "/data/city/summer.json"
        );
        assert_eq!(
            timetable_path(&line("city"), "/summer.json"),
            "/data/city/summer.json"
        );
    }

    #[tokio::test]
    async fn loads_seasons_and_timetable() {
        let (fetcher, loader) = loader().await;
        fetcher.route_json(
            "/data/shuttle/config.json",
            &serde_json::json!({"season_mapping": [
                {"name": "Summer", "period": {"start": "2024-06-01", "end": "2024-08-31"},
                 "files": {"weekday": "summer.json"}}
            ]}),
        );
        fetcher.route_json(
            "/data/shuttle/summer.json",
            &serde_json::json!({"metadata": {}, "departures": {"Pier": ["07:00"]}}),
        );

        let seasons = loader.load_seasons(&line("shuttle")).await.unwrap();
        assert_eq!(seasons.len(), 1);

        let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let day = loader.load_day(&line("shuttle"), &seasons, date).await.unwrap();
        assert_eq!(day.resolution.file_name.as_deref(), Some("summer.json"));
        assert!(matches!(day.document, LoadedDocument::Direct(_)));

        let requested = fetcher.requests();
        assert!(requested.iter().any(|u| u.contains("/data/shuttle/summer.json?t=")));
    }

    #[tokio::test]
    async fn holiday_override_reads_weekend_disembark_entries() {
        let (fetcher, loader) = loader().await;
        fetcher.route_json(
            "/data/shuttle/config.json",
            &serde_json::json!({"season_mapping": [
                {"name": "Summer", "period": {"start": "2024-06-01", "end": "2024-08-31"},
                 "files": {"weekday": "wd.json", "saturday": "we.json", "sunday": "we.json"},
                 "holiday_rules": {"weekend_schedule": ["2024-06-21"]}}
            ]}),
        );
        fetcher.route_json(
            "/data/shuttle/we.json",
            &serde_json::json!({
                "metadata": {},
                "departures": {"Pier": ["22:00"]},
                "disembark_only": {"saturday": {"Pier": ["22:00"]}, "sunday": {"Pier": ["22:00"]}}
            }),
        );

        let seasons = loader.load_seasons(&line("shuttle")).await.unwrap();
        // Midsummer Friday
        let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let day = loader.load_day(&line("shuttle"), &seasons, date).await.unwrap();

        assert_eq!(day.resolution.file_name.as_deref(), Some("we.json"));
        assert!(day.resolution.holiday_override);
        let LoadedDocument::Direct(timetable) = &day.document else {
            panic!("expected a direct timetable");
        };
        assert!(timetable.disembark_only.contains("Pier", "22:00"));
    }

    #[tokio::test]
    async fn missing_config_is_status_error() {
        let (_, loader) = loader().await;
        let err = loader.load_seasons(&line("ghost")).await.unwrap_err();
        assert_eq!(
            err,
            LoadError::Status {
                path: "/data/ghost/config.json".into(),
                status: 404
            }
        );
    }

    #[tokio::test]
    async fn malformed_config_is_parse_error() {
        let (fetcher, loader) = loader().await;
        fetcher.route("/data/x/config.json", "application/json", "{\"seasons\": []}");
        assert!(matches!(
            loader.load_seasons(&line("x")).await,
            Err(LoadError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn empty_season_list_is_unresolved() {
        let (_, loader) = loader().await;
        let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        assert_eq!(
            loader.load_day(&line("x"), &[], date).await.unwrap_err(),
            LoadError::Unresolved(line("x"))
        );
    }

    #[tokio::test]
    async fn offline_load_uses_cached_copy() {
        let (fetcher, loader) = loader().await;
        fetcher.route_json(
            "/data/x/config.json",
            &serde_json::json!({"season_mapping": []}),
        );
        loader.load_seasons(&line("x")).await.unwrap();

        fetcher.set_offline(true);
        assert!(loader.load_seasons(&line("x")).await.unwrap().is_empty());
    }
}
