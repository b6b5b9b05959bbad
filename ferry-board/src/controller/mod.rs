//! Board controller.
//!
//! Owns the [`BoardState`]: which lines are loaded, their resolved
//! timetables for today and tomorrow, and the last computed display. All
//! loading goes through the cache coordinator, so a line keeps working
//! offline once its documents have been seen.

mod loader;
mod state;
mod timers;

use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime};
use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::domain::LineId;
use crate::offline::{CacheCoordinator, CacheStorage, Fetcher};
use crate::schedule::{Resolution, resolve_for_date};

pub use loader::{DataLoader, LoadError, config_path, timetable_path};
pub use state::{BoardState, LineBoard, LineState, LineStatus, LoadedDay};
pub use timers::{TimerGroup, TimerIntervals};

/// Departures shown per stop unless a request asks otherwise.
pub const DEFAULT_MAX_DEPARTURES: usize = 5;

/// Loads lines and computes their boards.
pub struct BoardController<F, S> {
    loader: DataLoader<F, S>,
    lines: RwLock<Vec<LineId>>,
    max_departures: usize,
    state: RwLock<BoardState>,
}

impl<F: Fetcher, S: CacheStorage> BoardController<F, S> {
    pub fn new(coordinator: Arc<CacheCoordinator<F, S>>, lines: Vec<LineId>) -> Self {
        let state = BoardState::new(Local::now().date_naive(), &lines);
        Self {
            loader: DataLoader::new(coordinator),
            lines: RwLock::new(lines),
            max_departures: DEFAULT_MAX_DEPARTURES,
            state: RwLock::new(state),
        }
    }

    /// Set the departure count used for the periodic display.
    pub fn with_max_departures(mut self, max: usize) -> Self {
        self.max_departures = max;
        self
    }

    pub fn coordinator(&self) -> &Arc<CacheCoordinator<F, S>> {
        self.loader.coordinator()
    }

    pub async fn lines(&self) -> Vec<LineId> {
        self.lines.read().await.clone()
    }

    /// Date the loaded data is for.
    pub async fn date(&self) -> NaiveDate {
        self.state.read().await.date
    }

    /// Snapshot of one line's state.
    pub async fn line_state(&self, line: &LineId) -> Option<LineState> {
        self.state.read().await.lines.get(line).cloned()
    }

    /// Reload every line for `now`'s date and recompute the display.
    ///
    /// Lines load concurrently and independently. A line that fails to load
    /// keeps its previous data for the same date.
    pub async fn refresh_data(&self, now: NaiveDateTime) {
        let date = now.date();
        let lines = self.lines().await;
        let loaded = join_all(lines.iter().map(|line| self.load_line(line, date))).await;

        {
            let mut state = self.state.write().await;
            let same_date = state.date == date;
            let mut previous = std::mem::take(&mut state.lines);

            for mut line_state in loaded {
                if let LineStatus::Failed { message } = &line_state.status
                    && same_date
                    && let Some(old) = previous.remove(&line_state.line)
                    && old.today.is_some()
                {
                    warn!(line = %line_state.line, error = %message, "keeping previously loaded data");
                    line_state = old;
                }
                state.lines.insert(line_state.line.clone(), line_state);
            }
            state.date = date;
        }

        self.refresh_display(now).await;
    }

    async fn load_line(&self, line: &LineId, date: NaiveDate) -> LineState {
        let mut line_state = LineState::pending(line.clone());

        let seasons = match self.loader.load_seasons(line).await {
            Ok(seasons) => seasons,
            Err(e) => {
                error!(line = %line, error = %e, "failed to load season config");
                line_state.status = LineStatus::Failed {
                    message: e.to_string(),
                };
                return line_state;
            }
        };

        let today = match self.loader.load_day(line, &seasons, date).await {
            Ok(day) => day,
            Err(LoadError::Unresolved(_)) => {
                warn!(line = %line, "no season defined");
                line_state.seasons = seasons;
                line_state.status = LineStatus::Unresolved;
                return line_state;
            }
            Err(e) => {
                error!(line = %line, error = %e, "failed to load timetable");
                line_state.seasons = seasons;
                line_state.status = LineStatus::Failed {
                    message: e.to_string(),
                };
                return line_state;
            }
        };

        let tomorrow = match date.succ_opt() {
            Some(next) => match self.loader.load_day(line, &seasons, next).await {
                Ok(day) => Some(day),
                Err(e) => {
                    warn!(line = %line, error = %e, "tomorrow's timetable unavailable");
                    None
                }
            },
            None => None,
        };

        line_state.status = if today.resolution.expired {
            warn!(
                line = %line,
                expiry_date = ?today.resolution.expiry_date,
                "all seasons ended, showing the latest one"
            );
            LineStatus::Stale {
                expiry_date: today.resolution.expiry_date,
            }
        } else {
            LineStatus::Ready
        };
        info!(line = %line, file = ?today.resolution.file_name, "line loaded");

        line_state.seasons = seasons;
        line_state.today = Some(today);
        line_state.tomorrow = tomorrow;
        line_state
    }

    /// Reload if the date has changed since the last load.
    pub async fn check_rollover(&self, now: NaiveDateTime) -> bool {
        if self.date().await == now.date() {
            return false;
        }
        self.refresh_data(now).await;
        true
    }

    /// Recompute the stored display from the loaded data.
    pub async fn refresh_display(&self, now: NaiveDateTime) {
        let display = self.boards(None, None, self.max_departures, now).await;
        let mut state = self.state.write().await;
        state.display = display;
        state.display_computed_at = Some(now);
    }

    /// Last computed display and when it was computed.
    pub async fn display(&self) -> (Vec<LineBoard>, Option<NaiveDateTime>) {
        let state = self.state.read().await;
        (state.display.clone(), state.display_computed_at)
    }

    /// Boards for `lines` (all loaded lines if `None`), in the requested order.
    pub async fn boards(
        &self,
        lines: Option<&[LineId]>,
        highlight: Option<&str>,
        max: usize,
        now: NaiveDateTime,
    ) -> Vec<LineBoard> {
        let state = self.state.read().await;
        match lines {
            Some(lines) => lines
                .iter()
                .filter_map(|line| state.lines.get(line))
                .map(|s| s.board(highlight, max, now))
                .collect(),
            None => state
                .lines
                .values()
                .map(|s| s.board(highlight, max, now))
                .collect(),
        }
    }

    /// Resolve every line for an arbitrary date without loading timetables.
    pub async fn resolve(&self, date: NaiveDate) -> Vec<(LineId, Result<Resolution, LoadError>)> {
        let lines = self.lines().await;
        join_all(lines.into_iter().map(|line| async move {
            let result = self
                .loader
                .load_seasons(&line)
                .await
                .map(|seasons| resolve_for_date(&seasons, date));
            (line, result)
        }))
        .await
    }

    /// Replace the line list, drop all loaded data and reload.
    pub async fn reset(&self, lines: Vec<LineId>, now: NaiveDateTime) {
        info!(lines = lines.len(), "resetting board");
        {
            *self.state.write().await = BoardState::new(now.date(), &lines);
            *self.lines.write().await = lines;
        }
        self.refresh_data(now).await;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::offline::{CoordinatorConfig, MemoryStorage, MockFetcher};

    pub(crate) type TestController = BoardController<Arc<MockFetcher>, MemoryStorage>;

    pub(crate) async fn controller(lines: &[&str]) -> (Arc<MockFetcher>, Arc<TestController>) {
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

        let lines = lines.iter().map(|l| LineId::parse(l).unwrap()).collect();
        (fetcher, Arc::new(BoardController::new(coordinator, lines)))
    }

    fn route_line(fetcher: &MockFetcher, line: &str, start: &str, end: &str) {
        fetcher.route_json(
            &format!("/data/{line}/config.json"),
            &serde_json::json!({"season_mapping": [
                {"name": "Summer", "period": {"start": start, "end": end},
                 "files": {"weekday": "summer.json", "sunday": "sunday.json"}}
            ]}),
        );
        fetcher.route_json(
            &format!("/data/{line}/summer.json"),
            &serde_json::json!({"metadata": {}, "departures": {"Pier": ["07:00", "12:30", "18:00"]}}),
        );
        fetcher.route_json(
            &format!("/data/{line}/sunday.json"),
            &serde_json::json!({"metadata": {}, "departures": {"Pier": ["10:00"]}}),
        );
    }

    fn line(s: &str) -> LineId {
        LineId::parse(s).unwrap()
    }

    fn monday_noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn lines_load_independently() {
        let (fetcher, controller) = controller(&["shuttle", "city"]).await;
        route_line(&fetcher, "shuttle", "2024-06-01", "2024-08-31");

        controller.refresh_data(monday_noon()).await;

        let shuttle = controller.line_state(&line("shuttle")).await.unwrap();
        assert_eq!(shuttle.status, LineStatus::Ready);
        assert!(shuttle.today.is_some());
        assert!(shuttle.tomorrow.is_some());

        let city = controller.line_state(&line("city")).await.unwrap();
        assert!(matches!(city.status, LineStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn display_is_computed_after_refresh() {
        let (fetcher, controller) = controller(&["shuttle"]).await;
        route_line(&fetcher, "shuttle", "2024-06-01", "2024-08-31");

        controller.refresh_data(monday_noon()).await;
        let (display, at) = controller.display().await;
        assert_eq!(at, Some(monday_noon()));
        assert_eq!(display.len(), 1);

        let times: Vec<_> = display[0].stops[0]
            .departures
            .iter()
            .map(|d| d.time.as_str())
            .collect();
        assert_eq!(times, vec!["12:30", "18:00", "07:00", "12:30", "18:00"]);
    }

    #[tokio::test]
    async fn display_uses_configured_departure_count() {
        let (fetcher, controller) = controller(&["shuttle"]).await;
        route_line(&fetcher, "shuttle", "2024-06-01", "2024-08-31");
        let controller = Arc::into_inner(controller).unwrap().with_max_departures(2);

        controller.refresh_data(monday_noon()).await;
        let (display, _) = controller.display().await;
        let times: Vec<_> = display[0].stops[0]
            .departures
            .iter()
            .map(|d| d.time.as_str())
            .collect();
        assert_eq!(times, vec!["12:30", "18:00"]);
    }

    #[tokio::test]
    async fn expired_season_is_stale() {
        let (fetcher, controller) = controller(&["shuttle"]).await;
        route_line(&fetcher, "shuttle", "2024-01-01", "2024-05-31");

        controller.refresh_data(monday_noon()).await;
        let state = controller.line_state(&line("shuttle")).await.unwrap();
        assert_eq!(
            state.status,
            LineStatus::Stale {
                expiry_date: NaiveDate::from_ymd_opt(2024, 5, 31)
            }
        );
        assert!(state.today.is_some());
    }

    #[tokio::test]
    async fn empty_season_list_is_unresolved() {
        let (fetcher, controller) = controller(&["shuttle"]).await;
        fetcher.route_json(
            "/data/shuttle/config.json",
            &serde_json::json!({"season_mapping": []}),
        );

        controller.refresh_data(monday_noon()).await;
        let state = controller.line_state(&line("shuttle")).await.unwrap();
        assert_eq!(state.status, LineStatus::Unresolved);
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_data() {
        let (fetcher, controller) = controller(&["shuttle"]).await;
        route_line(&fetcher, "shuttle", "2024-06-01", "2024-08-31");
        controller.refresh_data(monday_noon()).await;

        fetcher.route_status("/data/shuttle/config.json", 500, "text/plain", "");
        controller.refresh_data(monday_noon()).await;

        let state = controller.line_state(&line("shuttle")).await.unwrap();
        assert_eq!(state.status, LineStatus::Ready);
        assert!(state.today.is_some());
    }

    #[tokio::test]
    async fn rollover_reloads_for_new_date() {
        let (fetcher, controller) = controller(&["shuttle"]).await;
        route_line(&fetcher, "shuttle", "2024-06-01", "2024-08-31");
        controller.refresh_data(monday_noon()).await;

        assert!(!controller.check_rollover(monday_noon()).await);

        // Saturday night into Sunday
        let sunday = NaiveDate::from_ymd_opt(2024, 7, 7)
            .unwrap()
            .and_hms_opt(0, 1, 0)
            .unwrap();
        assert!(controller.check_rollover(sunday).await);
        assert_eq!(controller.date().await, sunday.date());

        let state = controller.line_state(&line("shuttle")).await.unwrap();
        let today = state.today.unwrap();
        assert_eq!(today.resolution.file_name.as_deref(), Some("sunday.json"));
    }

    #[tokio::test]
    async fn boards_filter_and_highlight() {
        let (fetcher, controller) = controller(&["shuttle", "city"]).await;
        route_line(&fetcher, "shuttle", "2024-06-01", "2024-08-31");
        route_line(&fetcher, "city", "2024-06-01", "2024-08-31");
        controller.refresh_data(monday_noon()).await;

        let wanted = [line("city"), line("nowhere")];
        let boards = controller
            .boards(Some(&wanted), Some("Pier"), 1, monday_noon())
            .await;
        assert_eq!(boards.len(), 1);
        assert_eq!(boards[0].line, line("city"));
        assert!(boards[0].stops[0].highlighted);
        assert_eq!(boards[0].stops[0].departures.len(), 1);
    }

    #[tokio::test]
    async fn resolve_reports_per_line() {
        let (fetcher, controller) = controller(&["shuttle", "city"]).await;
        route_line(&fetcher, "shuttle", "2024-06-01", "2024-08-31");

        let date = NaiveDate::from_ymd_opt(2024, 9, 15).unwrap();
        let results = controller.resolve(date).await;
        assert_eq!(results.len(), 2);

        let (name, shuttle) = &results[0];
        assert_eq!(name, &line("shuttle"));
        let shuttle = shuttle.as_ref().unwrap();
        assert!(shuttle.expired);
        assert_eq!(shuttle.file_name.as_deref(), Some("sunday.json"));

        assert!(results[1].1.is_err());
    }

    #[tokio::test]
    async fn reset_replaces_lines() {
        let (fetcher, controller) = controller(&["shuttle"]).await;
        route_line(&fetcher, "shuttle", "2024-06-01", "2024-08-31");
        route_line(&fetcher, "city", "2024-06-01", "2024-08-31");
        controller.refresh_data(monday_noon()).await;

        controller.reset(vec![line("city")], monday_noon()).await;
        assert_eq!(controller.lines().await, vec![line("city")]);
        assert!(controller.line_state(&line("shuttle")).await.is_none());
        assert_eq!(
            controller.line_state(&line("city")).await.unwrap().status,
            LineStatus::Ready
        );
    }
}
