//! Board state owned by the controller, and board assembly from it.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::departures::{DayPair, StopBoard};
use crate::domain::LineId;
use crate::schedule::{LoadedDocument, Resolution, SeasonDefinition};

/// Message shown when a season is flagged for maintenance without a
/// timetable-provided message.
const DEFAULT_MAINTENANCE_MESSAGE: &str = "Service suspended for maintenance";

/// A resolved and loaded timetable for one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDay {
    pub date: NaiveDate,
    pub resolution: Resolution,
    pub document: LoadedDocument,
}

impl LoadedDay {
    /// Maintenance message from the season or any of the day's timetables.
    pub fn maintenance_message(&self) -> Option<String> {
        let from_timetable = self
            .document
            .schedules()
            .into_iter()
            .find_map(|(_, t)| t.maintenance().map(str::to_string));

        match from_timetable {
            Some(message) if !message.is_empty() => Some(message),
            Some(_) => Some(DEFAULT_MAINTENANCE_MESSAGE.to_string()),
            None => self
                .resolution
                .maintenance_mode
                .then(|| DEFAULT_MAINTENANCE_MESSAGE.to_string()),
        }
    }
}

/// Load outcome for a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LineStatus {
    /// Not loaded yet.
    Pending,
    Ready,
    /// Loaded from a season that ended on `expiry_date`.
    Stale { expiry_date: Option<NaiveDate> },
    /// The line has no seasons.
    Unresolved,
    Failed { message: String },
}

/// Everything loaded for one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineState {
    pub line: LineId,
    pub status: LineStatus,
    pub seasons: Vec<SeasonDefinition>,
    pub today: Option<LoadedDay>,
    pub tomorrow: Option<LoadedDay>,
}

impl LineState {
    pub fn pending(line: LineId) -> Self {
        Self {
            line,
            status: LineStatus::Pending,
            seasons: Vec::new(),
            today: None,
            tomorrow: None,
        }
    }

    /// Assemble the board for this line.
    ///
    /// `highlight` marks a stop; `max` bounds each stop's departures.
    pub fn board(&self, highlight: Option<&str>, max: usize, now: NaiveDateTime) -> LineBoard {
        let mut board = LineBoard {
            line: self.line.clone(),
            status: self.status.clone(),
            season: None,
            expired: false,
            expiry_date: None,
            no_traffic: false,
            maintenance_message: None,
            stops: Vec::new(),
        };

        let Some(today) = &self.today else {
            return board;
        };

        board.season = today.resolution.season.clone();
        board.expired = today.resolution.expired;
        board.expiry_date = today.resolution.expiry_date;
        board.no_traffic = today.resolution.no_traffic;
        board.maintenance_message = today.maintenance_message();
        if board.maintenance_message.is_some() {
            return board;
        }

        let tomorrow = self
            .tomorrow
            .as_ref()
            .filter(|day| day.maintenance_message().is_none());

        for (direction, timetable) in today.document.schedules() {
            let pair = DayPair {
                date: today.date,
                today: Some(timetable),
                tomorrow: tomorrow.and_then(|day| day.document.schedule(direction)),
            };
            for stop in pair.stops() {
                let highlighted = highlight == Some(stop);
                board
                    .stops
                    .push(pair.stop_board(stop, direction, now.time(), max, highlighted));
            }
        }
        board
    }
}

/// Computed board for one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineBoard {
    pub line: LineId,
    pub status: LineStatus,
    pub season: Option<String>,
    pub expired: bool,
    pub expiry_date: Option<NaiveDate>,
    pub no_traffic: bool,
    pub maintenance_message: Option<String>,
    pub stops: Vec<StopBoard>,
}

/// All board state, owned by one controller.
#[derive(Debug, Clone)]
pub struct BoardState {
    /// Date the loaded timetables are for.
    pub date: NaiveDate,
    pub lines: BTreeMap<LineId, LineState>,
    /// Last computed display.
    pub display: Vec<LineBoard>,
    pub display_computed_at: Option<NaiveDateTime>,
}

impl BoardState {
    pub fn new(date: NaiveDate, lines: &[LineId]) -> Self {
        Self {
            date,
            lines: lines
                .iter()
                .map(|line| (line.clone(), LineState::pending(line.clone())))
                .collect(),
            display: Vec::new(),
            display_computed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DayType;
    use crate::schedule::Direction;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn resolution(file: &str) -> Resolution {
        Resolution {
            file_name: Some(file.into()),
            season: Some("Summer".into()),
            ..Resolution::unresolved()
        }
    }

    fn day(on: NaiveDate, json: &str) -> LoadedDay {
        LoadedDay {
            date: on,
            resolution: resolution("summer.json"),
            document: LoadedDocument::parse(json.as_bytes(), DayType::from_date(on)).unwrap(),
        }
    }

    fn ready(today: LoadedDay, tomorrow: Option<LoadedDay>) -> LineState {
        LineState {
            line: LineId::parse("shuttle").unwrap(),
            status: LineStatus::Ready,
            seasons: Vec::new(),
            today: Some(today),
            tomorrow,
        }
    }

    fn now() -> NaiveDateTime {
        date(7, 1).and_hms_opt(23, 0, 0).unwrap()
    }

    #[test]
    fn board_spans_midnight() {
        let json = r#"{"metadata": {}, "departures": {"Pier": ["22:30", "23:30"], "Isle": ["23:10"]}}"#;
        let state = ready(day(date(7, 1), json), Some(day(date(7, 2), json)));

        let board = state.board(Some("Pier"), 3, now());
        assert_eq!(board.stops.len(), 2);
        assert_eq!(board.stops[0].stop, "Isle");
        assert!(!board.stops[0].highlighted);

        let pier = &board.stops[1];
        assert!(pier.highlighted);
        let times: Vec<_> = pier
            .departures
            .iter()
            .map(|d| (d.time.as_str(), d.is_today))
            .collect();
        assert_eq!(times, vec![("23:30", true), ("22:30", false), ("23:30", false)]);
    }

    #[test]
    fn bidirectional_board_has_both_directions() {
        let json = r#"{
            "to_city": {"metadata": {}, "departures": {"Harbour": ["23:15"]}},
            "from_city": {"metadata": {}, "departures": {"Harbour": ["23:45"]}}
        }"#;
        let state = ready(day(date(7, 1), json), None);

        let board = state.board(None, 5, now());
        let directions: Vec<_> = board.stops.iter().map(|s| s.direction).collect();
        assert_eq!(
            directions,
            vec![Some(Direction::ToCity), Some(Direction::FromCity)]
        );
    }

    #[test]
    fn maintenance_suppresses_departures() {
        let json = r#"{"metadata": {"maintenance_mode": true, "maintenance_message": "Quay works"},
                       "departures": {"Pier": ["23:30"]}}"#;
        let board = ready(day(date(7, 1), json), None).board(None, 5, now());
        assert_eq!(board.maintenance_message.as_deref(), Some("Quay works"));
        assert!(board.stops.is_empty());
    }

    #[test]
    fn season_maintenance_uses_default_message() {
        let json = r#"{"metadata": {}, "departures": {"Pier": ["23:30"]}}"#;
        let mut today = day(date(7, 1), json);
        today.resolution.maintenance_mode = true;
        let board = ready(today, None).board(None, 5, now());
        assert_eq!(
            board.maintenance_message.as_deref(),
            Some(DEFAULT_MAINTENANCE_MESSAGE)
        );
    }

    #[test]
    fn no_traffic_is_reported_not_applied() {
        let json = r#"{"metadata": {}, "departures": {"Pier": ["08:00", "23:30"]}}"#;
        let mut today = day(date(7, 1), json);
        today.resolution.no_traffic = true;
        let board = ready(today, Some(day(date(7, 2), json))).board(None, 5, now());

        assert!(board.no_traffic);
        assert!(board.stops[0].departures[0].is_today);
    }

    #[test]
    fn maintenance_tomorrow_drops_only_tomorrow() {
        let json = r#"{"metadata": {}, "departures": {"Pier": ["08:00", "23:30"]}}"#;
        let closed = r#"{"metadata": {"maintenance_mode": true}, "departures": {"Pier": ["08:00"]}}"#;
        let board = ready(day(date(7, 1), json), Some(day(date(7, 2), closed))).board(None, 5, now());

        assert!(board.maintenance_message.is_none());
        let times: Vec<_> = board.stops[0].departures.iter().map(|d| d.time.as_str()).collect();
        assert_eq!(times, vec!["23:30"]);
    }

    #[test]
    fn expired_and_failed_lines() {
        let json = r#"{"metadata": {}, "departures": {}}"#;
        let mut today = day(date(7, 1), json);
        today.resolution.expired = true;
        today.resolution.expiry_date = Some(date(6, 30));
        let board = ready(today, None).board(None, 5, now());
        assert!(board.expired);
        assert_eq!(board.expiry_date, Some(date(6, 30)));

        let failed = LineState {
            status: LineStatus::Failed {
                message: "boom".into(),
            },
            ..LineState::pending(LineId::parse("city").unwrap())
        };
        let board = failed.board(None, 5, now());
        assert!(board.stops.is_empty());
        assert_eq!(
            serde_json::to_value(&board.status).unwrap(),
            serde_json::json!({"state": "failed", "message": "boom"})
        );
    }
}
