//! Data transfer objects for web requests and responses.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::config::parse_lines;
use crate::controller::{DEFAULT_MAX_DEPARTURES, LineBoard};
use crate::domain::LineId;
use crate::schedule::Resolution;

/// Largest departure count a request may ask for.
pub const MAX_DEPARTURES_LIMIT: usize = 50;

/// Query parameters for the board.
#[derive(Debug, Default, Deserialize)]
pub struct BoardQuery {
    /// Comma-separated line ids (defaults to all)
    pub line: Option<String>,

    /// Stop to highlight
    pub stop: Option<String>,

    /// Maximum departures per stop
    pub n: Option<i64>,
}

impl BoardQuery {
    /// Requested lines, or `None` for all.
    pub fn lines(&self) -> Result<Option<Vec<LineId>>, String> {
        match self.line.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(list) => parse_lines(list).map(Some),
        }
    }

    pub fn highlight(&self) -> Option<&str> {
        self.stop.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Departure count, clamped to `1..=MAX_DEPARTURES_LIMIT`.
    pub fn max(&self) -> usize {
        match self.n {
            None => DEFAULT_MAX_DEPARTURES,
            Some(n) => n.clamp(1, MAX_DEPARTURES_LIMIT as i64) as usize,
        }
    }
}

/// Board response.
#[derive(Debug, Serialize)]
pub struct BoardResponse {
    pub date: NaiveDate,
    pub generated_at: NaiveDateTime,
    /// Version of the running build
    pub version: String,
    pub lines: Vec<LineBoard>,
}

/// Query parameters for resolution.
#[derive(Debug, Default, Deserialize)]
pub struct ResolveQuery {
    /// Date as YYYY-MM-DD (defaults to today)
    pub date: Option<String>,
}

impl ResolveQuery {
    pub fn date(&self) -> Result<Option<NaiveDate>, String> {
        match self.date.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(Some)
                .map_err(|e| format!("invalid date {s:?}: {e}")),
        }
    }
}

/// One line's resolution outcome.
#[derive(Debug, Serialize)]
pub struct LineResolution {
    pub line: LineId,
    pub resolution: Option<Resolution>,
    pub error: Option<String>,
}

/// Resolution response.
#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub date: NaiveDate,
    pub lines: Vec<LineResolution>,
}

/// Reset response.
#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub lines: Vec<LineId>,
    /// Number of running timers after the restart
    pub timers: usize,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}
