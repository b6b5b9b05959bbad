//! Timetable documents.
//!
//! A line's timetable file is either a single direct schedule or, for the
//! bidirectional city line, a `{to_city, from_city}` pair of schedules.
//! Documents are parsed into [`TimetableDocument`] and immediately converted
//! into [`LoadedDocument`], whose disembark-only data has been normalized.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::DayType;

use super::disembark::{DisembarkOnly, RawDisembark, normalize};

/// Travel direction on the bidirectional line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    ToCity,
    FromCity,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ToCity => f.write_str("to_city"),
            Direction::FromCity => f.write_str("from_city"),
        }
    }
}

/// Validity period as written in a timetable header.
///
/// Documents carry either a `{start, end}` object or free text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ValidPeriod {
    Range { start: String, end: String },
    Text(String),
}

/// Timetable header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimetableMetadata {
    #[serde(default)]
    pub valid_period: Option<ValidPeriod>,
    #[serde(default)]
    pub day_type: Option<String>,
    #[serde(default)]
    pub maintenance_mode: bool,
    #[serde(default)]
    pub maintenance_message: Option<String>,
}

/// One direct schedule as it appears in a document.
#[derive(Debug, Clone, Deserialize)]
pub struct TimetableFile {
    pub metadata: TimetableMetadata,
    /// Stop → departure times. Times are kept as written; malformed ones
    /// are dropped during departure processing.
    #[serde(default)]
    pub departures: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub disembark_only: Option<RawDisembark>,
}

/// A timetable document of either shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TimetableDocument {
    Bidirectional {
        to_city: TimetableFile,
        from_city: TimetableFile,
    },
    Direct(TimetableFile),
}

/// A direct schedule with normalized disembark-only data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timetable {
    pub metadata: TimetableMetadata,
    pub departures: BTreeMap<String, Vec<String>>,
    pub disembark_only: DisembarkOnly,
}

impl Timetable {
    fn from_file(file: TimetableFile, day_type: DayType, direction: Option<Direction>) -> Self {
        let disembark_only = normalize(file.disembark_only.as_ref(), day_type, direction);
        Self {
            metadata: file.metadata,
            departures: file.departures,
            disembark_only,
        }
    }

    /// Raw departure strings for a stop; empty if the stop is not served.
    pub fn departures_at(&self, stop: &str) -> &[String] {
        self.departures.get(stop).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn stops(&self) -> impl Iterator<Item = &str> {
        self.departures.keys().map(String::as_str)
    }

    /// Maintenance message if the timetable is flagged for maintenance.
    pub fn maintenance(&self) -> Option<&str> {
        self.metadata
            .maintenance_mode
            .then(|| self.metadata.maintenance_message.as_deref().unwrap_or(""))
    }
}

/// A loaded timetable document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadedDocument {
    Direct(Timetable),
    Bidirectional {
        to_city: Timetable,
        from_city: Timetable,
    },
}

impl LoadedDocument {
    /// Normalize a parsed document for the day type it will be shown on.
    pub fn from_document(doc: TimetableDocument, day_type: DayType) -> Self {
        match doc {
            TimetableDocument::Direct(file) => {
                LoadedDocument::Direct(Timetable::from_file(file, day_type, None))
            }
            TimetableDocument::Bidirectional { to_city, from_city } => {
                LoadedDocument::Bidirectional {
                    to_city: Timetable::from_file(to_city, day_type, Some(Direction::ToCity)),
                    from_city: Timetable::from_file(from_city, day_type, Some(Direction::FromCity)),
                }
            }
        }
    }

    /// Parse and normalize JSON text.
    pub fn parse(json: &[u8], day_type: DayType) -> Result<Self, serde_json::Error> {
        let doc: TimetableDocument = serde_json::from_slice(json)?;
        Ok(Self::from_document(doc, day_type))
    }

    /// Each schedule with its direction (`None` for a direct line).
    pub fn schedules(&self) -> Vec<(Option<Direction>, &Timetable)> {
        match self {
            LoadedDocument::Direct(t) => vec![(None, t)],
            LoadedDocument::Bidirectional { to_city, from_city } => vec![
                (Some(Direction::ToCity), to_city),
                (Some(Direction::FromCity), from_city),
            ],
        }
    }

    pub fn schedule(&self, direction: Option<Direction>) -> Option<&Timetable> {
        match (self, direction) {
            (LoadedDocument::Direct(t), None) => Some(t),
            (LoadedDocument::Bidirectional { to_city, .. }, Some(Direction::ToCity)) => {
                Some(to_city)
            }
            (LoadedDocument::Bidirectional { from_city, .. }, Some(Direction::FromCity)) => {
                Some(from_city)
            }
            _ => None,
        }
    }
}
