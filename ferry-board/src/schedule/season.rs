//! Season definitions: which timetable files apply over which dates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::DayType;

/// A line's season config document.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeasonConfig {
    pub season_mapping: Vec<SeasonDefinition>,
}

/// One named date range with its timetable files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SeasonDefinition {
    pub name: String,
    pub period: Period,
    pub files: FileSet,
    #[serde(default)]
    pub holiday_rules: HolidayRules,
    #[serde(default)]
    pub maintenance_mode: bool,
}

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    /// Both ends are inclusive.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn overlaps(&self, other: &Period) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Timetable file names per day type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileSet {
    pub weekday: String,
    #[serde(default)]
    pub saturday: Option<String>,
    #[serde(default)]
    pub sunday: Option<String>,
}

impl FileSet {
    /// File for a day type, falling back to the weekday file when the
    /// season has none for that day type.
    pub fn for_day(&self, day_type: DayType) -> &str {
        let specific = match day_type {
            DayType::Weekday => None,
            DayType::Saturday => self.saturday.as_deref(),
            DayType::Sunday => self.sunday.as_deref(),
        };
        specific.unwrap_or(&self.weekday)
    }

    /// File used on dates with a weekend-schedule holiday rule.
    ///
    /// Sunday service first, then Saturday, then the weekday file.
    pub fn weekend(&self) -> &str {
        self.sunday
            .as_deref()
            .or(self.saturday.as_deref())
            .unwrap_or(&self.weekday)
    }

    /// Day type whose entries apply when running `weekend()`.
    pub fn weekend_day_type(&self) -> DayType {
        match (&self.sunday, &self.saturday) {
            (None, Some(_)) => DayType::Saturday,
            _ => DayType::Sunday,
        }
    }
}

/// Date exceptions attached to a season.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HolidayRules {
    /// Dates with no service at all.
    #[serde(default)]
    pub no_traffic: Vec<NaiveDate>,
    /// Dates that run the weekend timetable regardless of weekday.
    #[serde(default)]
    pub weekend_schedule: Vec<NaiveDate>,
}

impl HolidayRules {
    pub fn runs_weekend_schedule(&self, date: NaiveDate) -> bool {
        self.weekend_schedule.contains(&date)
    }

    pub fn is_no_traffic(&self, date: NaiveDate) -> bool {
        self.no_traffic.contains(&date)
    }
}

/// Pairs of season names whose periods overlap, in list order.
///
/// Overlaps are legal: the earlier season wins during the shared dates.
pub fn overlapping_periods(seasons: &[SeasonDefinition]) -> Vec<(String, String)> {
    let mut overlaps = Vec::new();
    for (i, a) in seasons.iter().enumerate() {
        for b in &seasons[i + 1..] {
            if a.period.overlaps(&b.period) {
                overlaps.push((a.name.clone(), b.name.clone()));
            }
        }
    }
    overlaps
}
