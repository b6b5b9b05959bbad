//! Timetable file resolution.
//!
//! Picks which timetable file a line uses on a given date from the line's
//! ordered season list. The first season whose period contains the date
//! wins. When no season matches, the season that ends latest is used and
//! the result is marked expired so the display can warn that the published
//! schedule has run out.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::domain::DayType;

use super::season::SeasonDefinition;

/// Outcome of resolving one line for one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Timetable file to load. `None` only when the season list is empty.
    pub file_name: Option<String>,

    /// True when no season covers the date and the latest-ending season was
    /// used instead.
    pub expired: bool,

    /// End of the fallback season's period when `expired`.
    pub expiry_date: Option<NaiveDate>,

    /// Name of the season the file came from.
    pub season: Option<String>,

    /// The chosen season is flagged for maintenance.
    pub maintenance_mode: bool,

    /// The weekend file was selected by a holiday rule.
    pub holiday_override: bool,

    /// Day type the chosen file is read as. Differs from the date's own
    /// classification under a holiday override.
    pub day_type: DayType,

    /// The date is listed as a no-traffic day in the matched season.
    pub no_traffic: bool,
}

impl Resolution {
    /// The empty-season-list result.
    pub fn unresolved() -> Self {
        Self {
            file_name: None,
            expired: false,
            expiry_date: None,
            season: None,
            maintenance_mode: false,
            holiday_override: false,
            day_type: DayType::Weekday,
            no_traffic: false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.file_name.is_some()
    }
}

/// Resolve the timetable file for `date`.
///
/// `day_type` is normally `DayType::from_date(date)`; it is a separate
/// argument so callers can classify dates their own way.
///
/// # Examples
///
/// ```
/// use ferry_board::domain::DayType;
/// use ferry_board::schedule::{SeasonConfig, resolve};
/// use chrono::NaiveDate;
///
/// let config: SeasonConfig = serde_json::from_str(r#"{"season_mapping": [
///     {"name": "Winter", "period": {"start": "2023-12-01", "end": "2024-01-31"},
///      "files": {"weekday": "w.json"}},
///     {"name": "Summer", "period": {"start": "2024-06-01", "end": "2024-08-31"},
///      "files": {"weekday": "s.json"}}
/// ]}"#).unwrap();
///
/// let july = NaiveDate::from_ymd_opt(2024, 7, 10).unwrap();
/// let r = resolve(&config.season_mapping, july, DayType::Weekday);
/// assert_eq!(r.file_name.as_deref(), Some("s.json"));
/// assert!(!r.expired);
/// ```
pub fn resolve(seasons: &[SeasonDefinition], date: NaiveDate, day_type: DayType) -> Resolution {
    let mut exact: Option<&SeasonDefinition> = None;
    let mut latest: Option<&SeasonDefinition> = None;

    for season in seasons {
        if latest.is_none_or(|l| season.period.end > l.period.end) {
            latest = Some(season);
        }

        if exact.is_none() && season.period.contains(date) {
            exact = Some(season);
        }
    }

    if let Some(season) = exact {
        let holiday_override = season.holiday_rules.runs_weekend_schedule(date);
        let (file, effective) = if holiday_override {
            (season.files.weekend(), season.files.weekend_day_type())
        } else {
            (season.files.for_day(day_type), day_type)
        };

        debug!(
            season = %season.name,
            file,
            %date,
            holiday_override,
            "resolved timetable"
        );

        return Resolution {
            file_name: Some(file.to_string()),
            expired: false,
            expiry_date: None,
            season: Some(season.name.clone()),
            maintenance_mode: season.maintenance_mode,
            holiday_override,
            day_type: effective,
            no_traffic: season.holiday_rules.is_no_traffic(date),
        };
    }

    match latest {
        Some(season) => {
            let file = season.files.for_day(day_type);
            debug!(
                season = %season.name,
                file,
                %date,
                expired_on = %season.period.end,
                "no season covers date, using latest"
            );

            Resolution {
                file_name: Some(file.to_string()),
                expired: true,
                expiry_date: Some(season.period.end),
                season: Some(season.name.clone()),
                maintenance_mode: season.maintenance_mode,
                holiday_override: false,
                day_type,
                no_traffic: false,
            }
        }
        None => Resolution::unresolved(),
    }
}

/// Resolve using the date's own weekday classification.
pub fn resolve_for_date(seasons: &[SeasonDefinition], date: NaiveDate) -> Resolution {
    resolve(seasons, date, DayType::from_date(date))
}
