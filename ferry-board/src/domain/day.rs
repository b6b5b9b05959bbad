//! Calendar classification of dates.

use std::fmt;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Which timetable family a date uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayType {
    Weekday,
    Saturday,
    Sunday,
}

impl DayType {
    /// Classify a date by its weekday.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferry_board::domain::DayType;
    /// use chrono::NaiveDate;
    ///
    /// let saturday = NaiveDate::from_ymd_opt(2024, 3, 16).unwrap();
    /// assert_eq!(DayType::from_date(saturday), DayType::Saturday);
    /// ```
    pub fn from_date(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Sat => DayType::Saturday,
            Weekday::Sun => DayType::Sunday,
            _ => DayType::Weekday,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayType::Weekday => "weekday",
            DayType::Saturday => "saturday",
            DayType::Sunday => "sunday",
        }
    }
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ISO weekday number, Monday = 1 through Sunday = 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WeekdayIndex(u8);

impl WeekdayIndex {
    /// Returns `None` outside 1..=7.
    pub fn new(index: u8) -> Option<Self> {
        (1..=7).contains(&index).then_some(Self(index))
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.weekday().number_from_monday() as u8)
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for WeekdayIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which day a departure list belongs to, relative to the board date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DayOffset {
    Today,
    Tomorrow,
}

impl DayOffset {
    /// 0 for today, 1 for tomorrow.
    pub fn days(&self) -> i32 {
        match self {
            DayOffset::Today => 0,
            DayOffset::Tomorrow => 1,
        }
    }

    pub fn is_today(&self) -> bool {
        matches!(self, DayOffset::Today)
    }
}
