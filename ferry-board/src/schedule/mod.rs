//! Season configs, timetable documents and timetable resolution.
//!
//! Each line publishes a season config listing which timetable file applies
//! over which dates. [`resolve`] picks the file for a date; the loaded file
//! becomes a [`LoadedDocument`] ready for departure processing.

mod disembark;
mod resolve;
mod season;
mod timetable;

pub use disembark::{DisembarkOnly, RawDisembark, normalize as normalize_disembark};
pub use resolve::{Resolution, resolve, resolve_for_date};
pub use season::{
    FileSet, HolidayRules, Period, SeasonConfig, SeasonDefinition, overlapping_periods,
};
pub use timetable::{
    Direction, LoadedDocument, Timetable, TimetableDocument, TimetableFile, TimetableMetadata,
    ValidPeriod,
};
