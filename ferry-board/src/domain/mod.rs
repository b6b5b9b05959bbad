//! Domain types for the ferry departure board.
//!
//! This module contains the validated value types shared by schedule
//! resolution and departure processing. All types enforce their invariants
//! at construction time, so code that receives these types can trust their
//! validity.

mod day;
mod line;
mod time;

pub use day::{DayOffset, DayType, WeekdayIndex};
pub use line::{InvalidLineId, LineId};
pub use time::{DepartureTime, MINUTES_PER_DAY, TimeError, minutes_since_midnight};
