//! Departure processing for the board.
//!
//! [`process_departures`] turns raw today/tomorrow time lists into the
//! bounded list of upcoming departures; [`DayPair`] feeds it from loaded
//! timetables and annotates the result.

mod board;
mod process;

pub use board::{BoardDeparture, DayPair, StopBoard};
pub use process::{
    Departure, DepartureEntry, DepartureInstance, process_departures, rank_departures,
    upcoming_window,
};
