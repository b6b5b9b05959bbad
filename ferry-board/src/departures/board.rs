//! Stop boards assembled from loaded timetables.

use std::collections::BTreeSet;

use chrono::{Days, NaiveDate, NaiveTime};
use serde::Serialize;

use crate::domain::{DayOffset, WeekdayIndex};
use crate::schedule::{Direction, Timetable};

use super::process::{DepartureEntry, process_departures};

/// A departure on a stop board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardDeparture {
    pub time: String,
    pub is_today: bool,
    /// Passengers may only alight.
    pub disembark_only: bool,
}

/// Upcoming departures for one stop in one direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopBoard {
    pub stop: String,
    pub direction: Option<Direction>,
    pub highlighted: bool,
    pub departures: Vec<BoardDeparture>,
}

/// Today's and tomorrow's schedule for one direction of a line.
#[derive(Debug, Clone, Copy)]
pub struct DayPair<'a> {
    pub date: NaiveDate,
    pub today: Option<&'a Timetable>,
    pub tomorrow: Option<&'a Timetable>,
}

impl<'a> DayPair<'a> {
    /// Processor input for a stop: today's times on today's weekday, then
    /// tomorrow's on the next weekday.
    pub fn entries_for_stop(&self, stop: &str) -> Vec<DepartureEntry> {
        let today_weekday = WeekdayIndex::from_date(self.date);
        let tomorrow_weekday = self
            .date
            .checked_add_days(Days::new(1))
            .map(WeekdayIndex::from_date);

        let mut entries = Vec::new();

        if let Some(t) = self.today {
            entries.extend(
                t.departures_at(stop)
                    .iter()
                    .map(|time| DepartureEntry::new(time.clone(), today_weekday, DayOffset::Today)),
            );
        }

        if let (Some(t), Some(weekday)) = (self.tomorrow, tomorrow_weekday) {
            entries.extend(
                t.departures_at(stop)
                    .iter()
                    .map(|time| DepartureEntry::new(time.clone(), weekday, DayOffset::Tomorrow)),
            );
        }

        entries
    }

    /// Every stop served today or tomorrow, sorted by name.
    pub fn stops(&self) -> Vec<&'a str> {
        let mut stops = BTreeSet::new();
        for t in [self.today, self.tomorrow].into_iter().flatten() {
            stops.extend(t.stops());
        }
        stops.into_iter().collect()
    }

    fn is_disembark_only(&self, stop: &str, time: &str, is_today: bool) -> bool {
        let source = if is_today { self.today } else { self.tomorrow };
        source.is_some_and(|t| t.disembark_only.contains(stop, time))
    }

    /// Build the bounded board for one stop.
    pub fn stop_board(
        &self,
        stop: &str,
        direction: Option<Direction>,
        now: NaiveTime,
        max: usize,
        highlighted: bool,
    ) -> StopBoard {
        let entries = self.entries_for_stop(stop);
        let departures = process_departures(&entries, now, max)
            .into_iter()
            .map(|d| BoardDeparture {
                disembark_only: self.is_disembark_only(stop, &d.time, d.is_today),
                time: d.time,
                is_today: d.is_today,
            })
            .collect();

        StopBoard {
            stop: stop.to_string(),
            direction,
            highlighted,
            departures,
        }
    }
}
