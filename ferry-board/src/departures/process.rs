//! Departure list processing.
//!
//! Merges today's and tomorrow's departure times for a stop onto a single
//! minute axis that runs across midnight, removes duplicates, and cuts out
//! the bounded window of upcoming departures shown on the board.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::NaiveTime;
use serde::Serialize;
use tracing::warn;

use crate::domain::{
    DayOffset, DepartureTime, MINUTES_PER_DAY, WeekdayIndex, minutes_since_midnight,
};

/// One raw departure time with the day it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartureEntry {
    /// Time as written in the timetable, expected "HH:MM".
    pub time: String,
    pub weekday: WeekdayIndex,
    pub day_offset: DayOffset,
}

impl DepartureEntry {
    pub fn new(time: impl Into<String>, weekday: WeekdayIndex, day_offset: DayOffset) -> Self {
        Self {
            time: time.into(),
            weekday,
            day_offset,
        }
    }
}

/// A departure placed on the board's minute axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartureInstance {
    pub time: DepartureTime,
    pub weekday: WeekdayIndex,
    pub day_offset: DayOffset,
    /// Minutes from today's midnight.
    pub total_order_minutes: i32,
    /// Minutes from now; negative for departures already gone.
    pub diff: i32,
    pub is_past: bool,
    /// Weekday index and time, e.g. `"1|07:30"`. Independent of day offset.
    pub unique_id: String,
}

impl DepartureInstance {
    fn from_entry(entry: &DepartureEntry, now_minutes: i32) -> Option<Self> {
        let time = match DepartureTime::parse_hhmm(&entry.time) {
            Ok(t) => t,
            Err(e) => {
                warn!(time = %entry.time, error = %e, "skipping malformed departure time");
                return None;
            }
        };

        let total_order_minutes =
            entry.day_offset.days() * MINUTES_PER_DAY + time.minutes_since_midnight();
        let diff = total_order_minutes - now_minutes;

        Some(Self {
            time,
            weekday: entry.weekday,
            day_offset: entry.day_offset,
            total_order_minutes,
            diff,
            is_past: diff < 0,
            unique_id: format!("{}|{}", entry.weekday, entry.time),
        })
    }

    /// Whether `self` should replace `other` when both share a unique id.
    fn closer_than(&self, other: &Self) -> bool {
        let (a, b) = (self.diff.abs(), other.diff.abs());
        a < b || (a == b && !self.is_past && other.is_past)
    }
}

/// A departure as handed to the display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Departure {
    pub time: String,
    pub is_today: bool,
}

impl From<&DepartureInstance> for Departure {
    fn from(i: &DepartureInstance) -> Self {
        Self {
            time: i.time.to_string(),
            is_today: i.day_offset.is_today(),
        }
    }
}

/// Place entries on the minute axis, deduplicate by unique id and sort by
/// distance from now.
///
/// Malformed times are skipped individually. When two entries share a
/// unique id, the one closer to now is kept.
pub fn rank_departures(entries: &[DepartureEntry], now: NaiveTime) -> Vec<DepartureInstance> {
    let now_minutes = minutes_since_midnight(now);
    let mut by_id: HashMap<String, DepartureInstance> = HashMap::with_capacity(entries.len());

    for instance in entries
        .iter()
        .filter_map(|e| DepartureInstance::from_entry(e, now_minutes))
    {
        match by_id.entry(instance.unique_id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(instance);
            }
            Entry::Occupied(mut slot) => {
                if instance.closer_than(slot.get()) {
                    slot.insert(instance);
                }
            }
        }
    }

    let mut ranked: Vec<DepartureInstance> = by_id.into_values().collect();
    ranked.sort_by(|a, b| {
        a.diff
            .cmp(&b.diff)
            .then(a.weekday.cmp(&b.weekday))
            .then(a.time.cmp(&b.time))
    });
    ranked
}

/// Cut the display window out of a ranked list.
///
/// Starts at the first departure not yet gone and takes at most `max`.
/// When every departure is in the past, the last `max` are returned instead.
pub fn upcoming_window(ranked: &[DepartureInstance], max: usize) -> &[DepartureInstance] {
    match ranked.iter().position(|i| i.diff >= 0) {
        Some(first) => {
            let end = ranked.len().min(first.saturating_add(max));
            &ranked[first..end]
        }
        None => &ranked[ranked.len().saturating_sub(max)..],
    }
}

/// Produce the bounded, ordered departure list for a stop.
///
/// # Examples
///
/// ```
/// use ferry_board::departures::{DepartureEntry, process_departures};
/// use ferry_board::domain::{DayOffset, WeekdayIndex};
/// use chrono::NaiveTime;
///
/// let monday = WeekdayIndex::new(1).unwrap();
/// let entries = vec![
///     DepartureEntry::new("07:00", monday, DayOffset::Today),
///     DepartureEntry::new("07:30", monday, DayOffset::Today),
/// ];
/// let now = NaiveTime::from_hms_opt(7, 10, 0).unwrap();
///
/// let board = process_departures(&entries, now, 5);
/// assert_eq!(board.len(), 1);
/// assert_eq!(board[0].time, "07:30");
/// ```
pub fn process_departures(
    entries: &[DepartureEntry],
    now: NaiveTime,
    max: usize,
) -> Vec<Departure> {
    let ranked = rank_departures(entries, now);
    upcoming_window(&ranked, max)
        .iter()
        .map(Departure::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wd(i: u8) -> WeekdayIndex {
        WeekdayIndex::new(i).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn today(times: &[&str], weekday: u8) -> Vec<DepartureEntry> {
        times
            .iter()
            .map(|t| DepartureEntry::new(*t, wd(weekday), DayOffset::Today))
            .collect()
    }

    fn tomorrow(times: &[&str], weekday: u8) -> Vec<DepartureEntry> {
        times
            .iter()
            .map(|t| DepartureEntry::new(*t, wd(weekday), DayOffset::Tomorrow))
            .collect()
    }

    fn dep(time: &str, is_today: bool) -> Departure {
        Departure {
            time: time.to_string(),
            is_today,
        }
    }

    #[test]
    fn merges_across_midnight() {
        // Monday today, Tuesday tomorrow, now 07:10
        let mut entries = today(&["07:00", "07:30", "08:00"], 1);
        entries.extend(tomorrow(&["07:00", "07:15"], 2));

        let board = process_departures(&entries, at(7, 10), 3);
        assert_eq!(
            board,
            vec![dep("07:30", true), dep("08:00", true), dep("07:00", false)]
        );
    }

    #[test]
    fn all_past_returns_last_entries() {
        let entries = today(&["06:00", "06:30", "07:00", "07:30"], 3);
        let board = process_departures(&entries, at(23, 0), 2);
        assert_eq!(board, vec![dep("07:00", true), dep("07:30", true)]);
    }

    #[test]
    fn all_past_shorter_than_max() {
        let entries = today(&["06:00"], 3);
        let board = process_departures(&entries, at(23, 0), 5);
        assert_eq!(board, vec![dep("06:00", true)]);
    }

    #[test]
    fn departure_at_now_is_upcoming() {
        let entries = today(&["07:00", "07:10"], 1);
        let board = process_departures(&entries, at(7, 10), 5);
        assert_eq!(board, vec![dep("07:10", true)]);
    }

    #[test]
    fn max_zero_is_empty() {
        let entries = today(&["07:00", "08:00"], 1);
        assert!(process_departures(&entries, at(7, 30), 0).is_empty());
        assert!(process_departures(&entries, at(23, 30), 0).is_empty());
    }

    #[test]
    fn unbounded_max_returns_every_upcoming() {
        let entries = today(&["07:00", "08:00", "09:00"], 1);
        let board = process_departures(&entries, at(7, 30), usize::MAX);
        assert_eq!(board, vec![dep("08:00", true), dep("09:00", true)]);
    }

    #[test]
    fn empty_input() {
        assert!(process_departures(&[], at(12, 0), 5).is_empty());
    }

    #[test]
    fn malformed_times_are_skipped() {
        let entries = today(&["07:30", "7:45", "garbage", "25:00", "08:00"], 1);
        let board = process_departures(&entries, at(7, 0), 10);
        assert_eq!(board, vec![dep("07:30", true), dep("08:00", true)]);
    }

    #[test]
    fn identical_entries_collapse() {
        let entries = today(&["09:00", "09:00", "09:00"], 5);
        let ranked = rank_departures(&entries, at(8, 0));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].unique_id, "5|09:00");
        assert_eq!(ranked[0].diff, 60);
    }

    #[test]
    fn collision_keeps_entry_closest_to_now() {
        // Same weekday reported for both days: the id collides.
        let mut entries = today(&["07:00"], 1);
        entries.extend(tomorrow(&["07:00"], 1));

        // At 06:00 today's is 60 min away, tomorrow's 1500
        let ranked = rank_departures(&entries, at(6, 0));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].day_offset, DayOffset::Today);

        // At 20:00 today's is -780, tomorrow's +660
        let ranked = rank_departures(&entries, at(20, 0));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].day_offset, DayOffset::Tomorrow);
    }

    #[test]
    fn equal_distance_collision_prefers_upcoming() {
        let mut entries = today(&["00:00"], 1);
        entries.extend(tomorrow(&["00:00"], 1));

        // At 12:00 both are exactly 720 minutes away
        let ranked = rank_departures(&entries, at(12, 0));
        assert_eq!(ranked.len(), 1);
        assert!(!ranked[0].is_past);
        assert_eq!(ranked[0].day_offset, DayOffset::Tomorrow);
    }

    #[test]
    fn instance_fields() {
        let entries = tomorrow(&["01:15"], 2);
        let ranked = rank_departures(&entries, at(23, 45));
        let i = &ranked[0];
        assert_eq!(i.total_order_minutes, 1440 + 75);
        assert_eq!(i.diff, 1440 + 75 - (23 * 60 + 45));
        assert!(!i.is_past);
        assert_eq!(i.unique_id, "2|01:15");
    }

    #[test]
    fn seconds_of_now_are_ignored() {
        let entries = today(&["07:10"], 1);
        let now = NaiveTime::from_hms_opt(7, 10, 45).unwrap();
        assert_eq!(process_departures(&entries, now, 1), vec![dep("07:10", true)]);
    }

    #[test]
    fn window_drops_from_front_as_time_advances() {
        let mut entries = today(&["07:00", "07:30", "08:00", "08:30"], 1);
        entries.extend(tomorrow(&["06:00"], 2));

        let early = process_departures(&entries, at(6, 50), 10);
        let later = process_departures(&entries, at(7, 40), 10);

        // The later board is a suffix of the earlier one
        assert!(early.ends_with(&later));
        assert_eq!(early.len() - later.len(), 2);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn time_string() -> impl Strategy<Value = String> {
        prop_oneof![
            9 => (0u32..24, 0u32..60).prop_map(|(h, m)| format!("{h:02}:{m:02}")),
            1 => "[0-9:a-z]{0,6}",
        ]
    }

    /// Entries for a today/tomorrow pair of consecutive weekdays.
    fn entries() -> impl Strategy<Value = Vec<DepartureEntry>> {
        (
            1u8..=7,
            prop::collection::vec((time_string(), any::<bool>()), 0..40),
        )
            .prop_map(|(today, raw)| {
                let tomorrow = today % 7 + 1;
                raw.into_iter()
                    .map(|(time, is_today)| {
                        let (weekday, offset) = if is_today {
                            (today, DayOffset::Today)
                        } else {
                            (tomorrow, DayOffset::Tomorrow)
                        };
                        DepartureEntry::new(time, WeekdayIndex::new(weekday).unwrap(), offset)
                    })
                    .collect()
            })
    }

    fn now() -> impl Strategy<Value = NaiveTime> {
        (0u32..24, 0u32..60).prop_map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    proptest! {
        #[test]
        fn window_is_bounded_unique_and_sorted(
            entries in entries(),
            now in now(),
            max in 0usize..12,
        ) {
            let ranked = rank_departures(&entries, now);
            let window = upcoming_window(&ranked, max);

            prop_assert!(window.len() <= max);

            let ids: HashSet<_> = window.iter().map(|i| &i.unique_id).collect();
            prop_assert_eq!(ids.len(), window.len());

            for pair in window.windows(2) {
                prop_assert!(pair[0].diff <= pair[1].diff);
            }
        }

        #[test]
        fn no_past_entry_once_a_future_one_exists(
            entries in entries(),
            now in now(),
            max in 1usize..12,
        ) {
            let now_minutes = minutes_since_midnight(now);
            let any_future = entries.iter().any(|e| {
                DepartureTime::parse_hhmm(&e.time).is_ok_and(|t| {
                    e.day_offset.days() * MINUTES_PER_DAY + t.minutes_since_midnight() >= now_minutes
                })
            });

            let ranked = rank_departures(&entries, now);
            let window = upcoming_window(&ranked, max);

            if any_future {
                prop_assert!(!window.is_empty());
                prop_assert!(window.iter().all(|i| i.diff >= 0));
            }
        }

        #[test]
        fn processing_is_idempotent(
            entries in entries(),
            now in now(),
            max in 0usize..12,
        ) {
            prop_assert_eq!(
                process_departures(&entries, now, max),
                process_departures(&entries, now, max)
            );
        }
    }
}
