//! Disembark-only departure normalization.
//!
//! Timetable documents describe disembark-only departures in several
//! shapes: flat per stop, nested by day type, nested by direction, or
//! nested by time-of-day period (and combinations of these). This module
//! reduces every shape to one map of stop → times, once, when a document
//! is loaded.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::domain::DayType;

use super::timetable::Direction;

/// Disembark-only data exactly as it appears in a document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawDisembark {
    Times(Vec<String>),
    Nested(BTreeMap<String, RawDisembark>),
}

/// Canonical disembark-only data: stop → sorted, deduplicated times.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisembarkOnly(BTreeMap<String, Vec<String>>);

impl DisembarkOnly {
    pub fn contains(&self, stop: &str, time: &str) -> bool {
        self.0
            .get(stop)
            .is_some_and(|times| times.binary_search_by(|t| t.as_str().cmp(time)).is_ok())
    }

    pub fn times(&self, stop: &str) -> &[String] {
        self.0.get(stop).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn stops(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// What a document is being read for.
#[derive(Debug, Clone, Copy)]
struct Selector {
    day_type: DayType,
    direction: Option<Direction>,
}

/// How the keys of one nesting level are interpreted.
enum Level {
    DayType,
    Direction,
    Period,
    Stop,
}

fn day_type_matches(key: &str, day_type: DayType) -> Option<bool> {
    let matches = match key {
        "weekday" | "weekdays" => day_type == DayType::Weekday,
        "saturday" => day_type == DayType::Saturday,
        "sunday" => day_type == DayType::Sunday,
        "weekend" => day_type != DayType::Weekday,
        _ => return None,
    };
    Some(matches)
}

fn direction_of(key: &str) -> Option<Direction> {
    match key {
        "to_city" => Some(Direction::ToCity),
        "from_city" => Some(Direction::FromCity),
        _ => None,
    }
}

fn is_period(key: &str) -> bool {
    matches!(key, "morning" | "afternoon" | "evening" | "night")
}

fn classify(map: &BTreeMap<String, RawDisembark>) -> Level {
    let keys = || map.keys().map(String::as_str);
    if keys().any(|k| day_type_matches(k, DayType::Weekday).is_some()) {
        Level::DayType
    } else if keys().any(|k| direction_of(k).is_some()) {
        Level::Direction
    } else if keys().any(is_period) {
        Level::Period
    } else {
        Level::Stop
    }
}

/// Branches of a selector level that apply, or `None` for a stop level.
fn select<'a>(
    map: &'a BTreeMap<String, RawDisembark>,
    sel: Selector,
) -> Option<Vec<&'a RawDisembark>> {
    let branches = match classify(map) {
        Level::Stop => return None,
        Level::DayType => map
            .iter()
            .filter(|(k, _)| day_type_matches(k, sel.day_type) == Some(true))
            .map(|(_, v)| v)
            .collect(),
        Level::Direction => map
            .iter()
            .filter(|(k, _)| match (direction_of(k), sel.direction) {
                (Some(d), Some(wanted)) => d == wanted,
                (Some(_), None) => true,
                (None, _) => false,
            })
            .map(|(_, v)| v)
            .collect(),
        Level::Period => map.values().collect(),
    };
    Some(branches)
}

fn collect(node: &RawDisembark, sel: Selector, out: &mut BTreeMap<String, Vec<String>>) {
    let RawDisembark::Nested(map) = node else {
        // A bare list has no stop to attach to
        return;
    };

    match select(map, sel) {
        Some(branches) => {
            for branch in branches {
                collect(branch, sel, out);
            }
        }
        None => {
            for (stop, child) in map {
                let times = out.entry(stop.clone()).or_default();
                flatten(child, sel, times);
            }
        }
    }
}

fn flatten(node: &RawDisembark, sel: Selector, out: &mut Vec<String>) {
    match node {
        RawDisembark::Times(times) => out.extend(times.iter().cloned()),
        RawDisembark::Nested(map) => match select(map, sel) {
            Some(branches) => branches.into_iter().for_each(|b| flatten(b, sel, out)),
            None => map.values().for_each(|b| flatten(b, sel, out)),
        },
    }
}

/// Reduce raw disembark-only data to the canonical shape for one day type
/// and, for bidirectional lines, one direction.
pub fn normalize(
    raw: Option<&RawDisembark>,
    day_type: DayType,
    direction: Option<Direction>,
) -> DisembarkOnly {
    let Some(raw) = raw else {
        return DisembarkOnly::default();
    };

    let mut out = BTreeMap::new();
    collect(raw, Selector { day_type, direction }, &mut out);

    out.retain(|_, times| !times.is_empty());
    for times in out.values_mut() {
        times.sort();
        times.dedup();
    }

    DisembarkOnly(out)
}
