//! Ferry departure board server.
//!
//! Resolves which published timetable applies to each line on a date,
//! turns today's and tomorrow's timetables into a bounded list of upcoming
//! departures per stop, and keeps working offline by routing every resource
//! request through a versioned cache coordinator.

pub mod config;
pub mod controller;
pub mod departures;
pub mod domain;
pub mod offline;
pub mod schedule;
pub mod web;
