//! Periodic refresh tasks.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::offline::{CacheStorage, Fetcher};

use super::BoardController;

/// How often each periodic task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerIntervals {
    /// Recompute the display from loaded data.
    pub display: Duration,
    /// Reload every line's documents.
    pub data: Duration,
    /// Check whether the date changed.
    pub rollover: Duration,
    /// Compare the running version with the deployed one.
    pub version: Duration,
}

impl Default for TimerIntervals {
    fn default() -> Self {
        Self {
            display: Duration::from_secs(30),
            data: Duration::from_secs(15 * 60),
            rollover: Duration::from_secs(60),
            version: Duration::from_secs(60 * 60),
        }
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// The four refresh tasks, started and stopped together.
#[derive(Default)]
pub struct TimerGroup {
    handles: Vec<JoinHandle<()>>,
}

impl TimerGroup {
    /// Spawn all tasks. The first run of each happens one period from now.
    pub fn start<F, S>(controller: Arc<BoardController<F, S>>, intervals: TimerIntervals) -> Self
    where
        F: Fetcher + 'static,
        S: CacheStorage + 'static,
    {
        let mut handles = Vec::with_capacity(4);

        let c = Arc::clone(&controller);
        handles.push(tokio::spawn(async move {
            let mut interval = ticker(intervals.display);
            interval.tick().await;
            loop {
                interval.tick().await;
                c.refresh_display(Local::now().naive_local()).await;
            }
        }));

        let c = Arc::clone(&controller);
        handles.push(tokio::spawn(async move {
            let mut interval = ticker(intervals.data);
            interval.tick().await;
            loop {
                interval.tick().await;
                debug!("scheduled data refresh");
                c.refresh_data(Local::now().naive_local()).await;
            }
        }));

        let c = Arc::clone(&controller);
        handles.push(tokio::spawn(async move {
            let mut interval = ticker(intervals.rollover);
            interval.tick().await;
            loop {
                interval.tick().await;
                if c.check_rollover(Local::now().naive_local()).await {
                    info!("date rolled over, data reloaded");
                }
            }
        }));

        let c = controller;
        handles.push(tokio::spawn(async move {
            let mut interval = ticker(intervals.version);
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(e) = c.coordinator().check_version().await {
                    warn!(error = %e, "version check failed");
                }
            }
        }));

        info!(?intervals, "timers started");
        Self { handles }
    }

    /// Stop every task.
    pub fn cancel(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }

    /// Stop every task and start a fresh set.
    pub fn restart<F, S>(&mut self, controller: Arc<BoardController<F, S>>, intervals: TimerIntervals)
    where
        F: Fetcher + 'static,
        S: CacheStorage + 'static,
    {
        self.cancel();
        *self = Self::start(controller, intervals);
    }

    pub fn is_running(&self) -> bool {
        !self.handles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Drop for TimerGroup {
    fn drop(&mut self) {
        self.cancel();
    }
}
