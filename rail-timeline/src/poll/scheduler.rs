//! Periodic refresh scheduling.
//!
//! All refresh intervals are registered with one [`Scheduler`], which is
//! asked which tasks are due at a given instant. It never reads the clock
//! itself, so driving it from a [`FakeClock`](super::FakeClock) is fully
//! deterministic.

use std::fmt;
use std::time::Duration as StdDuration;

use chrono::Duration;

use crate::config::PollConfig;
use crate::domain::Timestamp;

/// Intervals shorter than this are raised to it.
const MIN_INTERVAL: StdDuration = StdDuration::from_secs(1);

/// A recurring refresh job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollTask {
    /// Station/train schedule refresh
    Schedule,
    /// "Now" tick for relative labels
    ClockTick,
    /// Station metadata refresh
    StationMetadata,
    /// Caches dropped, everything refetched
    FullRefresh,
}

impl PollTask {
    pub fn as_str(self) -> &'static str {
        match self {
            PollTask::Schedule => "schedule",
            PollTask::ClockTick => "clock-tick",
            PollTask::StationMetadata => "station-metadata",
            PollTask::FullRefresh => "full-refresh",
        }
    }
}

impl fmt::Display for PollTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
struct Entry {
    task: PollTask,
    interval: StdDuration,
    next_due: Timestamp,
}

/// Interval scheduler for [`PollTask`]s.
#[derive(Debug, Clone)]
pub struct Scheduler {
    start: Timestamp,
    entries: Vec<Entry>,
}

impl Scheduler {
    /// Empty scheduler anchored at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            start,
            entries: Vec::new(),
        }
    }

    /// Scheduler with the four standard tasks at the configured intervals.
    pub fn from_config(config: &PollConfig, start: Timestamp) -> Self {
        let mut scheduler = Self::new(start);
        scheduler.register(PollTask::Schedule, config.schedule);
        scheduler.register(PollTask::ClockTick, config.clock_tick);
        scheduler.register(PollTask::StationMetadata, config.station_metadata);
        scheduler.register(PollTask::FullRefresh, config.full_refresh);
        scheduler
    }

    /// Register `task` to run every `interval`, first one interval after
    /// the scheduler's start. Re-registering replaces the interval.
    pub fn register(&mut self, task: PollTask, interval: StdDuration) {
        let interval = interval.max(MIN_INTERVAL);
        let next_due = self.start + to_chrono(interval);

        match self.entries.iter_mut().find(|e| e.task == task) {
            Some(entry) => {
                entry.interval = interval;
                entry.next_due = next_due;
            }
            None => self.entries.push(Entry {
                task,
                interval,
                next_due,
            }),
        }
    }

    pub fn interval(&self, task: PollTask) -> Option<StdDuration> {
        self.entries
            .iter()
            .find(|e| e.task == task)
            .map(|e| e.interval)
    }

    /// Tasks due at `now`, in registration order. Each due task is
    /// rescheduled past `now`; missed runs collapse into one.
    pub fn due(&mut self, now: Timestamp) -> Vec<PollTask> {
        let mut due = Vec::new();
        for entry in &mut self.entries {
            if entry.next_due > now {
                continue;
            }
            let step = to_chrono(entry.interval);
            while entry.next_due <= now {
                entry.next_due += step;
            }
            due.push(entry.task);
        }
        due
    }

    /// Earliest upcoming run.
    pub fn next_due(&self) -> Option<Timestamp> {
        self.entries.iter().map(|e| e.next_due).min()
    }

    /// Coarsest tick that still lands on every task's schedule: the
    /// greatest common divisor of the registered intervals.
    pub fn tick_interval(&self) -> Option<StdDuration> {
        self.entries
            .iter()
            .map(|e| e.interval.as_millis())
            .reduce(gcd)
            .map(|ms| StdDuration::from_millis(ms as u64))
    }
}

fn gcd(a: u128, b: u128) -> u128 {
    if b == 0 { a } else { gcd(b, a % b) }
}

fn to_chrono(d: StdDuration) -> Duration {
    Duration::from_std(d).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn start() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn default_intervals() {
        let scheduler = Scheduler::from_config(&PollConfig::default(), start());

        assert_eq!(scheduler.interval(PollTask::Schedule), Some(StdDuration::from_secs(60)));
        assert_eq!(scheduler.interval(PollTask::ClockTick), Some(StdDuration::from_secs(30)));
        assert_eq!(scheduler.interval(PollTask::StationMetadata), Some(StdDuration::from_secs(600)));
        assert_eq!(scheduler.interval(PollTask::FullRefresh), Some(StdDuration::from_secs(2400)));
        assert_eq!(scheduler.tick_interval(), Some(StdDuration::from_secs(30)));
        assert_eq!(scheduler.next_due(), Some(start() + Duration::seconds(30)));
    }

    #[test]
    fn due_tasks_over_ten_minutes() {
        let mut scheduler = Scheduler::from_config(&PollConfig::default(), start());
        assert!(scheduler.due(start()).is_empty());

        assert_eq!(scheduler.due(start() + Duration::seconds(30)), vec![PollTask::ClockTick]);
        assert_eq!(
            scheduler.due(start() + Duration::seconds(60)),
            vec![PollTask::Schedule, PollTask::ClockTick]
        );
        // Already handled
        assert!(scheduler.due(start() + Duration::seconds(60)).is_empty());

        let mut schedule_runs = 1;
        let mut metadata_runs = 0;
        for tick in 3..=20 {
            let due = scheduler.due(start() + Duration::seconds(30 * tick));
            schedule_runs += due.iter().filter(|t| **t == PollTask::Schedule).count();
            metadata_runs += due.iter().filter(|t| **t == PollTask::StationMetadata).count();
            assert!(!due.contains(&PollTask::FullRefresh));
        }
        assert_eq!(schedule_runs, 10);
        assert_eq!(metadata_runs, 1);
    }

    #[test]
    fn missed_runs_collapse() {
        let mut scheduler = Scheduler::new(start());
        scheduler.register(PollTask::Schedule, StdDuration::from_secs(60));

        assert_eq!(scheduler.due(start() + Duration::minutes(5)), vec![PollTask::Schedule]);
        assert_eq!(scheduler.next_due(), Some(start() + Duration::minutes(6)));
    }

    #[test]
    fn re_register_replaces() {
        let mut scheduler = Scheduler::new(start());
        scheduler.register(PollTask::Schedule, StdDuration::from_secs(60));
        scheduler.register(PollTask::Schedule, StdDuration::from_secs(20));
        scheduler.register(PollTask::ClockTick, StdDuration::ZERO);

        assert_eq!(scheduler.interval(PollTask::Schedule), Some(StdDuration::from_secs(20)));
        assert_eq!(scheduler.interval(PollTask::ClockTick), Some(StdDuration::from_secs(1)));
        assert_eq!(scheduler.tick_interval(), Some(StdDuration::from_secs(1)));
    }

    #[test]
    fn empty_scheduler() {
        let mut scheduler = Scheduler::new(start());
        assert_eq!(scheduler.next_due(), None);
        assert_eq!(scheduler.tick_interval(), None);
        assert!(scheduler.due(start() + Duration::days(1)).is_empty());
    }
}
