//! In-memory feed for testing and offline development.
//!
//! Serves fixed announcements, positions and stations as if they came from
//! the live feed. Data can be loaded from a directory of JSON files in the
//! feed's own response format.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::domain::{Activity, LivePosition, RawAnnouncement, Signature};
use crate::stations::{StationRecord, StationSource};

use super::AnnouncementSource;
use super::decode::{StationStops, decode_announcements, decode_positions, decode_stations};
use super::error::FeedError;
use super::query::AnnouncementFilter;
use super::types::{FeedResponse, many};

#[derive(Default)]
struct MockState {
    announcements: Vec<RawAnnouncement>,
    station_stops: HashMap<Signature, StationStops>,
    positions: Vec<LivePosition>,
    stations: Vec<StationRecord>,
    /// Scripted outcomes for upcoming fetches; `None` lets one through
    failures: VecDeque<Option<FeedError>>,
    calls: usize,
}

/// Mock feed that serves canned data.
///
/// Station stops not registered explicitly are derived from the
/// announcement list by location and activity.
#[derive(Clone, Default)]
pub struct MockFeed {
    state: Arc<Mutex<MockState>>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_announcements(self, announcements: Vec<RawAnnouncement>) -> Self {
        self.set_announcements(announcements);
        self
    }

    pub fn with_station_stops(self, station: Signature, stops: StationStops) -> Self {
        self.lock().station_stops.insert(station, stops);
        self
    }

    pub fn with_positions(self, positions: Vec<LivePosition>) -> Self {
        self.set_positions(positions);
        self
    }

    pub fn with_stations(self, stations: Vec<StationRecord>) -> Self {
        self.lock().stations = stations;
        self
    }

    /// Replace the served announcements.
    pub fn set_announcements(&self, announcements: Vec<RawAnnouncement>) {
        self.lock().announcements = announcements;
    }

    /// Replace the served positions.
    pub fn set_positions(&self, positions: Vec<LivePosition>) {
        self.lock().positions = positions;
    }

    /// Make the next fetch (of any kind) fail with `error`.
    pub fn fail_next(&self, error: FeedError) {
        self.lock().failures.push_back(Some(error));
    }

    /// Let the next fetch through before any queued failure applies.
    pub fn succeed_next(&self) {
        self.lock().failures.push_back(None);
    }

    /// Number of fetches served so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    /// Load mock data from a directory.
    ///
    /// Recognised files, each in the feed's JSON response format:
    /// `announcements.json`, `positions.json` and `stations.json`.
    /// Missing files leave that kind of data empty.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, FeedError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(FeedError::NotConfigured(format!(
                "mock data directory {dir:?} does not exist"
            )));
        }

        let mut state = MockState::default();
        if let Some(response) = read_response(&dir.join("announcements.json"))? {
            let dtos: Vec<_> = response
                .into_results()
                .into_iter()
                .flat_map(|r| many(r.train_announcement))
                .collect();
            state.announcements = decode_announcements(&dtos, None);
        }
        if let Some(response) = read_response(&dir.join("positions.json"))? {
            let dtos: Vec<_> = response
                .into_results()
                .into_iter()
                .flat_map(|r| many(r.train_position))
                .collect();
            state.positions = decode_positions(&dtos);
        }
        if let Some(response) = read_response(&dir.join("stations.json"))? {
            let dtos: Vec<_> = response
                .into_results()
                .into_iter()
                .flat_map(|r| many(r.train_station))
                .collect();
            state.stations = decode_stations(&dtos);
        }

        Ok(Self {
            state: Arc::new(Mutex::new(state)),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A panic while holding the lock only happens in a failing test
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Count a call and pop a queued failure, if any.
    fn begin(&self) -> Result<std::sync::MutexGuard<'_, MockState>, FeedError> {
        let mut state = self.lock();
        state.calls += 1;
        match state.failures.pop_front() {
            Some(Some(err)) => Err(err),
            _ => Ok(state),
        }
    }
}

fn read_response(path: &Path) -> Result<Option<FeedResponse>, FeedError> {
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(path).map_err(|e| FeedError::NotConfigured(format!(
        "failed to read {path:?}: {e}"
    )))?;
    serde_json::from_str(&json)
        .map(Some)
        .map_err(|e| FeedError::Json {
            message: format!("{path:?}: {e}"),
            body: None,
        })
}

impl AnnouncementSource for MockFeed {
    async fn fetch_announcements(&self, filter: &AnnouncementFilter) -> Result<Vec<RawAnnouncement>, FeedError> {
        let state = self.begin()?;
        Ok(state
            .announcements
            .iter()
            .filter(|a| {
                filter.trains.iter().any(|t| {
                    t.advertised.as_deref().is_some_and(|id| a.train.matches(id))
                        || t.operational.as_deref().is_some_and(|id| a.train.matches(id))
                })
            })
            .cloned()
            .collect())
    }

    async fn fetch_station_stops(&self, station: &Signature) -> Result<StationStops, FeedError> {
        let state = self.begin()?;
        if let Some(stops) = state.station_stops.get(station) {
            return Ok(stops.clone());
        }

        let mut stops = StationStops::default();
        for ann in state.announcements.iter().filter(|a| a.location.as_ref() == Some(station)) {
            match ann.activity {
                Activity::Departure => stops.departures.push(ann.clone()),
                Activity::Arrival | Activity::Unknown => stops.arrivals.push(ann.clone()),
            }
        }
        Ok(stops)
    }

    async fn fetch_live_positions(&self) -> Result<Vec<LivePosition>, FeedError> {
        Ok(self.begin()?.positions.clone())
    }
}

impl StationSource for MockFeed {
    async fn fetch_stations(&self) -> Result<Vec<StationRecord>, FeedError> {
        Ok(self.begin()?.stations.clone())
    }
}
