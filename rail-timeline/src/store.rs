//! Shared schedule state with change notification.
//!
//! The store owns every cache the reconciliation layer reads from: train
//! timelines, route summaries, live positions and the station table.
//! Writes are append/update only and last-write-wins; nothing expires
//! within a session. Every change is published on a broadcast channel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use crate::config::FreshnessConfig;
use crate::domain::{LivePosition, RouteInfo, Timestamp, TrainKey};
use crate::stations::StationTable;
use crate::timeline::Timeline;
use crate::tracker::PositionTracker;

/// Broadcast channel capacity. Subscribers that lag re-read the store.
const EVENT_CAPACITY: usize = 64;

/// A change to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    TimelineUpdated(TrainKey),
    RouteUpdated(TrainKey),
    PositionsUpdated { changed: usize },
    StationsUpdated { count: usize },
}

/// Sender for store change notifications.
pub type StoreEventSender = broadcast::Sender<StoreEvent>;

#[derive(Debug, Default)]
struct StoreState {
    /// Timeline plus its insertion sequence number
    timelines: HashMap<TrainKey, (u64, Arc<Timeline>)>,
    next_seq: u64,
    routes: HashMap<TrainKey, RouteInfo>,
    positions: PositionTracker,
    stations: Arc<StationTable>,
}

impl StoreState {
    /// Route upsert: a resolved route replaces whatever is there, a
    /// pending one only fills a gap.
    fn put_route(&mut self, key: &TrainKey, route: RouteInfo) -> bool {
        match self.routes.get(key) {
            Some(existing) if !route.resolved || *existing == route => false,
            _ => {
                self.routes.insert(key.clone(), route);
                true
            }
        }
    }
}

/// Read-only view of the store for one query.
pub struct StoreView<'a> {
    /// Timelines in insertion order
    pub timelines: Vec<&'a Timeline>,
    pub routes: &'a HashMap<TrainKey, RouteInfo>,
    pub positions: &'a PositionTracker,
    pub stations: &'a StationTable,
}

/// Injected store for schedule state.
pub struct ScheduleStore {
    state: RwLock<StoreState>,
    events: StoreEventSender,
}

impl ScheduleStore {
    pub fn new(freshness: FreshnessConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: RwLock::new(StoreState {
                positions: PositionTracker::new(freshness),
                ..Default::default()
            }),
            events,
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: StoreEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Insert or replace timelines. A replaced timeline keeps its original
    /// insertion position. Each train's route is recorded too: pending on
    /// first sight, then the timeline's resolved route.
    pub async fn upsert_timelines(&self, timelines: impl IntoIterator<Item = Timeline>) -> usize {
        let mut events = Vec::new();
        {
            let mut state = self.state.write().await;
            for timeline in timelines {
                let key = timeline.train.clone();

                let seq = match state.timelines.get(&key) {
                    Some((_, existing)) if existing.as_ref() == &timeline => {
                        debug!(train = %key, "Timeline unchanged");
                        continue;
                    }
                    Some((seq, _)) => *seq,
                    None => {
                        state.next_seq += 1;
                        state.next_seq
                    }
                };

                let route = timeline.route.clone();
                state.timelines.insert(key.clone(), (seq, Arc::new(timeline)));
                events.push(StoreEvent::TimelineUpdated(key.clone()));

                state.put_route(&key, RouteInfo::pending());
                if state.put_route(&key, route) {
                    events.push(StoreEvent::RouteUpdated(key));
                }
            }
        }

        let count = events
            .iter()
            .filter(|e| matches!(e, StoreEvent::TimelineUpdated(_)))
            .count();
        for event in events {
            self.publish(event);
        }
        count
    }

    /// Record a route. Returns true if the stored route changed.
    pub async fn upsert_route(&self, key: &TrainKey, route: RouteInfo) -> bool {
        let changed = self.state.write().await.put_route(key, route);
        if changed {
            self.publish(StoreEvent::RouteUpdated(key.clone()));
        }
        changed
    }

    /// Merge a live position snapshot and drop stale reports.
    pub async fn update_positions(&self, snapshot: Vec<LivePosition>, now: Timestamp) -> usize {
        let changed = {
            let mut state = self.state.write().await;
            let changed = state.positions.update(snapshot);
            let pruned = state.positions.prune(now);
            if pruned > 0 {
                debug!(pruned, "Dropped stale positions");
            }
            changed
        };
        self.publish(StoreEvent::PositionsUpdated { changed });
        changed
    }

    /// Replace the station table.
    pub async fn set_stations(&self, stations: StationTable) {
        let count = stations.len();
        self.state.write().await.stations = Arc::new(stations);
        self.publish(StoreEvent::StationsUpdated { count });
    }

    pub async fn stations(&self) -> Arc<StationTable> {
        self.state.read().await.stations.clone()
    }

    /// Timeline for a train, by key or by either identifier.
    pub async fn timeline(&self, id: &str) -> Option<Arc<Timeline>> {
        let state = self.state.read().await;
        if let Some((_, timeline)) = state.timelines.get(&TrainKey::new(id)) {
            return Some(timeline.clone());
        }
        state
            .timelines
            .values()
            .filter(|(_, t)| t.matches(id))
            .min_by_key(|(seq, _)| *seq)
            .map(|(_, t)| t.clone())
    }

    pub async fn route(&self, key: &TrainKey) -> Option<RouteInfo> {
        self.state.read().await.routes.get(key).cloned()
    }

    /// Number of stored timelines.
    pub async fn len(&self) -> usize {
        self.state.read().await.timelines.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.timelines.is_empty()
    }

    /// Run `f` against a consistent view of the store.
    pub async fn with_view<R>(&self, f: impl FnOnce(&StoreView<'_>) -> R) -> R {
        let state = self.state.read().await;

        let mut ordered: Vec<_> = state.timelines.values().collect();
        ordered.sort_by_key(|(seq, _)| *seq);

        let view = StoreView {
            timelines: ordered.into_iter().map(|(_, t)| t.as_ref()).collect(),
            routes: &state.routes,
            positions: &state.positions,
            stations: &state.stations,
        };
        f(&view)
    }
}

impl Default for ScheduleStore {
    fn default() -> Self {
        Self::new(FreshnessConfig::default())
    }
}
