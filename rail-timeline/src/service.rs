//! Facade over the reconciliation layer.
//!
//! [`ScheduleService`] ties a feed source to a [`ScheduleStore`]: refresh
//! operations fetch, normalize and commit; read operations derive display
//! records from whatever the store holds. A failed fetch leaves the store
//! as it was.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ReconcileConfig;
use crate::domain::{DomainError, InvalidSignature, RawAnnouncement, RouteInfo, Signature, Timestamp, TrainIdent, TrainKey};
use crate::feed::{AnnouncementFilter, AnnouncementSource, FeedError, StationStops};
use crate::poll::{Clock, QueryKey, RequestRegistry, Superseded, SystemClock};
use crate::schedule::{Aggregator, ScheduleInputs, StationSchedule, TrainItinerary};
use crate::stations::{StationDirectory, StationError, StationSource};
use crate::store::{ScheduleStore, StoreView};
use crate::timeline::{Timeline, UntypedPolicy, build_timelines};

/// Errors from schedule operations.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// A train was named by neither an advertised nor an operational id
    #[error("train has no advertised or operational identifier")]
    MissingIdentifier,

    #[error("feed request failed: {0}")]
    Fetch(#[from] FeedError),

    #[error("station lookup failed: {0}")]
    Stations(#[from] StationError),

    /// Superseded by a newer request for the same query
    #[error("request cancelled")]
    Cancelled,

    #[error("unknown train: {0}")]
    UnknownTrain(String),

    #[error("invalid station: {0}")]
    InvalidStation(#[from] InvalidSignature),
}

impl From<Superseded> for ScheduleError {
    fn from(_: Superseded) -> Self {
        ScheduleError::Cancelled
    }
}

impl From<DomainError> for ScheduleError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::MissingIdentifier => ScheduleError::MissingIdentifier,
            DomainError::InvalidSignature(e) => ScheduleError::InvalidStation(e),
        }
    }
}

/// Schedule reads and refreshes against one feed source.
pub struct ScheduleService<S> {
    source: Arc<S>,
    store: Arc<ScheduleStore>,
    directory: StationDirectory,
    aggregator: Aggregator,
    requests: RequestRegistry,
    clock: Arc<dyn Clock>,
    config: ReconcileConfig,
}

impl<S> ScheduleService<S>
where
    S: AnnouncementSource + StationSource + 'static,
{
    pub fn new(source: S, config: ReconcileConfig) -> Self {
        Self {
            source: Arc::new(source),
            store: Arc::new(ScheduleStore::new(config.freshness.clone())),
            directory: StationDirectory::new(),
            aggregator: Aggregator::new(&config),
            requests: RequestRegistry::new(),
            clock: Arc::new(SystemClock),
            config,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Share a store with other services or subscribers.
    pub fn with_store(mut self, store: Arc<ScheduleStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_directory(mut self, directory: StationDirectory) -> Self {
        self.directory = directory;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &Arc<ScheduleStore> {
        &self.store
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    // Reads

    /// Stored timeline for a train, by key or either identifier.
    pub async fn get_timeline(&self, train_id: &str) -> Option<Arc<Timeline>> {
        self.store.timeline(train_id).await
    }

    /// Route summary for a train. `None` until the train has been seen.
    pub async fn get_route(&self, train_id: &str) -> Option<RouteInfo> {
        if let Some(route) = self.store.route(&TrainKey::new(train_id)).await {
            return Some(route);
        }
        let timeline = self.store.timeline(train_id).await?;
        self.store.route(&timeline.train).await
    }

    /// Arrivals and departures at `station` around `now`.
    pub async fn get_station_schedule(&self, station: &Signature, now: Timestamp) -> StationSchedule {
        self.store
            .with_view(|view| {
                let inputs = inputs(view, now);
                self.aggregator
                    .station_schedule(station, view.timelines.iter().copied(), &inputs)
            })
            .await
    }

    /// Full itinerary for one train.
    pub async fn get_train_itinerary(&self, train_id: &str, now: Timestamp) -> Result<TrainItinerary, ScheduleError> {
        if train_id.trim().is_empty() {
            return Err(ScheduleError::MissingIdentifier);
        }

        self.store
            .with_view(|view| -> Result<TrainItinerary, ScheduleError> {
                let timeline = view
                    .timelines
                    .iter()
                    .find(|t| t.train.as_str() == train_id)
                    .or_else(|| view.timelines.iter().find(|t| t.matches(train_id)))
                    .ok_or_else(|| ScheduleError::UnknownTrain(train_id.to_string()))?;
                Ok(self.aggregator.train_itinerary(timeline, &inputs(view, now)))
            })
            .await
    }

    // Refreshes

    /// Refetch one train's announcements and replace its timeline.
    ///
    /// The route is marked resolved even when the feed has nothing for the
    /// train, so callers stop waiting on it.
    pub async fn refresh_train(&self, train: &TrainIdent) -> Result<Option<Arc<Timeline>>, ScheduleError> {
        let key = train.key()?;
        let ticket = self.requests.begin(QueryKey::Train(key.clone()));

        let source = self.source.clone();
        let filter = self.filter_for([train.clone()]);
        let fetched = self
            .requests
            .run(&ticket, async move { source.fetch_announcements(&filter).await })
            .await?;

        let announcements = match fetched {
            Ok(anns) => anns,
            Err(e) => {
                warn!(train = %key, error = %e, "Train refresh failed");
                self.requests.check(&ticket)?;
                self.mark_route_resolved(&key).await;
                return Err(e.into());
            }
        };

        let stations = self.store.stations().await;
        let timelines = build_timelines(&announcements, &stations, UntypedPolicy::Discard);
        debug!(train = %key, announcements = announcements.len(), timelines = timelines.len(), "Built train timelines");

        self.requests.check(&ticket)?;
        self.store.upsert_timelines(timelines).await;
        self.mark_route_resolved(&key).await;
        Ok(self.store.timeline(key.as_str()).await)
    }

    /// Refetch everything calling at `station`.
    ///
    /// The station's announcements name the trains; their full
    /// announcement sets are then fetched so each timeline covers the whole
    /// run. If that second fetch fails, trains not seen before get a
    /// timeline built from the station's own data. Returns the number of
    /// timelines that changed.
    pub async fn refresh_station(&self, station: &Signature) -> Result<usize, ScheduleError> {
        let ticket = self.requests.begin(QueryKey::Station(station.clone()));

        let source = self.source.clone();
        let sig = station.clone();
        let window = self.config.fetch_window_mins;
        let fetched = self
            .requests
            .run(&ticket, async move { fetch_station(source.as_ref(), &sig, window).await })
            .await?;

        let (stops, full) = fetched.map_err(|e| {
            warn!(station = %station, error = %e, "Station refresh failed");
            ScheduleError::Fetch(e)
        })?;

        let stations = self.store.stations().await;
        let timelines = match full {
            Ok(anns) => build_timelines(&anns, &stations, UntypedPolicy::Discard),
            Err(e) => {
                warn!(station = %station, error = %e, "Full announcement fetch failed, using station data");
                let scoped = build_timelines(&stops.into_announcements(), &stations, UntypedPolicy::Accept);
                let mut unseen = Vec::new();
                for timeline in scoped {
                    if self.store.timeline(timeline.train.as_str()).await.is_none() {
                        unseen.push(timeline);
                    }
                }
                unseen
            }
        };

        self.requests.check(&ticket)?;
        let changed = self.store.upsert_timelines(timelines).await;
        debug!(station = %station, changed, "Station refreshed");
        Ok(changed)
    }

    /// Refetch live positions. Returns how many changed.
    pub async fn refresh_positions(&self) -> Result<usize, ScheduleError> {
        let ticket = self.requests.begin(QueryKey::Positions);

        let source = self.source.clone();
        let snapshot = self
            .requests
            .run(&ticket, async move { source.fetch_live_positions().await })
            .await?
            .map_err(|e| {
                warn!(error = %e, "Position refresh failed");
                ScheduleError::Fetch(e)
            })?;

        self.requests.check(&ticket)?;
        Ok(self.store.update_positions(snapshot, self.now()).await)
    }

    /// Reload station metadata. Returns the number of stations.
    pub async fn refresh_stations(&self) -> Result<usize, ScheduleError> {
        let ticket = self.requests.begin(QueryKey::Stations);

        let source = self.source.clone();
        let directory = self.directory.clone();
        let table = self
            .requests
            .run(&ticket, async move { directory.load(source.as_ref()).await })
            .await?
            .map_err(|e| {
                warn!(error = %e, "Station metadata refresh failed");
                ScheduleError::Stations(e)
            })?;

        self.requests.check(&ticket)?;
        let count = table.len();
        self.store.set_stations(table).await;
        Ok(count)
    }

    /// Use the station disk cache, if fresh, without touching the feed.
    pub async fn warm_start(&self) -> bool {
        match self.directory.load_cached() {
            Some(table) => {
                info!(count = table.len(), "Warm start from station cache");
                self.store.set_stations(table).await;
                true
            }
            None => false,
        }
    }

    /// Drop feed caches and refetch stations, positions and every station
    /// in `watched`. Individual failures are logged and skipped.
    pub async fn full_refresh(&self, watched: &[Signature]) {
        self.source.invalidate();

        if let Err(e) = self.refresh_stations().await {
            debug!(error = %e, "Skipping station metadata in full refresh");
        }
        if let Err(e) = self.refresh_positions().await {
            debug!(error = %e, "Skipping positions in full refresh");
        }
        for station in watched {
            if let Err(e) = self.refresh_station(station).await {
                debug!(station = %station, error = %e, "Skipping station in full refresh");
            }
        }
        info!(stations = watched.len(), timelines = self.store.len().await, "Full refresh complete");
    }

    fn filter_for(&self, trains: impl IntoIterator<Item = TrainIdent>) -> AnnouncementFilter {
        let filter = AnnouncementFilter::for_trains(trains);
        match self.config.fetch_window_mins {
            Some(mins) => filter.with_time_window(mins),
            None => filter,
        }
    }

    /// Mark a train's route lookup complete without replacing a known route.
    async fn mark_route_resolved(&self, key: &TrainKey) {
        let known = self.store.route(key).await.is_some_and(|r| r.resolved);
        if !known {
            self.store.upsert_route(key, RouteInfo::resolved(None, None)).await;
        }
    }
}

/// Station rows plus the full announcements of every train in them.
type StationFetch = (StationStops, Result<Vec<RawAnnouncement>, FeedError>);

async fn fetch_station<S: AnnouncementSource>(
    source: &S,
    station: &Signature,
    window: Option<u32>,
) -> Result<StationFetch, FeedError> {
    let stops = source.fetch_station_stops(station).await?;
    let trains = trains_in(&stops);
    if trains.is_empty() {
        return Ok((stops, Ok(Vec::new())));
    }

    let mut filter = AnnouncementFilter::for_trains(trains);
    if let Some(mins) = window {
        filter = filter.with_time_window(mins);
    }
    let full = source.fetch_announcements(&filter).await;
    Ok((stops, full))
}

fn inputs<'a>(view: &StoreView<'a>, now: Timestamp) -> ScheduleInputs<'a> {
    ScheduleInputs {
        stations: view.stations,
        routes: view.routes,
        positions: view.positions,
        now,
    }
}

/// Distinct trains in a station response, in first-seen order.
fn trains_in(stops: &StationStops) -> Vec<TrainIdent> {
    let mut seen = HashSet::new();
    stops
        .arrivals
        .iter()
        .chain(&stops.departures)
        .filter(|a| a.train.key().is_ok_and(|key| seen.insert(key)))
        .map(|a| a.train.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Activity, Coordinate, Direction, LivePosition};
    use crate::feed::MockFeed;
    use crate::poll::FakeClock;
    use crate::stations::StationRecord;
    use crate::store::StoreEvent;
    use chrono::{Duration, TimeZone, Utc};

    fn t(h: u32, m: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 15, h, m, 0).unwrap()
    }

    fn sig(s: &str) -> Signature {
        Signature::parse(s).unwrap()
    }

    fn ann(train: &str, station: &str, activity: Activity, at: Timestamp) -> RawAnnouncement {
        let mut a = RawAnnouncement::new(TrainIdent::advertised(train), Some(sig(station)), activity);
        a.advertised = Some(at);
        a
    }

    /// 523 runs G -> Cst -> U; 7 starts at Cst for U.
    fn announcements() -> Vec<RawAnnouncement> {
        vec![
            ann("523", "G", Activity::Departure, t(8, 0)),
            ann("523", "Cst", Activity::Arrival, t(10, 0)),
            ann("523", "Cst", Activity::Departure, t(10, 5)),
            ann("523", "U", Activity::Arrival, t(10, 45)),
            ann("7", "Cst", Activity::Departure, t(10, 30)),
            ann("7", "U", Activity::Arrival, t(11, 10)),
        ]
    }

    fn service(feed: MockFeed) -> ScheduleService<MockFeed> {
        ScheduleService::new(feed, ReconcileConfig::default()).with_clock(FakeClock::new(t(9, 50)))
    }

    fn trains(entries: &[crate::schedule::ScheduleEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.train.as_str()).collect()
    }

    #[tokio::test]
    async fn station_refresh_builds_schedule() {
        let service = service(MockFeed::new().with_announcements(announcements()));

        assert_eq!(service.refresh_station(&sig("Cst")).await.unwrap(), 2);

        let schedule = service.get_station_schedule(&sig("Cst"), service.now()).await;
        assert_eq!(trains(&schedule.arrivals), vec!["523"]);
        assert_eq!(trains(&schedule.departures), vec!["523", "7"]);
        assert_eq!(schedule.arrivals[0].time, t(10, 0));
        assert_eq!(schedule.departures[0].time, t(10, 5));
        assert!(!schedule.arrivals[0].is_live);

        // Whole runs, not just the station's rows
        let timeline = service.get_timeline("523").await.unwrap();
        assert_eq!(timeline.stops.len(), 3);
        assert_eq!(
            service.get_route("523").await,
            Some(RouteInfo::resolved(Some(sig("G")), Some(sig("U"))))
        );
    }

    #[tokio::test]
    async fn failed_refresh_leaves_store_untouched() {
        let feed = MockFeed::new().with_announcements(announcements());
        let service = service(feed.clone());
        service.refresh_station(&sig("Cst")).await.unwrap();

        feed.set_announcements(Vec::new());
        feed.fail_next(FeedError::RateLimited);
        let err = service.refresh_station(&sig("Cst")).await.unwrap_err();
        assert!(matches!(err, ScheduleError::Fetch(FeedError::RateLimited)));

        let schedule = service.get_station_schedule(&sig("Cst"), service.now()).await;
        assert_eq!(schedule.len(), 3);
    }

    #[tokio::test]
    async fn station_data_fills_in_when_full_fetch_fails() {
        let feed = MockFeed::new().with_announcements(announcements());
        let service = service(feed.clone());
        service.refresh_station(&sig("Cst")).await.unwrap();

        let mut more = announcements();
        more.push(ann("9", "Cst", Activity::Arrival, t(11, 0)));
        feed.set_announcements(more);
        feed.succeed_next();
        feed.fail_next(FeedError::RateLimited);

        // Only the new train is added; the cached runs stay whole
        assert_eq!(service.refresh_station(&sig("Cst")).await.unwrap(), 1);
        assert!(service.get_timeline("9").await.is_some());
        assert_eq!(service.get_timeline("523").await.unwrap().stops.len(), 3);
    }

    #[tokio::test]
    async fn train_refresh() {
        let service = service(MockFeed::new().with_announcements(announcements()));

        let timeline = service
            .refresh_train(&TrainIdent::advertised("7"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(timeline.stops.len(), 2);

        let itinerary = service.get_train_itinerary("7", service.now()).await.unwrap();
        assert_eq!(itinerary.stops.len(), 2);
        assert!(itinerary.stops[0].position.is_first);
        assert_eq!(itinerary.stops[0].eta_label.as_deref(), Some("in 40 min"));
    }

    #[tokio::test]
    async fn train_without_data_gets_resolved_empty_route() {
        let service = service(MockFeed::new());

        assert!(service.refresh_train(&TrainIdent::advertised("1")).await.unwrap().is_none());
        assert_eq!(service.get_route("1").await, Some(RouteInfo::resolved(None, None)));
        assert!(matches!(
            service.get_train_itinerary("1", service.now()).await,
            Err(ScheduleError::UnknownTrain(_))
        ));
    }

    #[tokio::test]
    async fn missing_identifier() {
        let service = service(MockFeed::new());

        assert!(matches!(
            service.refresh_train(&TrainIdent::default()).await,
            Err(ScheduleError::MissingIdentifier)
        ));
        assert!(matches!(
            service.get_train_itinerary(" ", service.now()).await,
            Err(ScheduleError::MissingIdentifier)
        ));
    }

    #[test]
    fn domain_errors_keep_their_cause() {
        let err: ScheduleError = DomainError::MissingIdentifier.into();
        assert!(matches!(err, ScheduleError::MissingIdentifier));

        let err: ScheduleError = DomainError::from(Signature::parse("S t").unwrap_err()).into();
        assert!(matches!(err, ScheduleError::InvalidStation(_)));
        assert!(err.to_string().starts_with("invalid station: invalid location signature"));
    }

    #[tokio::test]
    async fn positions_mark_entries_live() {
        let position = LivePosition::new("523", Coordinate::new(59.40, 17.95), t(9, 48));
        let feed = MockFeed::new()
            .with_announcements(announcements())
            .with_positions(vec![position])
            .with_stations(vec![
                StationRecord::new("Cst", "Stockholm C").with_coordinate(Coordinate::new(59.3300, 18.0586)),
            ]);
        let service = service(feed);

        assert_eq!(service.refresh_stations().await.unwrap(), 1);
        assert_eq!(service.refresh_positions().await.unwrap(), 1);
        service.refresh_station(&sig("Cst")).await.unwrap();

        let schedule = service.get_station_schedule(&sig("Cst"), service.now()).await;
        let entry = &schedule.entries(Direction::Arrivals)[0];
        assert!(entry.is_live);
        assert!(entry.distance_m.is_some_and(|d| d > 5_000.0 && d < 15_000.0));
    }

    #[tokio::test]
    async fn window_follows_now() {
        let service = service(MockFeed::new().with_announcements(announcements()));
        service.refresh_station(&sig("Cst")).await.unwrap();

        // 10:20: the 10:00 arrival is 20 minutes old, the 10:05 departure 15
        let schedule = service.get_station_schedule(&sig("Cst"), t(10, 20)).await;
        assert!(schedule.arrivals.is_empty());
        assert_eq!(trains(&schedule.departures), vec!["523", "7"]);

        let later = service.get_station_schedule(&sig("Cst"), t(10, 20) + Duration::minutes(1)).await;
        assert_eq!(trains(&later.departures), vec!["7"]);
    }

    #[tokio::test]
    async fn refresh_publishes_store_events() {
        let service = service(MockFeed::new().with_announcements(announcements()));
        let mut events = service.store().subscribe();

        service.refresh_train(&TrainIdent::advertised("7")).await.unwrap();
        assert_eq!(events.recv().await.unwrap(), StoreEvent::TimelineUpdated(TrainKey::new("7")));
    }

    #[tokio::test]
    async fn full_refresh_tolerates_failures() {
        let feed = MockFeed::new().with_announcements(announcements());
        let service = service(feed.clone());
        feed.fail_next(FeedError::Unauthorized);

        service.full_refresh(&[sig("Cst")]).await;
        assert_eq!(service.store().len().await, 2);
    }
}
