//! Caching layer for feed responses.
//!
//! Polling several views of the same trains (a station schedule and an
//! open train itinerary, say) would otherwise ask the feed for the same
//! announcements within seconds of each other. Entries live for a short
//! TTL, well under the schedule poll interval, so polls still see fresh
//! data. The full refresh drops everything.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache as MokaCache;
use tracing::debug;

use crate::domain::{LivePosition, RawAnnouncement, Signature};
use crate::feed::{AnnouncementFilter, AnnouncementSource, FeedError, StationStops};
use crate::stations::{StationRecord, StationSource};

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for announcement and station stop entries.
    pub ttl: Duration,

    /// TTL for the live position snapshot.
    pub positions_ttl: Duration,

    /// Maximum number of cached entries per kind.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            positions_ttl: Duration::from_secs(5),
            max_capacity: 1000,
        }
    }
}

impl CacheConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_positions_ttl(mut self, ttl: Duration) -> Self {
        self.positions_ttl = ttl;
        self
    }

    pub fn with_max_capacity(mut self, n: u64) -> Self {
        self.max_capacity = n;
        self
    }
}

/// Announcement source with caching.
///
/// Wraps any [`AnnouncementSource`]; failed fetches are never cached.
pub struct CachedFeedClient<S> {
    source: S,
    announcements: MokaCache<String, Arc<Vec<RawAnnouncement>>>,
    station_stops: MokaCache<Signature, Arc<StationStops>>,
    positions: MokaCache<(), Arc<Vec<LivePosition>>>,
}

impl<S: AnnouncementSource> CachedFeedClient<S> {
    pub fn new(source: S, config: &CacheConfig) -> Self {
        Self {
            source,
            announcements: MokaCache::builder()
                .time_to_live(config.ttl)
                .max_capacity(config.max_capacity)
                .build(),
            station_stops: MokaCache::builder()
                .time_to_live(config.ttl)
                .max_capacity(config.max_capacity)
                .build(),
            positions: MokaCache::builder()
                .time_to_live(config.positions_ttl)
                .max_capacity(1)
                .build(),
        }
    }

    /// Access the underlying source for operations that bypass the cache.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Number of cached announcement and station entries.
    pub fn entry_count(&self) -> u64 {
        self.announcements.entry_count() + self.station_stops.entry_count()
    }

    /// Invalidate all cached entries.
    pub fn invalidate_all(&self) {
        self.announcements.invalidate_all();
        self.station_stops.invalidate_all();
        self.positions.invalidate_all();
    }
}

impl<S: AnnouncementSource> AnnouncementSource for CachedFeedClient<S> {
    async fn fetch_announcements(&self, filter: &AnnouncementFilter) -> Result<Vec<RawAnnouncement>, FeedError> {
        let key = filter.cache_key();
        if let Some(cached) = self.announcements.get(&key).await {
            debug!(key = %key, "Announcement cache hit");
            return Ok(cached.as_ref().clone());
        }

        let fetched = self.source.fetch_announcements(filter).await?;
        self.announcements.insert(key, Arc::new(fetched.clone())).await;
        Ok(fetched)
    }

    async fn fetch_station_stops(&self, station: &Signature) -> Result<StationStops, FeedError> {
        if let Some(cached) = self.station_stops.get(station).await {
            debug!(station = %station, "Station stops cache hit");
            return Ok(cached.as_ref().clone());
        }

        let fetched = self.source.fetch_station_stops(station).await?;
        self.station_stops
            .insert(station.clone(), Arc::new(fetched.clone()))
            .await;
        Ok(fetched)
    }

    async fn fetch_live_positions(&self) -> Result<Vec<LivePosition>, FeedError> {
        if let Some(cached) = self.positions.get(&()).await {
            return Ok(cached.as_ref().clone());
        }

        let fetched = self.source.fetch_live_positions().await?;
        self.positions.insert((), Arc::new(fetched.clone())).await;
        Ok(fetched)
    }

    fn invalidate(&self) {
        self.invalidate_all();
    }
}

/// Station metadata has its own disk cache; requests pass straight through.
impl<S: AnnouncementSource + StationSource> StationSource for CachedFeedClient<S> {
    async fn fetch_stations(&self) -> Result<Vec<StationRecord>, FeedError> {
        self.source.fetch_stations().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Activity, TrainIdent};
    use crate::feed::MockFeed;

    fn feed() -> MockFeed {
        MockFeed::new().with_announcements(vec![RawAnnouncement::new(
            TrainIdent::advertised("1"),
            Some(Signature::parse("Cst").unwrap()),
            Activity::Departure,
        )])
    }

    #[test]
    fn default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(30));
        assert_eq!(config.positions_ttl, Duration::from_secs(5));
        assert_eq!(config.max_capacity, 1000);
    }

    #[tokio::test]
    async fn second_fetch_is_served_from_cache() {
        let client = CachedFeedClient::new(feed(), &CacheConfig::default());
        let filter = AnnouncementFilter::for_trains([TrainIdent::advertised("1")]);

        let first = client.fetch_announcements(&filter).await.unwrap();
        let second = client.fetch_announcements(&filter).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(client.source().calls(), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let client = CachedFeedClient::new(feed(), &CacheConfig::default());
        let station = Signature::parse("Cst").unwrap();
        client.source().fail_next(FeedError::RateLimited);

        assert!(client.fetch_station_stops(&station).await.is_err());
        let stops = client.fetch_station_stops(&station).await.unwrap();
        assert_eq!(stops.departures.len(), 1);
        assert_eq!(client.source().calls(), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let client = CachedFeedClient::new(feed(), &CacheConfig::default());

        client.fetch_live_positions().await.unwrap();
        client.invalidate();
        client.fetch_live_positions().await.unwrap();

        assert_eq!(client.source().calls(), 2);
    }

    #[tokio::test]
    async fn stations_pass_through() {
        let client = CachedFeedClient::new(
            MockFeed::new().with_stations(vec![StationRecord::new("Cst", "Stockholm C")]),
            &CacheConfig::default(),
        );

        client.fetch_stations().await.unwrap();
        client.fetch_stations().await.unwrap();
        assert_eq!(client.source().calls(), 2);
    }
}
