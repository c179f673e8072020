//! Station lookup: signature to name and coordinate.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::domain::{Coordinate, Signature, StationInfo};

use super::StationSource;
use super::cache::StationCache;
use super::error::StationError;
use super::record::StationRecord;

/// Immutable signature -> station table.
#[derive(Debug, Clone, Default)]
pub struct StationTable {
    stations: HashMap<Signature, StationInfo>,
}

impl StationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from fetched records, skipping invalid signatures.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a StationRecord>) -> Self {
        let mut table = Self::new();
        for record in records {
            match record.to_info() {
                Some(info) => table.insert(info),
                None => debug!(signature = %record.signature, "Skipping station with invalid signature"),
            }
        }
        table
    }

    pub fn insert(&mut self, info: StationInfo) {
        self.stations.insert(info.signature.clone(), info);
    }

    pub fn get(&self, signature: &Signature) -> Option<&StationInfo> {
        self.stations.get(signature)
    }

    pub fn name(&self, signature: &Signature) -> Option<&str> {
        self.get(signature).map(|s| s.name.as_str())
    }

    /// Station name, falling back to the signature itself.
    pub fn display_name(&self, signature: &Signature) -> String {
        self.name(signature)
            .map(str::to_string)
            .unwrap_or_else(|| signature.to_string())
    }

    pub fn coordinate(&self, signature: &Signature) -> Option<Coordinate> {
        self.get(signature).and_then(|s| s.coordinate)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

impl FromIterator<StationInfo> for StationTable {
    fn from_iter<I: IntoIterator<Item = StationInfo>>(iter: I) -> Self {
        let mut table = Self::new();
        for info in iter {
            table.insert(info);
        }
        table
    }
}

/// Loads station tables from a source, backed by an optional disk cache.
#[derive(Debug, Clone, Default)]
pub struct StationDirectory {
    cache: Option<StationCache>,
}

impl StationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, cache: StationCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Table from a fresh disk cache, for a warm start without a fetch.
    pub fn load_cached(&self) -> Option<StationTable> {
        let records = self.cache.as_ref()?.load()?;
        Some(StationTable::from_records(&records))
    }

    /// Fetch stations from `source`.
    ///
    /// On success the disk cache is rewritten. On failure the disk cache is
    /// used even when expired; the fetch error is returned only when there is
    /// no cache to fall back on.
    pub async fn load<S: StationSource>(&self, source: &S) -> Result<StationTable, StationError> {
        match source.fetch_stations().await {
            Ok(records) if !records.is_empty() => {
                if let Some(cache) = &self.cache
                    && let Err(e) = cache.save(&records)
                {
                    warn!(error = %e, "Failed to write station cache");
                }
                let table = StationTable::from_records(&records);
                info!(count = table.len(), "Loaded stations from feed");
                Ok(table)
            }
            Ok(_) => self.fallback().ok_or(StationError::Unavailable),
            Err(e) => {
                warn!(error = %e, "Station fetch failed, trying disk cache");
                self.fallback().ok_or(StationError::Fetch(e))
            }
        }
    }

    fn fallback(&self) -> Option<StationTable> {
        let records = self.cache.as_ref()?.load_stale()?;
        let table = StationTable::from_records(&records);
        info!(count = table.len(), "Loaded stations from disk cache");
        Some(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{FeedError, MockFeed};
    use crate::stations::StationCacheConfig;
    use tempfile::tempdir;

    fn sig(s: &str) -> Signature {
        Signature::parse(s).unwrap()
    }

    fn records() -> Vec<StationRecord> {
        vec![
            StationRecord::new("Cst", "Stockholm C").with_coordinate(Coordinate::new(59.3303, 18.0581)),
            StationRecord::new("U", "Uppsala C"),
            StationRecord::new("bad sig", "Nowhere"),
        ]
    }

    #[test]
    fn table_lookups() {
        let table = StationTable::from_records(&records());
        assert_eq!(table.len(), 2);
        assert_eq!(table.name(&sig("Cst")), Some("Stockholm C"));
        assert_eq!(table.coordinate(&sig("Cst")), Some(Coordinate::new(59.3303, 18.0581)));
        assert_eq!(table.coordinate(&sig("U")), None);
        assert_eq!(table.display_name(&sig("Sk")), "Sk");
    }

    #[tokio::test]
    async fn load_writes_cache() {
        let dir = tempdir().unwrap();
        let cache = StationCache::new(StationCacheConfig::new(dir.path().join("s.json")));
        let directory = StationDirectory::new().with_cache(cache.clone());

        let feed = MockFeed::new().with_stations(records());
        let table = directory.load(&feed).await.unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(cache.load().unwrap().len(), 3);
        assert_eq!(directory.load_cached().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_fetch_falls_back_to_stale_cache() {
        let dir = tempdir().unwrap();
        let cache = StationCache::new(
            StationCacheConfig::new(dir.path().join("s.json")).with_ttl(std::time::Duration::from_secs(0)),
        );
        cache.save(&records()).unwrap();

        let directory = StationDirectory::new().with_cache(cache);
        let feed = MockFeed::new();
        feed.fail_next(FeedError::RateLimited);

        let table = directory.load(&feed).await.unwrap();
        assert_eq!(table.name(&sig("U")), Some("Uppsala C"));
    }

    #[tokio::test]
    async fn failed_fetch_without_cache_errors() {
        let feed = MockFeed::new();
        feed.fail_next(FeedError::Unauthorized);

        let err = StationDirectory::new().load(&feed).await.unwrap_err();
        assert!(matches!(err, StationError::Fetch(FeedError::Unauthorized)));
    }

    #[tokio::test]
    async fn empty_fetch_without_cache_is_unavailable() {
        let err = StationDirectory::new().load(&MockFeed::new()).await.unwrap_err();
        assert!(matches!(err, StationError::Unavailable));
    }
}
