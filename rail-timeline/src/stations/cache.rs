//! Disk-based cache for station metadata.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use super::error::StationError;
use super::record::StationRecord;

/// Default cache TTL: 24 hours.
const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Cached station data with metadata.
#[derive(Debug, Serialize, Deserialize)]
struct CachedStations {
    /// Unix timestamp when the cache was written.
    cached_at_secs: u64,
    stations: Vec<StationRecord>,
}

/// Configuration for the station disk cache.
#[derive(Debug, Clone)]
pub struct StationCacheConfig {
    pub path: PathBuf,
    /// How long the cache counts as fresh.
    pub ttl: Duration,
}

impl StationCacheConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

impl Default for StationCacheConfig {
    fn default() -> Self {
        Self::new("stations_cache.json")
    }
}

/// Disk cache for station metadata.
///
/// An expired cache is still readable through [`StationCache::load_stale`]:
/// stale station names beat no station names when the feed is down.
#[derive(Debug, Clone)]
pub struct StationCache {
    config: StationCacheConfig,
}

impl StationCache {
    pub fn new(config: StationCacheConfig) -> Self {
        Self { config }
    }

    /// Load stations if the cache exists, parses and is within its TTL.
    pub fn load(&self) -> Option<Vec<StationRecord>> {
        let cached = self.read()?;

        let now = unix_now().ok()?;
        let age_secs = now.saturating_sub(cached.cached_at_secs);
        if age_secs >= self.config.ttl.as_secs() {
            return None;
        }

        Some(cached.stations)
    }

    /// Load stations regardless of age.
    pub fn load_stale(&self) -> Option<Vec<StationRecord>> {
        self.read().map(|c| c.stations)
    }

    fn read(&self) -> Option<CachedStations> {
        let contents = std::fs::read_to_string(&self.config.path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    /// Save stations, creating parent directories as needed.
    pub fn save(&self, stations: &[StationRecord]) -> Result<(), StationError> {
        let cached = CachedStations {
            cached_at_secs: unix_now()?,
            stations: stations.to_vec(),
        };

        if let Some(parent) = self.config.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| StationError::Cache {
                message: format!("failed to create cache directory: {e}"),
            })?;
        }

        let json = serde_json::to_string_pretty(&cached).map_err(|e| StationError::Cache {
            message: format!("failed to serialize cache: {e}"),
        })?;

        std::fs::write(&self.config.path, json).map_err(|e| StationError::Cache {
            message: format!("failed to write cache file: {e}"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }
}

fn unix_now() -> Result<u64, StationError> {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| StationError::Cache {
            message: "system time before unix epoch".to_string(),
        })
}
