//! Configuration for the reconciliation layer.
//!
//! Every threshold the reconciliation logic depends on lives here with
//! its default, so callers (and tests) can tune them without touching
//! the algorithms.

use std::time::Duration as StdDuration;

use chrono::Duration;

/// Display time window around "now" for station schedules.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowConfig {
    /// How far into the past entries are still shown (minutes).
    pub past_mins: i64,

    /// How far into the future entries are shown (minutes).
    pub future_mins: i64,
}

impl WindowConfig {
    pub fn past(&self) -> Duration {
        Duration::minutes(self.past_mins)
    }

    pub fn future(&self) -> Duration {
        Duration::minutes(self.future_mins)
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            past_mins: 15,
            future_mins: 12 * 60,
        }
    }
}

/// Thresholds for the geometric direction fallback.
///
/// Both values were chosen empirically and have not been calibrated
/// against real track geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionConfig {
    /// Maximum heading difference (degrees) still counted as "towards".
    pub heading_threshold_deg: f64,

    /// Beyond this distance (metres) geometry is inconclusive.
    pub max_distance_m: f64,
}

impl Default for DirectionConfig {
    fn default() -> Self {
        Self {
            heading_threshold_deg: 110.0,
            max_distance_m: 11_000.0,
        }
    }
}

/// Staleness rules for live positions.
#[derive(Debug, Clone, PartialEq)]
pub struct FreshnessConfig {
    /// Positions older than this are dropped (minutes).
    pub max_age_mins: i64,

    /// Stationary positions older than this are dropped (minutes).
    pub stationary_max_age_mins: i64,

    /// Speeds at or below this count as stationary (km/h).
    pub stationary_speed: f64,
}

impl FreshnessConfig {
    pub fn max_age(&self) -> Duration {
        Duration::minutes(self.max_age_mins)
    }

    pub fn stationary_max_age(&self) -> Duration {
        Duration::minutes(self.stationary_max_age_mins)
    }
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            max_age_mins: 60,
            stationary_max_age_mins: 15,
            stationary_speed: 0.5,
        }
    }
}

/// Refresh intervals for the polling scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Station/train schedule refresh.
    pub schedule: StdDuration,

    /// "Now" clock tick for relative labels.
    pub clock_tick: StdDuration,

    /// Station metadata refresh.
    pub station_metadata: StdDuration,

    /// Full refresh (caches dropped, everything refetched).
    pub full_refresh: StdDuration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            schedule: StdDuration::from_secs(60),
            clock_tick: StdDuration::from_secs(30),
            station_metadata: StdDuration::from_secs(10 * 60),
            full_refresh: StdDuration::from_secs(40 * 60),
        }
    }
}

/// All tunables of the reconciliation layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReconcileConfig {
    pub window: WindowConfig,
    pub direction: DirectionConfig,
    pub freshness: FreshnessConfig,
    pub poll: PollConfig,

    /// Announcement time window requested from the feed (minutes).
    pub fetch_window_mins: Option<u32>,
}

impl ReconcileConfig {
    pub fn with_window(mut self, window: WindowConfig) -> Self {
        self.window = window;
        self
    }

    pub fn with_direction(mut self, direction: DirectionConfig) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_freshness(mut self, freshness: FreshnessConfig) -> Self {
        self.freshness = freshness;
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_fetch_window(mut self, mins: u32) -> Self {
        self.fetch_window_mins = Some(mins);
        self
    }
}

/// Process configuration read from the environment by the binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// Feed authentication key (`TRAFIKVERKET_API_KEY`)
    pub api_key: String,
    /// Feed base URL override (`FEED_BASE_URL`)
    pub base_url: Option<String>,
    /// Station to poll (`STATION_SIGNATURE`, default "Cst")
    pub station: String,
    /// Station disk cache location (`STATION_CACHE_PATH`)
    pub station_cache_path: String,
}

impl Config {
    /// Read configuration from environment variables.
    ///
    /// Missing values fall back to defaults. A missing API key is allowed
    /// here; creating the feed client rejects it.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            api_key: lookup("TRAFIKVERKET_API_KEY").unwrap_or_default(),
            base_url: lookup("FEED_BASE_URL").filter(|s| !s.is_empty()),
            station: lookup("STATION_SIGNATURE").unwrap_or_else(|| "Cst".to_string()),
            station_cache_path: lookup("STATION_CACHE_PATH")
                .unwrap_or_else(|| "stations_cache.json".to_string()),
        }
    }
}
