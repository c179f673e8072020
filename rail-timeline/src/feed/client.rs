//! Rail-data feed HTTP client.
//!
//! Posts XML query documents and decodes the JSON answers into domain
//! types. A semaphore bounds concurrent requests.

use std::sync::Arc;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::domain::{Activity, LivePosition, RawAnnouncement, Signature};
use crate::stations::{StationRecord, StationSource};

use super::AnnouncementSource;
use super::decode::{StationStops, decode_announcements, decode_positions, decode_stations};
use super::error::FeedError;
use super::query::{
    AnnouncementFilter, announcements_query, positions_query, station_stops_query, stations_query,
};
use super::types::{FeedResponse, ResultSet, many};

/// Default feed endpoint.
const DEFAULT_BASE_URL: &str = "https://api.trafikinfo.trafikverket.se/v2/data.json";

/// Default maximum concurrent requests.
const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Default window for station stop queries: 12 hours either side.
const DEFAULT_STATION_WINDOW_MINS: u32 = 12 * 60;

/// Configuration for the feed client.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Authentication key sent in the query's login element
    pub api_key: String,
    pub base_url: String,
    pub max_concurrent: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Time window for station stop queries, in minutes
    pub station_window_mins: u32,
}

impl FeedConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 30,
            station_window_mins: DEFAULT_STATION_WINDOW_MINS,
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_station_window(mut self, mins: u32) -> Self {
        self.station_window_mins = mins;
        self
    }
}

/// Rail-data feed client.
#[derive(Debug, Clone)]
pub struct FeedClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    station_window_mins: u32,
    semaphore: Arc<Semaphore>,
}

impl FeedClient {
    pub fn new(config: FeedConfig) -> Result<Self, FeedError> {
        if config.api_key.trim().is_empty() {
            return Err(FeedError::NotConfigured("feed API key is empty".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/xml"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
            api_key: config.api_key,
            station_window_mins: config.station_window_mins,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
        })
    }

    /// Post one query document and return its result sets.
    async fn post(&self, body: String) -> Result<Vec<ResultSet>, FeedError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| FeedError::ApiError {
                status: 0,
                message: "Semaphore closed".to_string(),
            })?;

        let response = self.http.post(&self.base_url).body(body).send().await?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(FeedError::Unauthorized);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FeedError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        parse_response(&body, status.as_u16())
    }

    async fn fetch_side(&self, station: &Signature, activity: Activity) -> Result<Vec<RawAnnouncement>, FeedError> {
        let text = match activity {
            Activity::Departure => "Avgang",
            _ => "Ankomst",
        };
        let query = station_stops_query(&self.api_key, station, text, self.station_window_mins);
        let results = self.post(query).await?;

        let dtos: Vec<_> = results
            .into_iter()
            .flat_map(|r| many(r.train_announcement))
            .collect();
        Ok(decode_announcements(&dtos, Some(activity)))
    }
}

/// Parse a response body, surfacing embedded error objects.
fn parse_response(body: &str, status: u16) -> Result<Vec<ResultSet>, FeedError> {
    let response: FeedResponse = serde_json::from_str(body).map_err(|e| FeedError::Json {
        message: e.to_string(),
        body: Some(body.chars().take(500).collect()),
    })?;

    let results = response.into_results();
    if let Some(err) = results.iter().find_map(|r| r.error.as_ref()) {
        return Err(FeedError::ApiError {
            status,
            message: format!(
                "{}: {}",
                err.source.as_deref().unwrap_or("feed"),
                err.message.as_deref().unwrap_or("unknown error")
            ),
        });
    }

    Ok(results)
}

impl AnnouncementSource for FeedClient {
    async fn fetch_announcements(&self, filter: &AnnouncementFilter) -> Result<Vec<RawAnnouncement>, FeedError> {
        if filter.trains.is_empty() {
            return Ok(Vec::new());
        }

        let results = self.post(announcements_query(&self.api_key, filter)).await?;
        let dtos: Vec<_> = results
            .into_iter()
            .flat_map(|r| many(r.train_announcement))
            .collect();

        debug!(trains = filter.trains.len(), records = dtos.len(), "Fetched announcements");
        Ok(decode_announcements(&dtos, None))
    }

    async fn fetch_station_stops(&self, station: &Signature) -> Result<StationStops, FeedError> {
        let (arrivals, departures) = futures::try_join!(
            self.fetch_side(station, Activity::Arrival),
            self.fetch_side(station, Activity::Departure)
        )?;

        debug!(
            station = %station,
            arrivals = arrivals.len(),
            departures = departures.len(),
            "Fetched station stops"
        );
        Ok(StationStops { arrivals, departures })
    }

    async fn fetch_live_positions(&self) -> Result<Vec<LivePosition>, FeedError> {
        let results = self.post(positions_query(&self.api_key)).await?;
        let dtos: Vec<_> = results
            .into_iter()
            .flat_map(|r| many(r.train_position))
            .collect();
        Ok(decode_positions(&dtos))
    }
}

impl StationSource for FeedClient {
    async fn fetch_stations(&self) -> Result<Vec<StationRecord>, FeedError> {
        let results = self.post(stations_query(&self.api_key)).await?;
        let dtos: Vec<_> = results
            .into_iter()
            .flat_map(|r| many(r.train_station))
            .collect();
        Ok(decode_stations(&dtos))
    }
}
