//! Rail-data feed client.
//!
//! The feed answers XML queries with JSON produced by an XML-to-JSON
//! bridge. Key characteristics:
//! - Any list field may arrive as a bare scalar when it has one element
//! - Numbers and booleans may arrive as strings
//! - Errors can be embedded in an HTTP 200 response
//!
//! `types` models the wire format, `decode` turns it into domain types,
//! and [`AnnouncementSource`] is the seam the rest of the crate fetches
//! through.

mod client;
mod decode;
mod error;
mod mock;
mod query;
mod types;

use std::future::Future;

use crate::domain::{LivePosition, RawAnnouncement, Signature};

pub use client::{FeedClient, FeedConfig};
pub use decode::{
    DecodeError, StationStops, decode_announcement, decode_announcements, decode_position,
    decode_positions, decode_station, decode_station_stops, decode_stations, parse_wkt_point,
};
pub use error::FeedError;
pub use mock::MockFeed;
pub use query::AnnouncementFilter;
pub use types::{
    AnnouncementDto, FeedResponse, Flex, LocationRefDto, OneOrMany, PositionDto, ResultSet,
    StationDto, StationStopsDto, TextOrCoded,
};

/// Source of raw announcements and live positions.
pub trait AnnouncementSource: Send + Sync {
    /// All announcements for the trains named in `filter`.
    fn fetch_announcements(
        &self,
        filter: &AnnouncementFilter,
    ) -> impl Future<Output = Result<Vec<RawAnnouncement>, FeedError>> + Send;

    /// Announcements at one station, pre-split into arrivals and departures.
    fn fetch_station_stops(
        &self,
        station: &Signature,
    ) -> impl Future<Output = Result<StationStops, FeedError>> + Send;

    /// Current live positions for all active trains.
    fn fetch_live_positions(&self) -> impl Future<Output = Result<Vec<LivePosition>, FeedError>> + Send;

    /// Drop any cached responses so the next fetch goes to the feed.
    fn invalidate(&self) {}
}
