//! Station metadata: signature to name and coordinate.
//!
//! Stations are fetched from the feed at startup and refreshed
//! periodically, with a disk cache so a restart does not depend on the
//! feed being reachable.

mod cache;
mod error;
mod lookup;
mod record;

use std::future::Future;

use crate::feed::FeedError;

pub use cache::{StationCache, StationCacheConfig};
pub use error::StationError;
pub use lookup::{StationDirectory, StationTable};
pub use record::StationRecord;

/// Source of station metadata.
pub trait StationSource: Send + Sync {
    fn fetch_stations(&self) -> impl Future<Output = Result<Vec<StationRecord>, FeedError>> + Send;
}
