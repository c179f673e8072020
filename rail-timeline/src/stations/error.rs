//! Station lookup error types.

use crate::feed::FeedError;

/// Errors that can occur when loading station metadata.
#[derive(Debug, thiserror::Error)]
pub enum StationError {
    /// Fetching from the feed failed
    #[error("station fetch failed: {0}")]
    Fetch(#[from] FeedError),

    /// Cache operation failed
    #[error("cache error: {message}")]
    Cache { message: String },

    /// Neither the feed nor the disk cache had any stations
    #[error("no station data available")]
    Unavailable,
}
