//! Live train positions.

use chrono::Duration;

use super::{Coordinate, Timestamp};

/// One live position report for a train.
#[derive(Debug, Clone, PartialEq)]
pub struct LivePosition {
    /// Train number the position is reported for
    pub id: String,
    pub coordinate: Coordinate,
    /// Heading in degrees clockwise from north, when reported
    pub bearing: Option<f64>,
    /// Speed in km/h, when reported
    pub speed: Option<f64>,
    pub updated_at: Timestamp,
}

impl LivePosition {
    pub fn new(id: impl Into<String>, coordinate: Coordinate, updated_at: Timestamp) -> Self {
        Self {
            id: id.into(),
            coordinate,
            bearing: None,
            speed: None,
            updated_at,
        }
    }

    /// Time since the report was made. Reports from the future count as fresh.
    pub fn age(&self, now: Timestamp) -> Duration {
        now.signed_duration_since(self.updated_at).max(Duration::zero())
    }
}
