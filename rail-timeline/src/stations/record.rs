//! Station metadata records as fetched and cached.

use serde::{Deserialize, Serialize};

use crate::domain::{Coordinate, Signature, StationInfo};

/// Flat station record, the unit of fetch and of the disk cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationRecord {
    pub signature: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub official_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl StationRecord {
    pub fn new(signature: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
            name: name.into(),
            short_name: None,
            official_name: None,
            latitude: None,
            longitude: None,
        }
    }

    pub fn with_coordinate(mut self, coordinate: Coordinate) -> Self {
        self.latitude = Some(coordinate.latitude);
        self.longitude = Some(coordinate.longitude);
        self
    }

    /// Validate into domain station info.
    ///
    /// Returns `None` when the signature is invalid. A coordinate is only
    /// attached when both halves are present and in range.
    pub fn to_info(&self) -> Option<StationInfo> {
        let signature = Signature::parse(&self.signature).ok()?;
        let name = if self.name.trim().is_empty() {
            signature.as_str().to_string()
        } else {
            self.name.trim().to_string()
        };

        let mut info = StationInfo::new(signature, name);
        info.short_name = self.short_name.clone();
        info.official_name = self.official_name.clone();

        if let (Some(lat), Some(lon)) = (self.latitude, self.longitude) {
            let coordinate = Coordinate::new(lat, lon);
            if coordinate.is_valid() {
                info = info.with_coordinate(coordinate);
            }
        }

        Some(info)
    }
}
