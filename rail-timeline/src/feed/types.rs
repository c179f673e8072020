//! Feed response DTOs.
//!
//! These types map directly to the rail-data feed's JSON responses. The
//! feed is an XML service bridged to JSON, so the same field can arrive
//! as a scalar or as an array, numbers can arrive as strings, and
//! booleans as `"true"`. Each of those ambiguities is an explicit
//! untagged enum here; `decode` turns them into typed domain values.

use serde::Deserialize;

/// A field the bridge emits either as a single value or as a list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    // Tried first: a struct of optional fields would also accept a short array
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(v) => v,
            OneOrMany::One(v) => vec![v],
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

/// Flatten an optional one-or-many field.
pub fn many<T>(field: Option<OneOrMany<T>>) -> Vec<T> {
    field.map(OneOrMany::into_vec).unwrap_or_default()
}

/// A scalar whose JSON type is not reliable.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Flex {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Flex {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Flex::Bool(b) => Some(*b),
            Flex::Number(n) => Some(*n != 0.0),
            Flex::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Flex::Number(n) => Some(*n),
            Flex::Text(s) => s.trim().parse().ok(),
            Flex::Bool(_) => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_f64()
            .filter(|n| n.is_finite() && *n >= 0.0 && n.fract() == 0.0)
            .map(|n| n as u64)
    }

    /// Text form, with whole numbers printed without a fraction.
    pub fn as_string(&self) -> Option<String> {
        match self {
            Flex::Text(s) => Some(s.clone()),
            Flex::Number(n) if n.fract() == 0.0 => Some(format!("{}", *n as i64)),
            Flex::Number(n) => Some(n.to_string()),
            Flex::Bool(_) => None,
        }
    }
}

/// Free text that sometimes arrives as `{Code, Description}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TextOrCoded {
    Text(String),
    Coded(CodedText),
}

impl TextOrCoded {
    pub fn text(&self) -> Option<&str> {
        match self {
            TextOrCoded::Text(s) => Some(s.as_str()),
            TextOrCoded::Coded(c) => c.description.as_deref().or(c.code.as_deref()),
        }
        .map(str::trim)
        .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CodedText {
    pub code: Option<String>,
    pub description: Option<String>,
}

/// A from/to location reference: a bare signature or a full record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LocationRefDto {
    Name(String),
    Full(LocationRefRecord),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocationRefRecord {
    pub location_name: String,
    pub priority: Option<Flex>,
    pub order: Option<Flex>,
}

/// One `TrainAnnouncement` record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AnnouncementDto {
    pub activity_id: Option<String>,

    /// Free text: "Ankomst" or "Avgang"
    pub activity_type: Option<String>,

    pub advertised_train_ident: Option<Flex>,
    pub operational_train_number: Option<Flex>,

    pub location_signature: Option<String>,
    pub advertised_location_name: Option<String>,

    pub advertised_time_at_location: Option<String>,
    pub estimated_time_at_location: Option<String>,
    /// Actual time, once the train has passed
    pub time_at_location: Option<String>,

    pub track_at_location: Option<Flex>,
    pub canceled: Option<Flex>,

    pub deviation: Option<OneOrMany<TextOrCoded>>,
    pub product_information: Option<OneOrMany<TextOrCoded>>,

    pub information_owner: Option<String>,
    pub operator: Option<String>,

    pub from_location: Option<OneOrMany<LocationRefDto>>,
    pub to_location: Option<OneOrMany<LocationRefDto>>,

    pub modified_time: Option<String>,

    /// Delivery sequence number, when the bridge adds one
    pub sequence_number: Option<Flex>,
}

/// WKT geometry wrapper: `{"WGS84": "POINT (18.05 59.33)"}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeometryDto {
    #[serde(rename = "WGS84")]
    pub wgs84: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PositionTrainDto {
    pub advertised_train_number: Option<Flex>,
    pub operational_train_number: Option<Flex>,
}

/// One `TrainPosition` record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PositionDto {
    pub train: Option<PositionTrainDto>,
    pub position: Option<GeometryDto>,
    pub bearing: Option<Flex>,
    pub speed: Option<Flex>,
    pub time_stamp: Option<String>,
    pub modified_time: Option<String>,
}

/// One `TrainStation` record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StationDto {
    pub location_signature: String,
    pub advertised_location_name: Option<String>,
    pub advertised_short_location_name: Option<String>,
    pub official_location_name: Option<String>,
    pub geometry: Option<GeometryDto>,
}

/// Error object the feed embeds in an otherwise successful response.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedErrorDto {
    #[serde(rename = "SOURCE")]
    pub source: Option<String>,
    #[serde(rename = "MESSAGE")]
    pub message: Option<String>,
}

/// One result set; exactly one of the record lists is populated per query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultSet {
    #[serde(rename = "TrainAnnouncement")]
    pub train_announcement: Option<OneOrMany<AnnouncementDto>>,
    #[serde(rename = "TrainPosition")]
    pub train_position: Option<OneOrMany<PositionDto>>,
    #[serde(rename = "TrainStation")]
    pub train_station: Option<OneOrMany<StationDto>>,
    #[serde(rename = "ERROR")]
    pub error: Option<FeedErrorDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseBody {
    #[serde(rename = "RESULT", default)]
    pub result: Option<OneOrMany<ResultSet>>,
}

/// Top-level feed response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedResponse {
    #[serde(rename = "RESPONSE")]
    pub response: ResponseBody,
}

impl FeedResponse {
    pub fn into_results(self) -> Vec<ResultSet> {
        many(self.response.result)
    }
}

/// Pre-split station stops, as served by the single-station bridge.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationStopsDto {
    #[serde(default)]
    pub arrivals: OneOrMany<AnnouncementDto>,
    #[serde(default)]
    pub departures: OneOrMany<AnnouncementDto>,
}
