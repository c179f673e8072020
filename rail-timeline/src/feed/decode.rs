//! Decoding feed DTOs into domain types.
//!
//! Each record either decodes into a typed value or yields a
//! `DecodeError`. List-level helpers log and skip bad records so that one
//! malformed announcement never fails a whole response.

use tracing::{debug, warn};

use crate::domain::{
    Activity, Coordinate, LivePosition, LocationRef, RawAnnouncement, Signature, TrainIdent,
    parse_timestamp,
};

use crate::stations::StationRecord;

use super::types::{
    AnnouncementDto, Flex, LocationRefDto, PositionDto, StationDto, StationStopsDto, TextOrCoded,
    many,
};

/// Error during DTO to domain decoding.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    /// Neither train identifier present
    #[error("record has no train identifier")]
    MissingIdentifier,

    /// Location signature failed validation
    #[error("invalid location signature: {0:?}")]
    InvalidSignature(String),

    /// Geometry string could not be parsed
    #[error("invalid WGS84 point: {0:?}")]
    InvalidPoint(String),

    /// Missing required field
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Pre-split station stops, decoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationStops {
    pub arrivals: Vec<RawAnnouncement>,
    pub departures: Vec<RawAnnouncement>,
}

impl StationStops {
    /// All announcements, arrivals first, each list in delivery order.
    pub fn into_announcements(self) -> Vec<RawAnnouncement> {
        let mut all = self.arrivals;
        all.extend(self.departures);
        all
    }
}

/// Decode a single announcement record.
pub fn decode_announcement(dto: &AnnouncementDto) -> Result<RawAnnouncement, DecodeError> {
    let train = TrainIdent::new(
        dto.advertised_train_ident.as_ref().and_then(Flex::as_string),
        dto.operational_train_number.as_ref().and_then(Flex::as_string),
    );
    if train.key().is_err() {
        return Err(DecodeError::MissingIdentifier);
    }

    let location = match dto.location_signature.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(s) => Some(
            Signature::parse(s).map_err(|_| DecodeError::InvalidSignature(s.to_string()))?,
        ),
    };

    let mut ann = RawAnnouncement::new(train, location, Activity::infer(dto.activity_type.as_deref()));

    ann.location_name = dto
        .advertised_location_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    ann.advertised = parse_timestamp(dto.advertised_time_at_location.as_deref());
    ann.estimated = parse_timestamp(dto.estimated_time_at_location.as_deref());
    ann.actual = parse_timestamp(dto.time_at_location.as_deref());
    ann.modified = parse_timestamp(dto.modified_time.as_deref());

    ann.track = dto
        .track_at_location
        .as_ref()
        .and_then(Flex::as_string)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != "x");
    ann.canceled = dto.canceled.as_ref().and_then(Flex::as_bool).unwrap_or(false);

    ann.deviations = texts(dto.deviation.clone());
    ann.product = texts(dto.product_information.clone());
    ann.owner = dto.information_owner.clone();
    ann.operator = dto.operator.clone();

    ann.from = location_refs(dto.from_location.clone());
    ann.to = location_refs(dto.to_location.clone());

    ann.sequence = dto.sequence_number.as_ref().and_then(Flex::as_u64);

    Ok(ann)
}

/// Decode a list of announcement records, skipping malformed ones.
///
/// When `bucket` is given (a pre-split arrivals or departures list), it is
/// stamped onto records whose own activity text is missing.
pub fn decode_announcements(dtos: &[AnnouncementDto], bucket: Option<Activity>) -> Vec<RawAnnouncement> {
    let mut results = Vec::with_capacity(dtos.len());

    for dto in dtos {
        match decode_announcement(dto) {
            Ok(mut ann) => {
                if let Some(bucket) = bucket
                    && !ann.activity.is_typed()
                {
                    ann.activity = bucket;
                }
                results.push(ann);
            }
            Err(e) => {
                warn!(
                    activity_id = dto.activity_id.as_deref().unwrap_or("?"),
                    error = %e,
                    "Skipping announcement"
                );
            }
        }
    }

    results
}

/// Decode a pre-split station stops response.
pub fn decode_station_stops(dto: StationStopsDto) -> StationStops {
    StationStops {
        arrivals: decode_announcements(&dto.arrivals.into_vec(), Some(Activity::Arrival)),
        departures: decode_announcements(&dto.departures.into_vec(), Some(Activity::Departure)),
    }
}

/// Decode a single live position record.
pub fn decode_position(dto: &PositionDto) -> Result<LivePosition, DecodeError> {
    let train = dto.train.as_ref().ok_or(DecodeError::MissingField("Train"))?;
    let id = train
        .operational_train_number
        .as_ref()
        .or(train.advertised_train_number.as_ref())
        .and_then(Flex::as_string)
        .filter(|s| !s.trim().is_empty())
        .ok_or(DecodeError::MissingIdentifier)?;

    let wkt = dto
        .position
        .as_ref()
        .and_then(|p| p.wgs84.as_deref())
        .ok_or(DecodeError::MissingField("Position.WGS84"))?;
    let coordinate = parse_wkt_point(wkt).ok_or_else(|| DecodeError::InvalidPoint(wkt.to_string()))?;

    let updated_at = parse_timestamp(dto.time_stamp.as_deref())
        .or_else(|| parse_timestamp(dto.modified_time.as_deref()))
        .ok_or(DecodeError::MissingField("TimeStamp"))?;

    let mut position = LivePosition::new(id.trim(), coordinate, updated_at);
    position.bearing = dto.bearing.as_ref().and_then(Flex::as_f64).filter(|b| b.is_finite());
    position.speed = dto.speed.as_ref().and_then(Flex::as_f64).filter(|s| s.is_finite());

    Ok(position)
}

/// Decode a list of position records, skipping malformed ones.
pub fn decode_positions(dtos: &[PositionDto]) -> Vec<LivePosition> {
    dtos.iter()
        .filter_map(|dto| match decode_position(dto) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(error = %e, "Skipping position");
                None
            }
        })
        .collect()
}

/// Decode a single station record.
///
/// Geometry is optional; an unparseable point leaves the coordinate unset.
pub fn decode_station(dto: &StationDto) -> Result<StationRecord, DecodeError> {
    let signature = dto.location_signature.trim();
    if signature.is_empty() {
        return Err(DecodeError::MissingField("LocationSignature"));
    }
    Signature::parse(signature).map_err(|_| DecodeError::InvalidSignature(signature.to_string()))?;

    let name = dto
        .advertised_location_name
        .as_deref()
        .or(dto.official_location_name.as_deref())
        .unwrap_or(signature);

    let mut record = StationRecord::new(signature, name.trim());
    record.short_name = dto.advertised_short_location_name.clone();
    record.official_name = dto.official_location_name.clone();

    if let Some(coordinate) = dto
        .geometry
        .as_ref()
        .and_then(|g| g.wgs84.as_deref())
        .and_then(parse_wkt_point)
    {
        record = record.with_coordinate(coordinate);
    }

    Ok(record)
}

/// Decode a list of station records, skipping malformed ones.
pub fn decode_stations(dtos: &[StationDto]) -> Vec<StationRecord> {
    dtos.iter()
        .filter_map(|dto| match decode_station(dto) {
            Ok(s) => Some(s),
            Err(e) => {
                debug!(error = %e, "Skipping station");
                None
            }
        })
        .collect()
}

/// Parse a WKT point, `"POINT (lon lat)"`, into a coordinate.
///
/// # Examples
///
/// ```
/// use rail_timeline::feed::parse_wkt_point;
///
/// let c = parse_wkt_point("POINT (18.0581 59.3303)").unwrap();
/// assert_eq!(c.latitude, 59.3303);
/// assert_eq!(c.longitude, 18.0581);
///
/// assert!(parse_wkt_point("LINESTRING (1 2, 3 4)").is_none());
/// ```
pub fn parse_wkt_point(s: &str) -> Option<Coordinate> {
    let s = s.trim();
    let rest = s
        .strip_prefix("POINT")
        .or_else(|| s.strip_prefix("point"))?
        .trim();
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?;

    let mut parts = inner.split_whitespace();
    let lon: f64 = parts.next()?.parse().ok()?;
    let lat: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let coordinate = Coordinate::new(lat, lon);
    coordinate.is_valid().then_some(coordinate)
}

fn texts(field: Option<super::types::OneOrMany<TextOrCoded>>) -> Vec<String> {
    many(field)
        .iter()
        .filter_map(|t| t.text().map(str::to_string))
        .collect()
}

/// Out-of-range ranks sort last rather than wrapping.
fn saturate(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn location_refs(field: Option<super::types::OneOrMany<LocationRefDto>>) -> Vec<LocationRef> {
    many(field)
        .into_iter()
        .enumerate()
        .filter_map(|(idx, dto)| {
            let (name, priority, order) = match dto {
                LocationRefDto::Name(name) => (name, None, None),
                LocationRefDto::Full(r) => (
                    r.location_name,
                    r.priority.as_ref().and_then(Flex::as_u64),
                    r.order.as_ref().and_then(Flex::as_u64),
                ),
            };
            let signature = Signature::parse(&name).ok()?;
            Some(LocationRef::new(
                signature,
                order.map_or(idx as u32, saturate),
                priority.map_or(1, saturate),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn dto(json: &str) -> AnnouncementDto {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn decode_full_announcement() {
        let ann = decode_announcement(&dto(
            r#"{
                "ActivityType": "Ankomst",
                "AdvertisedTrainIdent": "523",
                "OperationalTrainNumber": "523",
                "LocationSignature": "Cst",
                "AdvertisedTimeAtLocation": "2024-03-15T10:00:00.000+01:00",
                "EstimatedTimeAtLocation": "2024-03-15T10:04:00.000+01:00",
                "TrackAtLocation": "12",
                "Canceled": false,
                "Deviation": [{"Code": "ANA027", "Description": "Spårändrat"}],
                "InformationOwner": "SJ",
                "FromLocation": [{"LocationName": "G", "Priority": 1, "Order": 0}],
                "ToLocation": [{"LocationName": "Cst", "Priority": 1, "Order": 0}],
                "ModifiedTime": "2024-03-15T08:00:00Z"
            }"#,
        ))
        .unwrap();

        assert_eq!(ann.train.key().unwrap().as_str(), "523");
        assert_eq!(ann.activity, Activity::Arrival);
        assert_eq!(ann.location.as_ref().unwrap().as_str(), "Cst");
        assert_eq!(ann.advertised, Some(Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap()));
        assert_eq!(ann.estimated, Some(Utc.with_ymd_and_hms(2024, 3, 15, 9, 4, 0).unwrap()));
        assert_eq!(ann.actual, None);
        assert_eq!(ann.track.as_deref(), Some("12"));
        assert!(!ann.canceled);
        assert_eq!(ann.deviations, vec!["Spårändrat".to_string()]);
        assert_eq!(ann.owner.as_deref(), Some("SJ"));
        assert_eq!(ann.from[0].signature.as_str(), "G");
        assert_eq!(ann.to[0].signature.as_str(), "Cst");
        assert!(ann.modified.is_some());
    }

    #[test]
    fn malformed_timestamp_is_absent() {
        let ann = decode_announcement(&dto(
            r#"{"AdvertisedTrainIdent": "1", "AdvertisedTimeAtLocation": "garbage"}"#,
        ))
        .unwrap();
        assert_eq!(ann.advertised, None);
    }

    #[test]
    fn missing_identifier_rejected() {
        let err = decode_announcement(&dto(r#"{"LocationSignature": "Cst"}"#)).unwrap_err();
        assert_eq!(err, DecodeError::MissingIdentifier);
    }

    #[test]
    fn invalid_signature_rejected() {
        let err = decode_announcement(&dto(
            r#"{"AdvertisedTrainIdent": "1", "LocationSignature": "Not a sig"}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidSignature(_)));
    }

    #[test]
    fn blank_signature_is_absent() {
        let ann = decode_announcement(&dto(
            r#"{"AdvertisedTrainIdent": "1", "LocationSignature": " ", "AdvertisedLocationName": "Flemingsberg"}"#,
        ))
        .unwrap();
        assert_eq!(ann.location, None);
        assert_eq!(ann.location_name.as_deref(), Some("Flemingsberg"));
    }

    #[test]
    fn list_skips_bad_records() {
        let dtos = vec![
            dto(r#"{"AdvertisedTrainIdent": "1", "ActivityType": "Avgang"}"#),
            dto(r#"{"LocationSignature": "Cst"}"#),
            dto(r#"{"OperationalTrainNumber": 2}"#),
        ];
        let anns = decode_announcements(&dtos, None);
        assert_eq!(anns.len(), 2);
        assert_eq!(anns[1].train.key().unwrap().as_str(), "2");
        assert_eq!(anns[1].activity, Activity::Unknown);
    }

    #[test]
    fn bucket_stamps_untyped_only() {
        let dtos = vec![
            dto(r#"{"AdvertisedTrainIdent": "1"}"#),
            dto(r#"{"AdvertisedTrainIdent": "2", "ActivityType": "Avgang"}"#),
        ];
        let anns = decode_announcements(&dtos, Some(Activity::Arrival));
        assert_eq!(anns[0].activity, Activity::Arrival);
        assert_eq!(anns[1].activity, Activity::Departure);
    }

    #[test]
    fn station_stops_split() {
        let stops: StationStopsDto = serde_json::from_str(
            r#"{
                "arrivals": [{"AdvertisedTrainIdent": "1", "LocationSignature": "Cst"}],
                "departures": {"AdvertisedTrainIdent": "2", "LocationSignature": "Cst"}
            }"#,
        )
        .unwrap();

        let stops = decode_station_stops(stops);
        assert_eq!(stops.arrivals[0].activity, Activity::Arrival);
        assert_eq!(stops.departures[0].activity, Activity::Departure);
        assert_eq!(stops.into_announcements().len(), 2);
    }

    #[test]
    fn location_refs_defaults() {
        let ann = decode_announcement(&dto(
            r#"{"AdvertisedTrainIdent": "1", "ToLocation": ["U", {"LocationName": "Gä", "Priority": 1}, {"LocationName": "Sk", "Priority": 2, "Order": 5}]}"#,
        ))
        .unwrap();

        // "Gä" is not a valid signature and is dropped
        assert_eq!(ann.to.len(), 2);
        assert_eq!(ann.to[0], LocationRef::new(Signature::parse("U").unwrap(), 0, 1));
        assert_eq!(ann.to[1], LocationRef::new(Signature::parse("Sk").unwrap(), 5, 2));
    }

    #[test]
    fn oversized_ranks_saturate() {
        let ann = decode_announcement(&dto(
            r#"{"AdvertisedTrainIdent": "1", "FromLocation": [{"LocationName": "Sk", "Priority": 4294967297, "Order": 4294967296}, {"LocationName": "G", "Priority": 2, "Order": 1}]}"#,
        ))
        .unwrap();

        let sk = Signature::parse("Sk").unwrap();
        assert_eq!(ann.from[0], LocationRef::new(sk, u32::MAX, u32::MAX));
        // A wrapped priority of 1 would have made Sk the origin
        assert_eq!(crate::timeline::primary_ref(&ann.from), Some(&Signature::parse("G").unwrap()));
    }

    #[test]
    fn sequence_number_decoded() {
        let ann = decode_announcement(&dto(r#"{"AdvertisedTrainIdent": "1", "SequenceNumber": "42"}"#)).unwrap();
        assert_eq!(ann.sequence, Some(42));
    }

    #[test]
    fn decode_position_record() {
        let pos: PositionDto = serde_json::from_str(
            r#"{
                "Train": {"AdvertisedTrainNumber": "523", "OperationalTrainNumber": "10523"},
                "Position": {"WGS84": "POINT (18.0581 59.3303)"},
                "Bearing": 90,
                "Speed": 0,
                "TimeStamp": "2024-03-15T10:00:00Z"
            }"#,
        )
        .unwrap();

        let pos = decode_position(&pos).unwrap();
        assert_eq!(pos.id, "10523");
        assert_eq!(pos.coordinate, Coordinate::new(59.3303, 18.0581));
        assert_eq!(pos.bearing, Some(90.0));
        assert_eq!(pos.speed, Some(0.0));
    }

    #[test]
    fn position_without_geometry_rejected() {
        let pos: PositionDto = serde_json::from_str(
            r#"{"Train": {"OperationalTrainNumber": "1"}, "TimeStamp": "2024-03-15T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(
            decode_position(&pos).unwrap_err(),
            DecodeError::MissingField("Position.WGS84")
        );
        assert!(decode_positions(&[pos]).is_empty());
    }

    #[test]
    fn decode_station_record() {
        let dto: StationDto = serde_json::from_str(
            r#"{
                "LocationSignature": "Cst",
                "AdvertisedLocationName": "Stockholm C",
                "AdvertisedShortLocationName": "Stockholm",
                "Geometry": {"WGS84": "POINT (18.0581 59.3303)"}
            }"#,
        )
        .unwrap();

        let record = decode_station(&dto).unwrap();
        assert_eq!(record.signature, "Cst");
        assert_eq!(record.name, "Stockholm C");
        assert_eq!(record.short_name.as_deref(), Some("Stockholm"));
        assert_eq!(record.latitude, Some(59.3303));
        assert_eq!(record.longitude, Some(18.0581));
    }

    #[test]
    fn station_without_geometry() {
        let dto: StationDto = serde_json::from_str(r#"{"LocationSignature": "U"}"#).unwrap();
        let record = decode_station(&dto).unwrap();
        assert_eq!(record.name, "U");
        assert_eq!(record.latitude, None);

        let bad: StationDto = serde_json::from_str(r#"{"LocationSignature": "a b"}"#).unwrap();
        assert!(decode_stations(&[bad]).is_empty());
    }

    #[test]
    fn wkt_parsing() {
        assert!(parse_wkt_point("POINT(18 59)").is_some());
        assert!(parse_wkt_point("point (18 59)").is_some());
        assert!(parse_wkt_point("POINT (18)").is_none());
        assert!(parse_wkt_point("POINT (18 59 3)").is_none());
        assert!(parse_wkt_point("POINT (200 59)").is_none());
        assert!(parse_wkt_point("").is_none());
    }
}
