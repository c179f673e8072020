//! Domain types for the schedule reconciliation layer.
//!
//! This module contains validated rail data: announcements as decoded
//! from the feed, the canonical stops they reconcile into, route
//! summaries and live positions. Types enforce their invariants at
//! construction time, so code that receives them can trust their validity.

mod announcement;
mod error;
mod geo;
mod position;
mod route;
mod station;
mod stop;
mod time;

pub use announcement::{Activity, LocationRef, RawAnnouncement, TrainIdent, TrainKey};
pub use error::DomainError;
pub use geo::{Coordinate, EARTH_RADIUS_M, angular_difference, normalize_degrees};
pub use position::LivePosition;
pub use route::RouteInfo;
pub use station::{InvalidSignature, Signature, StationInfo};
pub use stop::{Direction, Side, Stop, StopTimes};
pub use time::{
    TimeError, Timestamp, cmp_or_last, parse_timestamp, parse_timestamp_strict, round_minutes,
};
