//! Display-ready schedule records.
//!
//! These are derived on every query and never stored.

use crate::direction::Basis;
use crate::domain::{Direction, LivePosition, RouteInfo, Signature, Stop, Timestamp, TrainIdent, TrainKey};
use crate::stations::StationTable;
use crate::timeline::{Status, StopPosition};

/// One train at one station in one direction.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    pub train: TrainKey,
    pub ident: TrainIdent,
    pub stop: Stop,
    pub route: RouteInfo,
    pub operator: Option<String>,
    /// `"<origin> – <destination>"`, when both ends are known
    pub route_label: Option<String>,
    pub direction: Direction,
    /// Rule that decided the direction
    pub basis: Basis,
    pub status: Status,
    pub delay_minutes: Option<i64>,
    /// Display time: this direction's side of the stop, else the other side
    pub time: Timestamp,
    pub eta_minutes: i64,
    pub eta_label: String,
    /// Metres from the live position to the station
    pub distance_m: Option<f64>,
    pub is_live: bool,
    pub last_updated: Option<Timestamp>,
}

/// Time-windowed arrivals and departures at one station.
#[derive(Debug, Clone, PartialEq)]
pub struct StationSchedule {
    pub station: Signature,
    pub arrivals: Vec<ScheduleEntry>,
    pub departures: Vec<ScheduleEntry>,
}

impl StationSchedule {
    pub fn empty(station: Signature) -> Self {
        Self {
            station,
            arrivals: Vec::new(),
            departures: Vec::new(),
        }
    }

    pub fn entries(&self, direction: Direction) -> &[ScheduleEntry] {
        match direction {
            Direction::Arrivals => &self.arrivals,
            Direction::Departures => &self.departures,
        }
    }

    pub fn len(&self) -> usize {
        self.arrivals.len() + self.departures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrivals.is_empty() && self.departures.is_empty()
    }
}

/// One stop of a train itinerary.
#[derive(Debug, Clone, PartialEq)]
pub struct ItineraryStop {
    pub stop: Stop,
    pub position: StopPosition,
    pub status: Status,
    pub delay_minutes: Option<i64>,
    pub eta_minutes: Option<i64>,
    pub eta_label: Option<String>,
}

/// A whole train timeline, for train detail display.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainItinerary {
    pub train: TrainKey,
    pub ident: TrainIdent,
    pub operator: Option<String>,
    pub route: RouteInfo,
    pub route_label: Option<String>,
    pub live: Option<LivePosition>,
    pub stops: Vec<ItineraryStop>,
}

/// Route label from station names, falling back to signatures.
pub fn route_label(route: &RouteInfo, stations: &StationTable) -> Option<String> {
    let from = stations.display_name(route.from.as_ref()?);
    let to = stations.display_name(route.to.as_ref()?);
    Some(format!("{from} – {to}"))
}
