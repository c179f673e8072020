//! Canonical per-location stop records.
//!
//! A `Stop` is one train's visit to one location after reconciliation.
//! It accumulates data from one or more raw announcements: arrival data
//! fills the arrival side, departure data fills the departure side.

use chrono::Duration;

use super::{Signature, Timestamp, round_minutes};

/// Which side of a stop a piece of data belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Arrival,
    Departure,
}

/// Direction of a train relative to a station, for display lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Arrivals,
    Departures,
}

impl Direction {
    /// The stop side whose times describe this direction.
    pub fn side(self) -> Side {
        match self {
            Direction::Arrivals => Side::Arrival,
            Direction::Departures => Side::Departure,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Arrivals => "arrivals",
            Direction::Departures => "departures",
        }
    }
}

impl From<Side> for Direction {
    fn from(side: Side) -> Self {
        match side {
            Side::Arrival => Direction::Arrivals,
            Side::Departure => Direction::Departures,
        }
    }
}

/// Planned, estimated and actual times for one side of a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StopTimes {
    pub advertised: Option<Timestamp>,
    pub estimated: Option<Timestamp>,
    pub actual: Option<Timestamp>,
}

impl StopTimes {
    /// Returns true if no time is known for this side.
    pub fn is_empty(&self) -> bool {
        self.advertised.is_none() && self.estimated.is_none() && self.actual.is_none()
    }

    /// Best available time: actual, else estimated, else advertised.
    pub fn best(&self) -> Option<Timestamp> {
        self.actual.or(self.estimated).or(self.advertised)
    }

    /// Observed time used for delay: actual, else estimated.
    pub fn observed(&self) -> Option<Timestamp> {
        self.actual.or(self.estimated)
    }

    /// Overwrite the fields that `other` provides.
    pub fn overwrite_with(&mut self, other: &StopTimes) {
        if other.advertised.is_some() {
            self.advertised = other.advertised;
        }
        if other.estimated.is_some() {
            self.estimated = other.estimated;
        }
        if other.actual.is_some() {
            self.actual = other.actual;
        }
    }

    /// Delay in whole minutes (rounded), if the side is running late.
    ///
    /// Only positive delays are reported; early running counts as on time.
    pub fn delay_minutes(&self) -> Option<i64> {
        let planned = self.advertised?;
        let observed = self.observed()?;
        let mins = round_minutes(observed.signed_duration_since(planned));
        (mins > 0).then_some(mins)
    }
}

/// A train's visit to one location.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    /// Stable id: `<train>:<location key>:<visit>`
    pub id: String,
    pub station_name: String,
    pub signature: Option<Signature>,
    pub track: Option<String>,
    pub arrival: StopTimes,
    pub departure: StopTimes,
    /// Sticky: once any contributing announcement is canceled, so is the stop
    pub canceled: bool,
    /// Latest modification time over contributing announcements
    pub last_modified: Option<Timestamp>,
    pub deviations: Vec<String>,
}

impl Stop {
    pub fn new(id: impl Into<String>, station_name: impl Into<String>, signature: Option<Signature>) -> Self {
        Self {
            id: id.into(),
            station_name: station_name.into(),
            signature,
            track: None,
            arrival: StopTimes::default(),
            departure: StopTimes::default(),
            canceled: false,
            last_modified: None,
            deviations: Vec::new(),
        }
    }

    pub fn times(&self, side: Side) -> &StopTimes {
        match side {
            Side::Arrival => &self.arrival,
            Side::Departure => &self.departure,
        }
    }

    pub fn times_mut(&mut self, side: Side) -> &mut StopTimes {
        match side {
            Side::Arrival => &mut self.arrival,
            Side::Departure => &mut self.departure,
        }
    }

    pub fn has_arrival(&self) -> bool {
        !self.arrival.is_empty()
    }

    pub fn has_departure(&self) -> bool {
        !self.departure.is_empty()
    }

    /// Returns true if this stop is at `signature`.
    pub fn is_at(&self, signature: &Signature) -> bool {
        self.signature.as_ref() == Some(signature)
    }

    /// Best arrival time (actual, else estimated, else advertised).
    pub fn arrival_time(&self) -> Option<Timestamp> {
        self.arrival.best()
    }

    /// Best departure time (actual, else estimated, else advertised).
    pub fn departure_time(&self) -> Option<Timestamp> {
        self.departure.best()
    }

    /// Earliest available timestamp for ordering: the arrival side,
    /// falling back to the departure side. `None` sorts last.
    pub fn resolved_time(&self) -> Option<Timestamp> {
        self.arrival_time().or_else(|| self.departure_time())
    }

    /// Display time for a direction: that direction's side, falling back
    /// to the other side.
    pub fn time_for(&self, direction: Direction) -> Option<Timestamp> {
        match direction {
            Direction::Arrivals => self.arrival_time().or_else(|| self.departure_time()),
            Direction::Departures => self.departure_time().or_else(|| self.arrival_time()),
        }
    }

    /// The side that describes this stop when no direction is given:
    /// arrival if any arrival data exists, else departure.
    pub fn primary_side(&self) -> Side {
        if self.has_arrival() {
            Side::Arrival
        } else {
            Side::Departure
        }
    }

    /// Delay on the given side in rounded minutes, if late.
    pub fn delay_minutes(&self, side: Side) -> Option<i64> {
        self.times(side).delay_minutes()
    }

    /// Delay on the given side as a duration, if late.
    pub fn delay(&self, side: Side) -> Option<Duration> {
        self.delay_minutes(side).map(Duration::minutes)
    }
}
