//! Arrival/departure direction of a train relative to a station.
//!
//! Rules in priority order, first match wins:
//! 1. the station is the train's first stop: departures
//! 2. the station is the train's last stop: arrivals
//! 3. the route ends at the station: arrivals; starts there: departures
//!    (skipped when it does both)
//! 4. geometry: within range, a heading towards the station means
//!    arrivals, away from it departures
//!
//! When nothing decides, the result is indeterminate and defaults to
//! arrivals.

use crate::config::DirectionConfig;
use crate::domain::{Coordinate, Direction, RouteInfo, Signature, angular_difference};
use crate::timeline::StopPosition;

/// The rule that decided a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Basis {
    FirstStop,
    LastStop,
    RouteDestination,
    RouteOrigin,
    Heading,
    /// No rule applied; the direction is the arrivals default
    Indeterminate,
}

/// A resolved direction and the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub direction: Direction,
    pub basis: Basis,
}

impl Resolution {
    fn new(direction: Direction, basis: Basis) -> Self {
        Self { direction, basis }
    }

    fn indeterminate() -> Self {
        Self::new(Direction::Arrivals, Basis::Indeterminate)
    }

    pub fn is_determinate(&self) -> bool {
        self.basis != Basis::Indeterminate
    }
}

/// A live position fix for the geometric rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveFix {
    pub coordinate: Coordinate,
    /// Heading in degrees clockwise from north
    pub heading: Option<f64>,
}

/// Inputs for one direction decision.
#[derive(Debug, Clone, Copy)]
pub struct DirectionQuery<'a> {
    pub station: &'a Signature,
    pub position: StopPosition,
    pub route: Option<&'a RouteInfo>,
    pub station_coordinate: Option<Coordinate>,
    pub live: Option<LiveFix>,
}

impl<'a> DirectionQuery<'a> {
    pub fn new(station: &'a Signature) -> Self {
        Self {
            station,
            position: StopPosition::default(),
            route: None,
            station_coordinate: None,
            live: None,
        }
    }

    pub fn with_position(mut self, position: StopPosition) -> Self {
        self.position = position;
        self
    }

    pub fn with_route(mut self, route: &'a RouteInfo) -> Self {
        self.route = Some(route);
        self
    }

    pub fn with_station_coordinate(mut self, coordinate: Option<Coordinate>) -> Self {
        self.station_coordinate = coordinate;
        self
    }

    pub fn with_live(mut self, live: Option<LiveFix>) -> Self {
        self.live = live;
        self
    }
}

/// Resolves directions with configurable geometry thresholds.
#[derive(Debug, Clone, Default)]
pub struct DirectionResolver {
    config: DirectionConfig,
}

impl DirectionResolver {
    pub fn new(config: DirectionConfig) -> Self {
        Self { config }
    }

    pub fn resolve(&self, query: &DirectionQuery<'_>) -> Resolution {
        if query.position.is_first {
            return Resolution::new(Direction::Departures, Basis::FirstStop);
        }
        if query.position.is_last {
            return Resolution::new(Direction::Arrivals, Basis::LastStop);
        }

        // A route that both starts and ends here says nothing about direction
        if let Some(route) = query
            .route
            .filter(|r| !(r.starts_at(query.station) && r.ends_at(query.station)))
        {
            if route.ends_at(query.station) {
                return Resolution::new(Direction::Arrivals, Basis::RouteDestination);
            }
            if route.starts_at(query.station) {
                return Resolution::new(Direction::Departures, Basis::RouteOrigin);
            }
        }

        self.by_heading(query.live, query.station_coordinate)
            .map(|direction| Resolution::new(direction, Basis::Heading))
            .unwrap_or_else(Resolution::indeterminate)
    }

    /// Geometric rule; `None` when inputs are missing or out of range.
    fn by_heading(&self, live: Option<LiveFix>, station: Option<Coordinate>) -> Option<Direction> {
        let live = live?;
        let station = station?;
        let heading = live.heading.filter(|h| h.is_finite())?;

        let distance = live.coordinate.distance_to(&station);
        if !distance.is_finite() || distance > self.config.max_distance_m {
            return None;
        }

        let bearing = live.coordinate.bearing_to(&station);
        if angular_difference(bearing, heading) <= self.config.heading_threshold_deg {
            Some(Direction::Arrivals)
        } else {
            Some(Direction::Departures)
        }
    }
}
