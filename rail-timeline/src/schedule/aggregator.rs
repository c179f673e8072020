//! Station and train schedule aggregation.

use std::collections::HashMap;

use tracing::debug;

use crate::config::{ReconcileConfig, WindowConfig};
use crate::direction::{DirectionQuery, DirectionResolver, LiveFix};
use crate::domain::{Direction, RouteInfo, Signature, Stop, Timestamp, TrainKey, cmp_or_last};
use crate::stations::StationTable;
use crate::timeline::{StatusSide, StopPosition, Timeline, eta_label, eta_minutes, stop_status};
use crate::tracker::PositionTracker;

use super::entry::{ItineraryStop, ScheduleEntry, StationSchedule, TrainItinerary, route_label};

/// Shared lookups for one aggregation pass.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleInputs<'a> {
    pub stations: &'a StationTable,
    pub routes: &'a HashMap<TrainKey, RouteInfo>,
    pub positions: &'a PositionTracker,
    pub now: Timestamp,
}

impl ScheduleInputs<'_> {
    /// Cached route when resolved, else the timeline's own.
    fn route_for<'t>(&'t self, timeline: &'t Timeline) -> &'t RouteInfo {
        match self.routes.get(&timeline.train) {
            Some(route) if route.resolved => route,
            _ => &timeline.route,
        }
    }
}

/// Builds station schedules and train itineraries from timelines.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    window: WindowConfig,
    resolver: DirectionResolver,
}

impl Aggregator {
    pub fn new(config: &ReconcileConfig) -> Self {
        Self {
            window: config.window.clone(),
            resolver: DirectionResolver::new(config.direction.clone()),
        }
    }

    fn in_window(&self, time: Timestamp, now: Timestamp) -> bool {
        time >= now - self.window.past() && time <= now + self.window.future()
    }

    /// Arrivals and departures at `station`.
    ///
    /// `timelines` must be in insertion order; it breaks ties between
    /// entries with equal times and equal last-updated times.
    pub fn station_schedule<'t>(
        &self,
        station: &Signature,
        timelines: impl IntoIterator<Item = &'t Timeline>,
        inputs: &ScheduleInputs<'_>,
    ) -> StationSchedule {
        let mut schedule = StationSchedule::empty(station.clone());
        let station_coordinate = inputs.stations.coordinate(station);

        for timeline in timelines {
            let route = inputs.route_for(timeline);
            let live = inputs.positions.find(&timeline.ident, inputs.now);
            let fix = live.map(|p| LiveFix {
                coordinate: p.coordinate,
                heading: p.bearing,
            });
            let distance_m = match (live, station_coordinate) {
                (Some(p), Some(c)) => Some(p.coordinate.distance_to(&c)),
                _ => None,
            };

            for (index, stop) in timeline.visits_at(station) {
                // A single-stop timeline says nothing about origin or terminus
                let position = if timeline.stops.len() > 1 {
                    timeline.position(index)
                } else {
                    StopPosition::default()
                };

                let query = DirectionQuery::new(station)
                    .with_position(position)
                    .with_route(route)
                    .with_station_coordinate(station_coordinate)
                    .with_live(fix);
                let resolution = self.resolver.resolve(&query);

                for direction in directions(stop, position, resolution.direction, resolution.is_determinate()) {
                    let Some(time) = stop.time_for(direction) else {
                        continue;
                    };
                    if !self.in_window(time, inputs.now) {
                        continue;
                    }

                    let (status, delay_minutes) = stop_status(stop, direction.side().into());
                    let entry = ScheduleEntry {
                        train: timeline.train.clone(),
                        ident: timeline.ident.clone(),
                        stop: stop.clone(),
                        route: route.clone(),
                        operator: timeline.operator.clone(),
                        route_label: route_label(route, inputs.stations),
                        direction,
                        basis: resolution.basis,
                        status,
                        delay_minutes,
                        time,
                        eta_minutes: eta_minutes(time, inputs.now),
                        eta_label: eta_label(time, inputs.now),
                        distance_m,
                        is_live: live.is_some(),
                        last_updated: stop.last_modified,
                    };

                    match direction {
                        Direction::Arrivals => schedule.arrivals.push(entry),
                        Direction::Departures => schedule.departures.push(entry),
                    }
                }
            }
        }

        sort_entries(&mut schedule.arrivals);
        sort_entries(&mut schedule.departures);

        debug!(
            station = %station,
            arrivals = schedule.arrivals.len(),
            departures = schedule.departures.len(),
            "Built station schedule"
        );
        schedule
    }

    /// The whole timeline as an itinerary; no window, no direction split.
    pub fn train_itinerary(&self, timeline: &Timeline, inputs: &ScheduleInputs<'_>) -> TrainItinerary {
        let route = inputs.route_for(timeline).clone();
        let stops = timeline
            .stops
            .iter()
            .enumerate()
            .map(|(index, stop)| {
                let (status, delay_minutes) = stop_status(stop, StatusSide::Primary);
                let time = stop.resolved_time();
                ItineraryStop {
                    stop: stop.clone(),
                    position: timeline.position(index),
                    status,
                    delay_minutes,
                    eta_minutes: time.map(|t| eta_minutes(t, inputs.now)),
                    eta_label: time.map(|t| eta_label(t, inputs.now)),
                }
            })
            .collect();

        TrainItinerary {
            train: timeline.train.clone(),
            ident: timeline.ident.clone(),
            operator: timeline.operator.clone(),
            route_label: route_label(&route, inputs.stations),
            route,
            live: inputs.positions.find(&timeline.ident, inputs.now).cloned(),
            stops,
        }
    }
}

/// Directions a stop is listed under at its station.
///
/// First stops only depart and last stops only arrive. A stop with both
/// legs is listed both ways. A single-leg stop goes where the resolver
/// says, or under its own leg's type when the resolver had nothing to go on.
fn directions(stop: &Stop, position: StopPosition, resolved: Direction, determinate: bool) -> Vec<Direction> {
    if position.is_first {
        return vec![Direction::Departures];
    }
    if position.is_last {
        return vec![Direction::Arrivals];
    }

    match (stop.has_arrival(), stop.has_departure()) {
        (true, true) => vec![Direction::Arrivals, Direction::Departures],
        (true, false) if !determinate => vec![Direction::Arrivals],
        (false, true) if !determinate => vec![Direction::Departures],
        _ => vec![resolved],
    }
}

/// Ascending by time, then last-updated (missing last); stable, so
/// insertion order breaks remaining ties.
fn sort_entries(entries: &mut [ScheduleEntry]) {
    entries.sort_by(|a, b| {
        a.time
            .cmp(&b.time)
            .then_with(|| cmp_or_last(a.last_updated, b.last_updated))
    });
}
