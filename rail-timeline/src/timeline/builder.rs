//! Timeline building: ordering, trimming, status and ETA.

use std::fmt;

use chrono::Duration;

use crate::domain::{Side, Stop, Timestamp, cmp_or_last, round_minutes};

use super::Timeline;
use super::normalize::TrainStops;
use super::route::resolve_route;

/// Service status of a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    OnTime,
    Delayed,
    Canceled,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::OnTime => "on-time",
            Status::Delayed => "delayed",
            Status::Canceled => "canceled",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of a stop a status is evaluated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSide {
    Arrival,
    Departure,
    /// Arrival if the stop has arrival data, else departure
    Primary,
}

impl StatusSide {
    pub fn resolve(self, stop: &Stop) -> Side {
        match self {
            StatusSide::Arrival => Side::Arrival,
            StatusSide::Departure => Side::Departure,
            StatusSide::Primary => stop.primary_side(),
        }
    }
}

impl From<Side> for StatusSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Arrival => StatusSide::Arrival,
            Side::Departure => StatusSide::Departure,
        }
    }
}

/// Status of a stop on the given side, with the delay in minutes when late.
///
/// Canceled wins over any delay.
pub fn stop_status(stop: &Stop, side: StatusSide) -> (Status, Option<i64>) {
    let delay = stop.delay_minutes(side.resolve(stop));
    if stop.canceled {
        (Status::Canceled, delay)
    } else if delay.is_some() {
        (Status::Delayed, delay)
    } else {
        (Status::OnTime, None)
    }
}

/// Rounded minutes from `now` until `time`, negative when in the past.
pub fn eta_minutes(time: Timestamp, now: Timestamp) -> i64 {
    round_minutes(time.signed_duration_since(now))
}

/// Relative-time label for a time as seen from `now`.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use rail_timeline::timeline::eta_label;
///
/// let now = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
/// assert_eq!(eta_label(now + Duration::seconds(20), now), "now");
/// assert_eq!(eta_label(now + Duration::minutes(7), now), "in 7 min");
/// assert_eq!(eta_label(now + Duration::minutes(95), now), "in 1 h 35 min");
/// assert_eq!(eta_label(now - Duration::minutes(4), now), "4 min ago");
/// ```
pub fn eta_label(time: Timestamp, now: Timestamp) -> String {
    let delta = time.signed_duration_since(now);
    if delta.abs() < Duration::minutes(1) {
        return "now".to_string();
    }

    let mins = round_minutes(delta);
    if mins < 0 {
        format!("{} min ago", -mins)
    } else if mins >= 60 {
        format!("in {} h {} min", mins / 60, mins % 60)
    } else {
        format!("in {mins} min")
    }
}

/// Sort stops by resolved time (missing last), keeping insertion order for
/// ties, then drop leading and trailing canceled stops.
pub fn order_and_trim(mut stops: Vec<Stop>) -> Vec<Stop> {
    stops.sort_by(|a, b| cmp_or_last(a.resolved_time(), b.resolved_time()));

    let Some(start) = stops.iter().position(|s| !s.canceled) else {
        return Vec::new();
    };
    let end = stops.iter().rposition(|s| !s.canceled).map_or(start, |e| e + 1);

    stops.truncate(end);
    stops.split_off(start)
}

/// Build a train's timeline from its normalized stops.
pub fn build_timeline(train: TrainStops) -> Timeline {
    let stops = order_and_trim(train.stops);
    let route = resolve_route(&train.from, &train.to, &stops);

    Timeline {
        train: train.key,
        ident: train.ident,
        operator: train.operator,
        route,
        stops,
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn arb_stop() -> impl Strategy<Value = Stop> {
        (
            prop::option::of(0i64..1000),
            prop::option::of(0i64..1000),
            any::<bool>(),
        )
            .prop_map(|(arr, dep, canceled)| {
                let base = Utc.with_ymd_and_hms(2024, 3, 15, 6, 0, 0).unwrap();
                let mut s = Stop::new("x", "x", None);
                s.arrival.advertised = arr.map(|m| base + Duration::minutes(m));
                s.departure.advertised = dep.map(|m| base + Duration::minutes(m));
                s.canceled = canceled;
                s
            })
    }

    proptest! {
        #[test]
        fn ordered_by_resolved_time(stops in prop::collection::vec(arb_stop(), 0..20)) {
            let ordered = order_and_trim(stops);
            for pair in ordered.windows(2) {
                prop_assert_ne!(
                    cmp_or_last(pair[0].resolved_time(), pair[1].resolved_time()),
                    std::cmp::Ordering::Greater
                );
            }
        }

        #[test]
        fn trimmed_ends_are_not_canceled(stops in prop::collection::vec(arb_stop(), 0..20)) {
            let ordered = order_and_trim(stops);
            if let (Some(first), Some(last)) = (ordered.first(), ordered.last()) {
                prop_assert!(!first.canceled);
                prop_assert!(!last.canceled);
            }
        }

        #[test]
        fn trimming_keeps_every_live_stop(stops in prop::collection::vec(arb_stop(), 0..20)) {
            let live = stops.iter().filter(|s| !s.canceled).count();
            let ordered = order_and_trim(stops);
            prop_assert_eq!(ordered.iter().filter(|s| !s.canceled).count(), live);
        }
    }
}
