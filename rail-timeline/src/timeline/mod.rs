//! Per-train stop timelines.
//!
//! Raw announcements go through [`normalize`] (dedupe and merge into
//! stops) and [`build_timeline`] (order, trim, resolve the route) to
//! produce one [`Timeline`] per train.

mod builder;
mod normalize;
mod route;

use crate::domain::{RawAnnouncement, RouteInfo, Signature, Stop, TrainIdent, TrainKey};
use crate::stations::StationTable;

pub use builder::{
    Status, StatusSide, build_timeline, eta_label, eta_minutes, order_and_trim, stop_status,
};
pub use normalize::{TrainStops, UntypedPolicy, location_key, normalize};
pub use route::{primary_ref, resolve_route};

/// Ordered, trimmed stops for one train.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub train: TrainKey,
    pub ident: TrainIdent,
    /// Operator label: product text, else owner, else operator
    pub operator: Option<String>,
    pub route: RouteInfo,
    pub stops: Vec<Stop>,
}

/// Where a stop sits in its timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StopPosition {
    pub is_first: bool,
    pub is_last: bool,
}

impl Timeline {
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn first(&self) -> Option<&Stop> {
        self.stops.first()
    }

    pub fn last(&self) -> Option<&Stop> {
        self.stops.last()
    }

    /// First/last flags for the stop at `index`, within the trimmed sequence.
    pub fn position(&self, index: usize) -> StopPosition {
        StopPosition {
            is_first: index == 0,
            is_last: index + 1 == self.stops.len(),
        }
    }

    /// Every visit to `station`, with its index.
    pub fn visits_at<'a>(&'a self, station: &'a Signature) -> impl Iterator<Item = (usize, &'a Stop)> + 'a {
        self.stops
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.is_at(station))
    }

    /// Returns true if `id` names this train by key or either identifier.
    pub fn matches(&self, id: &str) -> bool {
        self.train.as_str() == id || self.ident.matches(id)
    }
}

/// Normalize and build timelines for all trains in `announcements`.
///
/// Trains are returned in first-seen order.
pub fn build_timelines(
    announcements: &[RawAnnouncement],
    stations: &StationTable,
    policy: UntypedPolicy,
) -> Vec<Timeline> {
    normalize(announcements, stations, policy)
        .into_iter()
        .map(build_timeline)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Activity, LocationRef, Timestamp};
    use chrono::{TimeZone, Utc};

    fn t(h: u32, m: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 15, h, m, 0).unwrap()
    }

    fn sig(s: &str) -> Signature {
        Signature::parse(s).unwrap()
    }

    fn ann(train: &str, station: &str, activity: Activity, at: Timestamp) -> RawAnnouncement {
        let mut a = RawAnnouncement::new(TrainIdent::advertised(train), Some(sig(station)), activity);
        a.advertised = Some(at);
        a
    }

    #[test]
    fn end_to_end() {
        let mut canceled_origin = ann("7", "Sk", Activity::Departure, t(8, 0));
        canceled_origin.canceled = true;

        // Delivered out of time order
        let anns = vec![
            ann("7", "U", Activity::Arrival, t(10, 40)),
            canceled_origin,
            ann("7", "Cst", Activity::Arrival, t(10, 0)),
            ann("7", "Cst", Activity::Departure, t(10, 5)),
            ann("8", "Cst", Activity::Departure, t(11, 0)),
        ];

        let timelines = build_timelines(&anns, &StationTable::new(), UntypedPolicy::Discard);
        assert_eq!(timelines.len(), 2);

        let seven = &timelines[0];
        assert_eq!(seven.train.as_str(), "7");
        let names: Vec<_> = seven.stops.iter().map(|s| s.station_name.as_str()).collect();
        assert_eq!(names, vec!["Cst", "U"]);

        // Route falls back to the trimmed timeline's ends
        assert_eq!(seven.route, RouteInfo::resolved(Some(sig("Cst")), Some(sig("U"))));

        assert_eq!(seven.position(0), StopPosition { is_first: true, is_last: false });
        assert_eq!(seven.position(1), StopPosition { is_first: false, is_last: true });
    }

    #[test]
    fn route_from_references() {
        let mut a = ann("1", "Cst", Activity::Departure, t(10, 0));
        a.from = vec![LocationRef::new(sig("Cst"), 0, 1)];
        a.to = vec![LocationRef::new(sig("G"), 0, 1), LocationRef::new(sig("Sk"), 1, 2)];

        let timeline = &build_timelines(&[a], &StationTable::new(), UntypedPolicy::Discard)[0];
        assert_eq!(timeline.route.to, Some(sig("G")));
    }

    #[test]
    fn visits_and_matching() {
        let anns = vec![
            ann("9", "Cst", Activity::Arrival, t(10, 0)),
            ann("9", "Cst", Activity::Departure, t(10, 5)),
            ann("9", "Sod", Activity::Arrival, t(10, 20)),
            ann("9", "Sod", Activity::Departure, t(10, 21)),
            ann("9", "Cst", Activity::Arrival, t(10, 40)),
        ];
        let timeline = &build_timelines(&anns, &StationTable::new(), UntypedPolicy::Discard)[0];

        let cst = sig("Cst");
        let visits: Vec<usize> = timeline.visits_at(&cst).map(|(i, _)| i).collect();
        assert_eq!(visits, vec![0, 2]);

        assert!(timeline.matches("9"));
        assert!(!timeline.matches("10"));
    }

    #[test]
    fn single_stop_is_first_and_last() {
        let timeline = &build_timelines(
            &[ann("1", "Cst", Activity::Departure, t(10, 0))],
            &StationTable::new(),
            UntypedPolicy::Discard,
        )[0];
        assert_eq!(timeline.position(0), StopPosition { is_first: true, is_last: true });
    }
}
