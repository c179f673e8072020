//! Announcement normalization: raw announcements to per-train stops.
//!
//! The input must be in provider-delivery order. When announcements carry
//! a provider sequence number they are stably re-sorted by it first;
//! otherwise the slice order is trusted. Later announcements overwrite
//! earlier ones field by field.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::domain::{
    Activity, LocationRef, RawAnnouncement, Side, Stop, StopTimes, TrainIdent, TrainKey,
};
use crate::stations::StationTable;

/// What to do with announcements whose activity is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UntypedPolicy {
    /// Drop them. Used for announcement-level queries, where every
    /// record should carry its own activity.
    #[default]
    Discard,
    /// Apply them to whichever side of the stop is still empty. Used for
    /// station-stop lists, where the response bucket implies the type.
    Accept,
}

/// Unsorted stops for one train, in first-seen order.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainStops {
    pub key: TrainKey,
    /// Identifiers merged over all of the train's announcements
    pub ident: TrainIdent,
    pub operator: Option<String>,
    /// Origin references from the most recent announcement that had any
    pub from: Vec<LocationRef>,
    /// Destination references from the most recent announcement that had any
    pub to: Vec<LocationRef>,
    pub stops: Vec<Stop>,
}

impl TrainStops {
    fn new(key: TrainKey) -> Self {
        Self {
            key,
            ident: TrainIdent::default(),
            operator: None,
            from: Vec::new(),
            to: Vec::new(),
            stops: Vec::new(),
        }
    }

    fn absorb_train_fields(&mut self, ann: &RawAnnouncement) {
        if self.ident.advertised.is_none() {
            self.ident.advertised = ann.train.advertised.clone();
        }
        if self.ident.operational.is_none() {
            self.ident.operational = ann.train.operational.clone();
        }
        if let Some(label) = ann.operator_label() {
            self.operator = Some(label.to_string());
        }
        if !ann.from.is_empty() {
            self.from = ann.from.clone();
        }
        if !ann.to.is_empty() {
            self.to = ann.to.clone();
        }
    }
}

/// Location key: signature, else advertised name, else feed position.
pub fn location_key(ann: &RawAnnouncement, feed_index: usize) -> String {
    if let Some(sig) = &ann.location {
        return sig.as_str().to_string();
    }
    match ann.location_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("#{feed_index}"),
    }
}

/// Announcements in processing order, paired with their index in the feed.
fn delivery_order(announcements: &[RawAnnouncement]) -> Vec<(usize, &RawAnnouncement)> {
    let mut ordered: Vec<_> = announcements.iter().enumerate().collect();
    if ordered.iter().any(|(_, a)| a.sequence.is_some()) {
        // Stable: equal or missing sequence numbers keep feed order,
        // missing ones after all numbered announcements
        ordered.sort_by_key(|(_, a)| (a.sequence.is_none(), a.sequence));
    }
    ordered
}

/// Normalize announcements into per-train stop lists.
///
/// Trains are returned in first-seen order; each train's stops are in
/// first-seen order too, unsorted and untrimmed.
pub fn normalize(
    announcements: &[RawAnnouncement],
    stations: &StationTable,
    policy: UntypedPolicy,
) -> Vec<TrainStops> {
    let mut trains: Vec<TrainStops> = Vec::new();
    let mut train_index: HashMap<TrainKey, usize> = HashMap::new();
    // (train index, location key) -> indices into that train's stops
    let mut buckets: HashMap<(usize, String), Vec<usize>> = HashMap::new();

    for (feed_index, ann) in delivery_order(announcements) {
        let key = match ann.train.key() {
            Ok(key) => key,
            Err(e) => {
                warn!(feed_index, error = %e, "Skipping announcement");
                continue;
            }
        };

        if !ann.activity.is_typed() && policy == UntypedPolicy::Discard {
            debug!(train = %key, feed_index, "Discarding untyped announcement");
            continue;
        }

        let t = *train_index.entry(key.clone()).or_insert_with(|| {
            trains.push(TrainStops::new(key.clone()));
            trains.len() - 1
        });
        let train = &mut trains[t];
        train.absorb_train_fields(ann);

        let loc = location_key(ann, feed_index);
        let bucket = buckets.entry((t, loc.clone())).or_default();

        let reuse = bucket
            .last()
            .copied()
            .filter(|&i| can_reuse(&train.stops[i], ann));

        let stop_index = match reuse {
            Some(i) => i,
            None => {
                let id = format!("{key}:{loc}:{}", bucket.len());
                let name = station_name(ann, stations, &loc);
                train.stops.push(Stop::new(id, name, ann.location.clone()));
                bucket.push(train.stops.len() - 1);
                train.stops.len() - 1
            }
        };

        merge(&mut train.stops[stop_index], ann);
    }

    trains
}

/// Whether `ann` belongs to the same visit as `stop`.
///
/// Only an arrival advertised after the stop's departure opens a new
/// visit; everything else, including arrival updates that carry no
/// advertised time, updates the most recent stop in the bucket.
fn can_reuse(stop: &Stop, ann: &RawAnnouncement) -> bool {
    match ann.activity {
        Activity::Arrival => {
            let departed = stop.departure.advertised.or_else(|| stop.departure_time());
            match (ann.advertised, departed) {
                (Some(arr), Some(dep)) => arr <= dep || stop.arrival.advertised == Some(arr),
                _ => true,
            }
        }
        Activity::Departure | Activity::Unknown => true,
    }
}

fn station_name(ann: &RawAnnouncement, stations: &StationTable, loc: &str) -> String {
    if let Some(name) = ann.location.as_ref().and_then(|sig| stations.name(sig)) {
        return name.to_string();
    }
    match ann.location_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => loc.to_string(),
    }
}

/// Apply one announcement's fields to a stop.
fn merge(stop: &mut Stop, ann: &RawAnnouncement) {
    let times = StopTimes {
        advertised: ann.advertised,
        estimated: ann.estimated,
        actual: ann.actual,
    };

    let side = match ann.activity {
        Activity::Arrival => Some(Side::Arrival),
        Activity::Departure => Some(Side::Departure),
        Activity::Unknown if !stop.has_arrival() => Some(Side::Arrival),
        Activity::Unknown if !stop.has_departure() => Some(Side::Departure),
        Activity::Unknown => None,
    };
    if let Some(side) = side {
        stop.times_mut(side).overwrite_with(&times);
    }

    if ann.track.is_some() {
        stop.track = ann.track.clone();
    }
    stop.canceled |= ann.canceled;
    stop.last_modified = match (stop.last_modified, ann.modified) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };
    for deviation in &ann.deviations {
        if !stop.deviations.contains(deviation) {
            stop.deviations.push(deviation.clone());
        }
    }
}
