//! Live position tracking with staleness filtering.

use std::collections::HashMap;

use crate::config::FreshnessConfig;
use crate::domain::{LivePosition, Timestamp, TrainIdent};

/// Returns true if `position` is still usable at `now`.
///
/// A position is stale when older than the maximum age, or when the train
/// is effectively stationary and the report is older than the stationary
/// limit (parked or out of service). A missing speed does not count as
/// stationary.
pub fn is_fresh(config: &FreshnessConfig, position: &LivePosition, now: Timestamp) -> bool {
    let age = position.age(now);
    if age > config.max_age() {
        return false;
    }
    let stationary = position.speed.is_some_and(|s| s <= config.stationary_speed);
    !(stationary && age > config.stationary_max_age())
}

/// Latest live position per train id.
#[derive(Debug, Clone, Default)]
pub struct PositionTracker {
    config: FreshnessConfig,
    positions: HashMap<String, LivePosition>,
}

impl PositionTracker {
    pub fn new(config: FreshnessConfig) -> Self {
        Self {
            config,
            positions: HashMap::new(),
        }
    }

    /// Merge a snapshot; per id the report with the newest `updated_at`
    /// wins. Returns how many entries changed.
    pub fn update(&mut self, snapshot: impl IntoIterator<Item = LivePosition>) -> usize {
        let mut changed = 0;
        for position in snapshot {
            match self.positions.get(&position.id) {
                Some(existing) if existing.updated_at >= position.updated_at => {}
                _ => {
                    self.positions.insert(position.id.clone(), position);
                    changed += 1;
                }
            }
        }
        changed
    }

    /// Fresh position for `id`.
    pub fn get(&self, id: &str, now: Timestamp) -> Option<&LivePosition> {
        self.positions
            .get(id)
            .filter(|p| is_fresh(&self.config, p, now))
    }

    /// Fresh position for a train under either of its identifiers; the
    /// newer report wins when both match.
    pub fn find(&self, ident: &TrainIdent, now: Timestamp) -> Option<&LivePosition> {
        [ident.operational.as_deref(), ident.advertised.as_deref()]
            .into_iter()
            .flatten()
            .filter_map(|id| self.get(id, now))
            .max_by_key(|p| p.updated_at)
    }

    /// All fresh positions, sorted by id.
    pub fn fresh(&self, now: Timestamp) -> Vec<&LivePosition> {
        let mut fresh: Vec<_> = self
            .positions
            .values()
            .filter(|p| is_fresh(&self.config, p, now))
            .collect();
        fresh.sort_by(|a, b| a.id.cmp(&b.id));
        fresh
    }

    /// Drop stale positions. Returns how many were removed.
    pub fn prune(&mut self, now: Timestamp) -> usize {
        let before = self.positions.len();
        let config = &self.config;
        self.positions.retain(|_, p| is_fresh(config, p, now));
        before - self.positions.len()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Coordinate;
    use chrono::{Duration, TimeZone, Utc};

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    fn pos(id: &str, mins_ago: i64, speed: Option<f64>) -> LivePosition {
        let mut p = LivePosition::new(id, Coordinate::new(59.3, 18.0), now() - Duration::minutes(mins_ago));
        p.speed = speed;
        p
    }

    #[test]
    fn stationary_and_old_is_stale() {
        let config = FreshnessConfig::default();
        assert!(!is_fresh(&config, &pos("1", 20, Some(0.0)), now()));
        assert!(is_fresh(&config, &pos("1", 14, Some(0.0)), now()));
        assert!(is_fresh(&config, &pos("1", 20, Some(80.0)), now()));
        assert!(is_fresh(&config, &pos("1", 20, None), now()));
    }

    #[test]
    fn too_old_is_stale_whatever_the_speed() {
        let config = FreshnessConfig::default();
        assert!(!is_fresh(&config, &pos("1", 61, Some(120.0)), now()));
        assert!(is_fresh(&config, &pos("1", 60, Some(120.0)), now()));
    }

    #[test]
    fn speed_threshold_inclusive() {
        let config = FreshnessConfig::default();
        assert!(!is_fresh(&config, &pos("1", 16, Some(0.5)), now()));
        assert!(is_fresh(&config, &pos("1", 16, Some(0.6)), now()));
    }

    #[test]
    fn newest_report_wins() {
        let mut tracker = PositionTracker::default();
        assert_eq!(tracker.update([pos("1", 5, Some(50.0))]), 1);
        assert_eq!(tracker.update([pos("1", 10, Some(10.0))]), 0);
        assert_eq!(tracker.get("1", now()).unwrap().speed, Some(50.0));

        assert_eq!(tracker.update([pos("1", 1, Some(70.0))]), 1);
        assert_eq!(tracker.get("1", now()).unwrap().speed, Some(70.0));
    }

    #[test]
    fn find_by_either_identifier() {
        let mut tracker = PositionTracker::default();
        tracker.update([pos("10523", 2, Some(80.0))]);

        let ident = TrainIdent::new(Some("523".into()), Some("10523".into()));
        assert_eq!(tracker.find(&ident, now()).unwrap().id, "10523");
        assert!(tracker.find(&TrainIdent::advertised("524"), now()).is_none());
    }

    #[test]
    fn fresh_and_prune() {
        let mut tracker = PositionTracker::default();
        tracker.update([pos("a", 1, None), pos("b", 90, None), pos("c", 30, Some(0.0))]);

        let fresh: Vec<_> = tracker.fresh(now()).iter().map(|p| p.id.as_str()).collect();
        assert_eq!(fresh, vec!["a"]);

        assert_eq!(tracker.prune(now()), 2);
        assert_eq!(tracker.len(), 1);
    }
}
