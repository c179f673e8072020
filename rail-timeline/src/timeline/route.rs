//! Route resolution from origin/destination references.

use crate::domain::{LocationRef, RouteInfo, Signature, Stop};

/// Pick the main reference: lowest priority, then lowest order.
pub fn primary_ref(refs: &[LocationRef]) -> Option<&Signature> {
    refs.iter()
        .min_by_key(|r| (r.priority, r.order))
        .map(|r| &r.signature)
}

/// Resolve a train's route.
///
/// Each end comes from the train's own references when it has any, else
/// from the first (origin) or last (destination) stop of its timeline
/// that has a signature. A single stop is neither origin nor destination,
/// so it never serves as a fallback.
pub fn resolve_route(from: &[LocationRef], to: &[LocationRef], stops: &[Stop]) -> RouteInfo {
    let ends = if stops.len() > 1 { stops } else { &[] };
    let origin = primary_ref(from)
        .cloned()
        .or_else(|| ends.iter().find_map(|s| s.signature.clone()));
    let destination = primary_ref(to)
        .cloned()
        .or_else(|| ends.iter().rev().find_map(|s| s.signature.clone()));

    RouteInfo::resolved(origin, destination)
}
