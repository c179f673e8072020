//! Per-train route summaries.

use super::Signature;

/// Cached summary of a train's overall origin and destination.
///
/// `resolved` means the lookup has completed, whether or not it found
/// anything. A pending entry exists from the first time a train is seen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RouteInfo {
    pub from: Option<Signature>,
    pub to: Option<Signature>,
    pub resolved: bool,
}

impl RouteInfo {
    /// A placeholder for a train whose route has not been looked up yet.
    pub fn pending() -> Self {
        Self::default()
    }

    /// A completed lookup.
    pub fn resolved(from: Option<Signature>, to: Option<Signature>) -> Self {
        Self {
            from,
            to,
            resolved: true,
        }
    }

    /// Returns true if the lookup completed without finding either end.
    pub fn is_unknown(&self) -> bool {
        self.resolved && self.from.is_none() && self.to.is_none()
    }

    /// Returns true if `signature` is the destination.
    pub fn ends_at(&self, signature: &Signature) -> bool {
        self.to.as_ref() == Some(signature)
    }

    /// Returns true if `signature` is the origin.
    pub fn starts_at(&self, signature: &Signature) -> bool {
        self.from.as_ref() == Some(signature)
    }
}
