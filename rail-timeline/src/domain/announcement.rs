//! Raw announcement types.
//!
//! A `RawAnnouncement` is one reported event for a train at a location,
//! already decoded from the feed's wire format into typed fields but not
//! yet reconciled with other announcements for the same stop.

use std::fmt;

use super::{DomainError, Signature, Timestamp};

/// Activity kind of an announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Activity {
    Arrival,
    Departure,
    /// The feed gave no usable activity text.
    Unknown,
}

impl Activity {
    /// Infer the activity kind from the feed's free-text activity field.
    ///
    /// # Examples
    ///
    /// ```
    /// use rail_timeline::domain::Activity;
    ///
    /// assert_eq!(Activity::infer(Some("Ankomst")), Activity::Arrival);
    /// assert_eq!(Activity::infer(Some("Avgang")), Activity::Departure);
    /// assert_eq!(Activity::infer(Some("departure")), Activity::Departure);
    /// assert_eq!(Activity::infer(Some("Passage")), Activity::Unknown);
    /// assert_eq!(Activity::infer(None), Activity::Unknown);
    /// ```
    pub fn infer(text: Option<&str>) -> Self {
        let Some(text) = text else {
            return Activity::Unknown;
        };
        let lower = text.trim().to_lowercase();

        if lower.starts_with("ank") || lower.starts_with("arr") {
            Activity::Arrival
        } else if lower.starts_with("avg") || lower.starts_with("dep") {
            Activity::Departure
        } else {
            Activity::Unknown
        }
    }

    /// Returns true if the activity names a side (arrival or departure).
    pub fn is_typed(&self) -> bool {
        !matches!(self, Activity::Unknown)
    }
}

/// Stable key identifying one train within a session.
///
/// Derived from the advertised ident when present, else the operational
/// number.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrainKey(String);

impl TrainKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TrainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrainKey({})", self.0)
    }
}

impl fmt::Display for TrainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Train identifiers as reported by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TrainIdent {
    /// Public train number shown to passengers
    pub advertised: Option<String>,
    /// Operational number used by traffic control (often equal to advertised)
    pub operational: Option<String>,
}

impl TrainIdent {
    pub fn new(advertised: Option<String>, operational: Option<String>) -> Self {
        Self {
            advertised: non_blank(advertised),
            operational: non_blank(operational),
        }
    }

    pub fn advertised(ident: impl Into<String>) -> Self {
        Self::new(Some(ident.into()), None)
    }

    /// Returns the key for this train, or `MissingIdentifier` if the
    /// feed gave neither identifier.
    pub fn key(&self) -> Result<TrainKey, DomainError> {
        self.advertised
            .as_deref()
            .or(self.operational.as_deref())
            .map(TrainKey::new)
            .ok_or(DomainError::MissingIdentifier)
    }

    /// Returns true if `id` names this train by either identifier.
    pub fn matches(&self, id: &str) -> bool {
        self.advertised.as_deref() == Some(id) || self.operational.as_deref() == Some(id)
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// A "from" or "to" location reference attached to an announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationRef {
    pub signature: Signature,
    /// Position within the reference list (lower first)
    pub order: u32,
    /// Importance (1 is the main origin/destination)
    pub priority: u32,
}

impl LocationRef {
    pub fn new(signature: Signature, order: u32, priority: u32) -> Self {
        Self {
            signature,
            order,
            priority,
        }
    }
}

/// One reported arrival or departure event for a train at a location.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAnnouncement {
    pub train: TrainIdent,
    pub location: Option<Signature>,
    /// Advertised location name, used when there is no signature
    pub location_name: Option<String>,
    pub activity: Activity,
    pub advertised: Option<Timestamp>,
    pub estimated: Option<Timestamp>,
    pub actual: Option<Timestamp>,
    pub track: Option<String>,
    pub canceled: bool,
    /// Deviation texts (e.g. "Inställt", "Spårändrat")
    pub deviations: Vec<String>,
    /// Product texts (e.g. "SJ Regional")
    pub product: Vec<String>,
    /// Information owner, usually the operator's public brand
    pub owner: Option<String>,
    pub operator: Option<String>,
    pub from: Vec<LocationRef>,
    pub to: Vec<LocationRef>,
    pub modified: Option<Timestamp>,
    /// Provider delivery sequence, when the feed exposes one
    pub sequence: Option<u64>,
}

impl RawAnnouncement {
    /// Creates an announcement with only the identifying fields set.
    pub fn new(train: TrainIdent, location: Option<Signature>, activity: Activity) -> Self {
        Self {
            train,
            location,
            location_name: None,
            activity,
            advertised: None,
            estimated: None,
            actual: None,
            track: None,
            canceled: false,
            deviations: Vec::new(),
            product: Vec::new(),
            owner: None,
            operator: None,
            from: Vec::new(),
            to: Vec::new(),
            modified: None,
            sequence: None,
        }
    }

    /// Label for the operating company: product text, else owner,
    /// else operator.
    pub fn operator_label(&self) -> Option<&str> {
        self.product
            .first()
            .map(String::as_str)
            .or(self.owner.as_deref())
            .or(self.operator.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_activity_variants() {
        assert_eq!(Activity::infer(Some("Ankomst")), Activity::Arrival);
        assert_eq!(Activity::infer(Some(" ankomst ")), Activity::Arrival);
        assert_eq!(Activity::infer(Some("Arrival")), Activity::Arrival);
        assert_eq!(Activity::infer(Some("Avgång")), Activity::Departure);
        assert_eq!(Activity::infer(Some("AVGANG")), Activity::Departure);
        assert_eq!(Activity::infer(Some("Departure")), Activity::Departure);
        assert_eq!(Activity::infer(Some("")), Activity::Unknown);
        assert!(!Activity::Unknown.is_typed());
        assert!(Activity::Arrival.is_typed());
    }

    #[test]
    fn key_prefers_advertised() {
        let ident = TrainIdent::new(Some("523".into()), Some("10523".into()));
        assert_eq!(ident.key().unwrap().as_str(), "523");

        let ident = TrainIdent::new(None, Some("10523".into()));
        assert_eq!(ident.key().unwrap().as_str(), "10523");
    }

    #[test]
    fn missing_identifier() {
        let ident = TrainIdent::new(None, None);
        assert!(matches!(ident.key(), Err(DomainError::MissingIdentifier)));

        // Blank strings count as missing
        let ident = TrainIdent::new(Some("  ".into()), Some(String::new()));
        assert!(matches!(ident.key(), Err(DomainError::MissingIdentifier)));
    }

    #[test]
    fn ident_matches_either() {
        let ident = TrainIdent::new(Some("523".into()), Some("10523".into()));
        assert!(ident.matches("523"));
        assert!(ident.matches("10523"));
        assert!(!ident.matches("524"));
    }

    #[test]
    fn operator_label_fallbacks() {
        let mut ann = RawAnnouncement::new(TrainIdent::advertised("1"), None, Activity::Arrival);
        assert_eq!(ann.operator_label(), None);

        ann.operator = Some("SJ".into());
        assert_eq!(ann.operator_label(), Some("SJ"));

        ann.owner = Some("SJ AB".into());
        assert_eq!(ann.operator_label(), Some("SJ AB"));

        ann.product = vec!["SJ Regional".into()];
        assert_eq!(ann.operator_label(), Some("SJ Regional"));
    }
}
