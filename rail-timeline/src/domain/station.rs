//! Location signature and station metadata types.

use std::fmt;

use super::Coordinate;

/// Maximum length of a location signature.
const MAX_SIGNATURE_LEN: usize = 8;

/// Error returned when parsing an invalid location signature.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid location signature: {reason}")]
pub struct InvalidSignature {
    reason: &'static str,
}

/// A location signature: the feed's short code for a station or
/// timing point (e.g. "Cst", "G", "M").
///
/// Signatures are 1 to 8 ASCII alphanumeric characters. Case is kept as
/// delivered and comparisons are exact, since the feed is consistent
/// about the casing it uses for a given location.
///
/// # Examples
///
/// ```
/// use rail_timeline::domain::Signature;
///
/// let cst = Signature::parse("Cst").unwrap();
/// assert_eq!(cst.as_str(), "Cst");
///
/// // Surrounding whitespace is trimmed
/// assert_eq!(Signature::parse(" G ").unwrap().as_str(), "G");
///
/// assert!(Signature::parse("").is_err());
/// assert!(Signature::parse("S t").is_err());
/// assert!(Signature::parse("TOOLONGSIG").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature(String);

impl Signature {
    /// Parse a location signature from a string.
    pub fn parse(s: &str) -> Result<Self, InvalidSignature> {
        let s = s.trim();

        if s.is_empty() {
            return Err(InvalidSignature {
                reason: "must not be empty",
            });
        }

        if s.len() > MAX_SIGNATURE_LEN {
            return Err(InvalidSignature {
                reason: "must be at most 8 characters",
            });
        }

        if !s.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(InvalidSignature {
                reason: "must be ASCII letters or digits",
            });
        }

        Ok(Signature(s.to_string()))
    }

    /// Returns the signature as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.0)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata for one station, as delivered by the station lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct StationInfo {
    pub signature: Signature,
    /// Advertised (display) name
    pub name: String,
    pub short_name: Option<String>,
    pub official_name: Option<String>,
    /// Position, when the lookup carries geometry for this station
    pub coordinate: Option<Coordinate>,
}

impl StationInfo {
    pub fn new(signature: Signature, name: impl Into<String>) -> Self {
        Self {
            signature,
            name: name.into(),
            short_name: None,
            official_name: None,
            coordinate: None,
        }
    }

    pub fn with_coordinate(mut self, coordinate: Coordinate) -> Self {
        self.coordinate = Some(coordinate);
        self
    }

    /// Shortest name available, for compact labels.
    pub fn display_short(&self) -> &str {
        self.short_name.as_deref().unwrap_or(&self.name)
    }
}
