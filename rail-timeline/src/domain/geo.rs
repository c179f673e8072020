//! Great-circle geometry on WGS84 coordinates.

/// Mean Earth radius used for haversine distances.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 latitude/longitude pair, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns true if both components are finite and within range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Haversine distance to `other`, in metres.
    ///
    /// # Examples
    ///
    /// ```
    /// use rail_timeline::domain::Coordinate;
    ///
    /// let stockholm = Coordinate::new(59.3303, 18.0581);
    /// assert_eq!(stockholm.distance_to(&stockholm), 0.0);
    ///
    /// // One degree of latitude is ~111 km
    /// let north = Coordinate::new(60.3303, 18.0581);
    /// let d = stockholm.distance_to(&north);
    /// assert!((d - 111_195.0).abs() < 10.0);
    /// ```
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_M * c
    }

    /// Initial great-circle bearing from `self` towards `other`, in
    /// degrees clockwise from north, normalized to `[0, 360)`.
    pub fn bearing_to(&self, other: &Coordinate) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();

        let y = d_lon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();

        normalize_degrees(y.atan2(x).to_degrees())
    }
}

/// Normalize an angle to `[0, 360)`.
pub fn normalize_degrees(deg: f64) -> f64 {
    let d = deg.rem_euclid(360.0);
    // rem_euclid can return 360.0 for tiny negative inputs
    if d >= 360.0 { 0.0 } else { d }
}

/// Smallest angle between two headings, folded to `[0, 180]`.
///
/// # Examples
///
/// ```
/// use rail_timeline::domain::angular_difference;
///
/// assert_eq!(angular_difference(10.0, 350.0), 20.0);
/// assert_eq!(angular_difference(0.0, 180.0), 180.0);
/// assert_eq!(angular_difference(90.0, 450.0), 0.0);
/// ```
pub fn angular_difference(a: f64, b: f64) -> f64 {
    let diff = normalize_degrees(a - b);
    if diff > 180.0 { 360.0 - diff } else { diff }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn known_distance() {
        // Stockholm C to Uppsala C is roughly 64 km as the crow flies
        let cst = Coordinate::new(59.3303, 18.0581);
        let u = Coordinate::new(59.8586, 17.6454);
        let d = cst.distance_to(&u);
        assert!(close(d, 63_200.0, 1_000.0), "got {d}");
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Coordinate::new(59.0, 18.0);
        let b = Coordinate::new(57.7, 11.97);
        assert!(close(a.distance_to(&b), b.distance_to(&a), 1e-6));
    }

    #[test]
    fn cardinal_bearings() {
        let origin = Coordinate::new(59.0, 18.0);
        assert!(close(origin.bearing_to(&Coordinate::new(60.0, 18.0)), 0.0, 1e-6));
        assert!(close(origin.bearing_to(&Coordinate::new(58.0, 18.0)), 180.0, 1e-6));

        let east = origin.bearing_to(&Coordinate::new(59.0, 18.1));
        assert!(close(east, 90.0, 0.1), "got {east}");

        let west = origin.bearing_to(&Coordinate::new(59.0, 17.9));
        assert!(close(west, 270.0, 0.1), "got {west}");
    }

    #[test]
    fn normalize() {
        assert_eq!(normalize_degrees(0.0), 0.0);
        assert_eq!(normalize_degrees(360.0), 0.0);
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(725.0), 5.0);
    }

    #[test]
    fn angular_difference_folds() {
        assert_eq!(angular_difference(0.0, 0.0), 0.0);
        assert_eq!(angular_difference(350.0, 10.0), 20.0);
        assert_eq!(angular_difference(90.0, 270.0), 180.0);
        assert_eq!(angular_difference(200.0, 90.0), 110.0);
        assert_eq!(angular_difference(-45.0, 45.0), 90.0);
    }

    #[test]
    fn validity() {
        assert!(Coordinate::new(59.0, 18.0).is_valid());
        assert!(!Coordinate::new(91.0, 18.0).is_valid());
        assert!(!Coordinate::new(59.0, f64::NAN).is_valid());
    }
}
