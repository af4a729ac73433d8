//! Coordinates and distances.

use serde::{Deserialize, Serialize};

/// Radius in kilometres separating "nearby" restaurants from the rest.
///
/// The boundary is inclusive: a restaurant exactly 5.0 km away is nearby.
pub const NEARBY_RADIUS_KM: f64 = 5.0;

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Coordinates {
    /// Create new coordinates.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether the position has actually been set.
    ///
    /// The backend reports an unset location as `0.0` on either axis, so a
    /// zero component is treated as "no location".
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.latitude != 0.0 && self.longitude != 0.0
    }
}

/// A server-computed distance from the user, in kilometres.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct DistanceKm(f64);

impl DistanceKm {
    /// Stand-in for a distance the server did not report.
    ///
    /// Farther than any radius, so such a restaurant is never "nearby".
    pub const UNKNOWN: Self = Self(f64::MAX);

    /// Create a distance.
    #[must_use]
    pub const fn new(km: f64) -> Self {
        Self(km)
    }

    /// Kilometres as a float.
    #[must_use]
    pub const fn km(&self) -> f64 {
        self.0
    }

    /// Whether the distance falls within `radius_km` (inclusive).
    #[must_use]
    pub fn is_within(&self, radius_km: f64) -> bool {
        self.0 <= radius_km
    }

    /// Whether the server reported this distance.
    #[must_use]
    pub fn is_known(&self) -> bool {
        self.0 < f64::MAX
    }

    /// Whether the distance falls within [`NEARBY_RADIUS_KM`].
    #[must_use]
    pub fn is_nearby(&self) -> bool {
        self.is_within(NEARBY_RADIUS_KM)
    }
}

impl std::fmt::Display for DistanceKm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_known() {
            write!(f, "{:.1} km away", self.0)
        } else {
            f.write_str("distance unknown")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearby_boundary_is_inclusive() {
        assert!(DistanceKm::new(5.0).is_nearby());
        assert!(DistanceKm::new(4.99).is_nearby());
        assert!(!DistanceKm::new(5.01).is_nearby());
    }

    #[test]
    fn test_unset_coordinates() {
        assert!(!Coordinates::new(0.0, 0.0).is_set());
        assert!(!Coordinates::new(31.5, 0.0).is_set());
        assert!(Coordinates::new(31.5, 74.3).is_set());
    }

    #[test]
    fn test_distance_display() {
        assert_eq!(DistanceKm::new(3.26).to_string(), "3.3 km away");
        assert_eq!(DistanceKm::UNKNOWN.to_string(), "distance unknown");
    }

    #[test]
    fn test_unknown_distance_is_never_nearby() {
        assert!(!DistanceKm::UNKNOWN.is_known());
        assert!(!DistanceKm::UNKNOWN.is_nearby());
        assert!(!DistanceKm::UNKNOWN.is_within(20_000.0));
        assert!(DistanceKm::new(0.0).is_known());
    }
}
