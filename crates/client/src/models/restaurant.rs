//! Cached restaurant listing.

use dinesphere_core::{Coordinates, DistanceKm, RestaurantId};
use serde::{Deserialize, Serialize};

/// Default rating used when the backend omits one.
pub const DEFAULT_RATING: f32 = 4.0;

/// A restaurant as shown in listings and stored in the offline cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRestaurant {
    /// Stable backend identifier (cache primary key).
    pub id: RestaurantId,
    /// Business name.
    pub name: String,
    /// Street address as entered by the restaurant.
    pub address: String,
    /// Image reference, if any.
    pub image_url: Option<String>,
    /// Position of the restaurant.
    pub location: Coordinates,
    /// Average rating, conventionally 0-5.
    pub rating: f32,
    /// Server-computed distance from the user.
    pub distance: DistanceKm,
    /// Whether the user has saved this restaurant (locally known value).
    pub is_saved: bool,
    /// Promotional discount text.
    pub discount: Option<String>,
    /// Contact phone number.
    pub phone: Option<String>,
}

impl CachedRestaurant {
    /// Whether the restaurant falls inside `radius_km` of the user.
    #[must_use]
    pub fn is_within(&self, radius_km: f64) -> bool {
        self.distance.is_within(radius_km)
    }

    /// Case-insensitive match against name and address.
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self.name.to_lowercase().contains(&query)
            || self.address.to_lowercase().contains(&query)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Build a restaurant with the given id and distance.
    pub fn restaurant(id: i32, distance_km: f64) -> CachedRestaurant {
        CachedRestaurant {
            id: RestaurantId::new(id),
            name: format!("Restaurant {id}"),
            address: format!("{id} Food Street, Gulberg, Lahore"),
            image_url: Some(format!("https://img.example.com/{id}.jpg")),
            location: Coordinates::new(31.5 + f64::from(id) / 1000.0, 74.3),
            rating: DEFAULT_RATING,
            distance: DistanceKm::new(distance_km),
            is_saved: false,
            discount: None,
            phone: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::restaurant;

    #[test]
    fn test_is_within_is_inclusive() {
        assert!(restaurant(1, 5.0).is_within(5.0));
        assert!(!restaurant(1, 5.1).is_within(5.0));
    }

    #[test]
    fn test_matches_name_and_address() {
        let r = restaurant(7, 1.0);
        assert!(r.matches("restaurant 7"));
        assert!(r.matches("GULBERG"));
        assert!(r.matches("  "));
        assert!(!r.matches("karachi"));
    }
}
