//! Remote-only account data: location, profile, reviews, notifications.
//!
//! None of these are cached; they are fetched on demand while online.

use dinesphere_core::{Coordinates, NotificationId, RestaurantId, ReviewId, UserId};
use serde::{Deserialize, Serialize};

/// Shorten an address to its last three comma-separated parts.
///
/// Geocoded addresses are long ("House 1, Street 2, Block C, Gulberg,
/// Lahore, Pakistan"); listing headers only show the tail.
#[must_use]
pub fn short_address(address: &str) -> String {
    let parts: Vec<&str> = address.split(',').collect();
    if parts.len() > 3 {
        parts
            .iter()
            .skip(parts.len() - 3)
            .copied()
            .collect::<Vec<_>>()
            .join(",")
    } else {
        address.to_string()
    }
}

/// The user's saved location, as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLocation {
    /// Position used for distance-filtered listings.
    pub coordinates: Coordinates,
    /// Full geocoded address.
    pub address: String,
}

impl UserLocation {
    /// Address shortened for display.
    #[must_use]
    pub fn display_address(&self) -> String {
        short_address(&self.address)
    }
}

/// A location change to push to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationUpdate {
    /// New position.
    pub coordinates: Coordinates,
    /// Human readable address for the position.
    pub address: String,
}

/// Profile details shown on the profile screen.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserProfile {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Account email.
    pub email: Option<String>,
    /// Free-form gender field.
    pub gender: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Avatar reference.
    pub profile_image_url: Option<String>,
    /// Saved address.
    pub address: Option<String>,
}

impl UserProfile {
    /// Full name, falling back to the email, then to a generic label.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if !full.is_empty() {
            return full.to_string();
        }
        self.email
            .clone()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| "DineSphere User".to_string())
    }
}

/// New avatar for a profile update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileImage {
    /// Raw image bytes; sent base64-encoded.
    Upload(Vec<u8>),
    /// Keep an already uploaded image.
    Existing(String),
}

/// Editable profile fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Phone number.
    pub phone: String,
    /// Free-form gender field.
    pub gender: String,
    /// Avatar change, if any.
    pub image: Option<ProfileImage>,
}

/// A review the user wrote for a restaurant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// Review identifier.
    pub id: ReviewId,
    /// Reviewed restaurant.
    pub restaurant_id: RestaurantId,
    /// Author.
    pub user_id: UserId,
    /// Star rating, 0-5 (0 means "visited, not rated yet").
    pub rating: u8,
    /// Review text.
    pub comment: String,
    /// Backend timestamp, passed through verbatim.
    pub created_at: String,
    /// Restaurant name (joined by the backend).
    pub business_name: Option<String>,
    /// Restaurant address (joined by the backend).
    pub address: Option<String>,
    /// Restaurant image (joined by the backend).
    pub restaurant_image: Option<String>,
}

/// A review to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewDraft {
    /// Restaurant being reviewed.
    pub restaurant_id: RestaurantId,
    /// Star rating, 1-5.
    pub rating: u8,
    /// Review text (may be empty).
    pub comment: String,
}

impl ReviewDraft {
    /// Lowest accepted star rating.
    pub const MIN_RATING: u8 = 1;
    /// Highest accepted star rating.
    pub const MAX_RATING: u8 = 5;

    /// Whether the rating is within the accepted range.
    #[must_use]
    pub const fn has_valid_rating(&self) -> bool {
        self.rating >= Self::MIN_RATING && self.rating <= Self::MAX_RATING
    }
}

/// The user's existing review of one restaurant, used to prefill the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingReview {
    /// Review identifier.
    pub id: ReviewId,
    /// Star rating.
    pub rating: u8,
    /// Review text.
    pub comment: String,
}

/// What the backend did with a submitted review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewOutcome {
    /// A new review was stored.
    Saved,
    /// The user's previous review was replaced.
    Updated,
}

/// A promotional notification pushed by a restaurant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification identifier.
    pub id: NotificationId,
    /// Sending restaurant.
    pub restaurant_id: RestaurantId,
    /// Title line.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Backend timestamp, passed through verbatim.
    pub created_at: String,
    /// Restaurant name.
    pub business_name: String,
    /// Restaurant image.
    pub restaurant_image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_address_keeps_last_three_parts() {
        assert_eq!(
            short_address("House 1, Street 2, Block C, Gulberg, Lahore, Pakistan"),
            " Gulberg, Lahore, Pakistan"
        );
        assert_eq!(short_address("Lahore, Pakistan"), "Lahore, Pakistan");
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut profile = UserProfile {
            first_name: "Ayesha".into(),
            last_name: "Khan".into(),
            email: Some("ayesha@example.com".into()),
            ..UserProfile::default()
        };
        assert_eq!(profile.display_name(), "Ayesha Khan");

        profile.first_name.clear();
        profile.last_name.clear();
        assert_eq!(profile.display_name(), "ayesha@example.com");

        profile.email = None;
        assert_eq!(profile.display_name(), "DineSphere User");
    }

    #[test]
    fn test_review_draft_rating_bounds() {
        let mut draft = ReviewDraft {
            restaurant_id: RestaurantId::new(1),
            rating: 0,
            comment: String::new(),
        };
        assert!(!draft.has_valid_rating());
        draft.rating = 5;
        assert!(draft.has_valid_rating());
        draft.rating = 6;
        assert!(!draft.has_valid_rating());
    }
}
