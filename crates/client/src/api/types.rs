//! Wire types for the DineSphere backend.
//!
//! The backend is a set of PHP scripts with two envelope conventions:
//!
//! - `{"success": bool, "message": "...", ...payload}` ([`SuccessEnvelope`])
//! - `{"status": "success" | ..., "data": [...]}` ([`StatusEnvelope`])
//!
//! PHP serialises database columns inconsistently, so numbers may arrive as
//! JSON strings and absent text as `""` or `"null"`. The lenient
//! deserializers in this module accept both; conversion into domain models
//! happens here, once, at the edge.

use dinesphere_core::{
    CategoryId, Coordinates, DistanceKm, MenuItemId, NotificationId, Price, RestaurantId,
    ReviewId, UserId,
};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};

use super::error::ApiError;
use crate::models::restaurant::DEFAULT_RATING;
use crate::models::{
    CachedCategory, CachedMenuItem, CachedRestaurant, ExistingReview, Notification, Review,
    ReviewOutcome, UserLocation, UserProfile,
};

// =============================================================================
// Lenient scalars
// =============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Loose {
    #[allow(clippy::cast_precision_loss)]
    fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
            Self::Bool(_) => None,
        };
        // "NaN" and "inf" parse, but are never real values here.
        value.filter(|f| f.is_finite())
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Float(_) | Self::Bool(_) => None,
        }
    }

    fn as_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Text(s) => matches!(s.trim(), "1" | "true" | "TRUE" | "True"),
        }
    }

    fn into_text(self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s,
        }
    }
}

fn loose_i32<'de, D: Deserializer<'de>>(d: D) -> Result<i32, D::Error> {
    let value = Loose::deserialize(d)?;
    value
        .as_i64()
        .and_then(|i| i32::try_from(i).ok())
        .ok_or_else(|| de::Error::custom("expected an integer id"))
}

fn loose_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Loose::deserialize(d)?
        .as_f64()
        .ok_or_else(|| de::Error::custom("expected a number"))
}

fn loose_opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(Option::<Loose>::deserialize(d)?.and_then(|v| v.as_f64()))
}

fn loose_opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(Option::<Loose>::deserialize(d)?.and_then(|v| v.as_i64()))
}

fn loose_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(Option::<Loose>::deserialize(d)?.is_some_and(|v| v.as_bool()))
}

fn loose_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<Loose>::deserialize(d)?
        .map(Loose::into_text)
        .unwrap_or_default())
}

/// Text field where `null`, `""` and `"null"` all mean absent.
fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Loose>::deserialize(d)?
        .map(Loose::into_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != "null"))
}

// =============================================================================
// Envelopes
// =============================================================================

/// Header of a `{"success": ..., "message": ...}` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuccessEnvelope {
    /// Whether the backend accepted the request.
    #[serde(default, deserialize_with = "loose_bool")]
    pub success: bool,
    /// Human readable outcome.
    #[serde(default, deserialize_with = "opt_text")]
    pub message: Option<String>,
}

impl SuccessEnvelope {
    /// Decode a success-envelope body into its payload `T`.
    ///
    /// The header is checked before the payload, so a rejected request is
    /// reported as [`ApiError::Rejected`] even when the payload fields are
    /// missing. `fallback` is used when the backend sends no message.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` if `success` is false, or
    /// `ApiError::Parse` if the body is not the expected JSON.
    pub fn decode<T: DeserializeOwned>(body: &str, fallback: &str) -> Result<T, ApiError> {
        let value: serde_json::Value = serde_json::from_str(body)?;
        let header = Self::deserialize(&value)?;

        if !header.success {
            return Err(ApiError::Rejected {
                message: header.message.unwrap_or_else(|| fallback.to_string()),
            });
        }

        Ok(T::deserialize(value)?)
    }
}

/// A `{"status": "success", "data": [...]}` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
pub struct StatusEnvelope<T> {
    /// `"success"` when the request was accepted.
    #[serde(default, deserialize_with = "loose_string")]
    pub status: String,
    /// Optional human readable outcome.
    #[serde(default, deserialize_with = "opt_text")]
    pub message: Option<String>,
    /// Result rows.
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T: DeserializeOwned> StatusEnvelope<T> {
    /// Decode a status-envelope body into its rows.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` unless `status` is `"success"`, or
    /// `ApiError::Parse` if the body is not the expected JSON.
    pub fn decode(body: &str, fallback: &str) -> Result<Vec<T>, ApiError> {
        let value: serde_json::Value = serde_json::from_str(body)?;
        let status = value
            .get("status")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();

        if !status.eq_ignore_ascii_case("success") {
            let message = value
                .get("message")
                .and_then(serde_json::Value::as_str)
                .filter(|m| !m.is_empty())
                .unwrap_or(fallback);
            return Err(ApiError::Rejected {
                message: message.to_string(),
            });
        }

        let envelope: Self = serde_json::from_value(value)?;
        Ok(envelope.data)
    }
}

// =============================================================================
// Auth
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct LoginPayload {
    pub user: LoginUser,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginUser {
    #[serde(deserialize_with = "loose_string")]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignupPayload {
    #[serde(deserialize_with = "loose_string")]
    pub user_id: String,
}

/// Parse a backend-issued user id.
pub(crate) fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    UserId::parse(raw).map_err(|e| ApiError::Parse(format!("user_id: {e}")))
}

// =============================================================================
// Location
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct LocationPayload {
    pub data: LocationWire,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LocationWire {
    #[serde(deserialize_with = "loose_f64")]
    latitude: f64,
    #[serde(deserialize_with = "loose_f64")]
    longitude: f64,
    #[serde(default, deserialize_with = "loose_string")]
    address: String,
}

impl From<LocationWire> for UserLocation {
    fn from(w: LocationWire) -> Self {
        Self {
            coordinates: Coordinates::new(w.latitude, w.longitude),
            address: w.address,
        }
    }
}

// =============================================================================
// Restaurants
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct RestaurantsPayload {
    #[serde(default)]
    pub restaurants: Vec<RestaurantWire>,
}

/// A restaurant row as sent by the listing and saved endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct RestaurantWire {
    #[serde(deserialize_with = "loose_i32")]
    restaurant_id: i32,
    #[serde(default, deserialize_with = "loose_string")]
    business_name: String,
    #[serde(default, deserialize_with = "loose_string")]
    address: String,
    #[serde(default, deserialize_with = "opt_text")]
    image_url: Option<String>,
    // The saved list names the image column differently.
    #[serde(default, deserialize_with = "opt_text")]
    restaurant_image: Option<String>,
    #[serde(deserialize_with = "loose_f64")]
    latitude: f64,
    #[serde(deserialize_with = "loose_f64")]
    longitude: f64,
    #[serde(default, deserialize_with = "loose_opt_f64")]
    rating: Option<f64>,
    #[serde(default, deserialize_with = "loose_opt_f64")]
    distance_km: Option<f64>,
    #[serde(default, deserialize_with = "loose_bool")]
    is_saved: bool,
    #[serde(default, deserialize_with = "opt_text")]
    discount: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    phone: Option<String>,
}

impl RestaurantWire {
    /// The restaurant id.
    #[must_use]
    pub const fn id(&self) -> RestaurantId {
        RestaurantId::new(self.restaurant_id)
    }
}

impl From<RestaurantWire> for CachedRestaurant {
    #[allow(clippy::cast_possible_truncation)] // ratings are 0-5
    fn from(w: RestaurantWire) -> Self {
        Self {
            id: RestaurantId::new(w.restaurant_id),
            name: w.business_name,
            address: w.address,
            image_url: w.image_url.or(w.restaurant_image),
            location: Coordinates::new(w.latitude, w.longitude),
            rating: w.rating.map_or(DEFAULT_RATING, |r| r as f32),
            distance: w.distance_km.map_or(DistanceKm::UNKNOWN, DistanceKm::new),
            is_saved: w.is_saved,
            discount: w.discount,
            phone: w.phone,
        }
    }
}

// =============================================================================
// Menu
// =============================================================================

/// A category row from `category(get).php`.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryWire {
    #[serde(deserialize_with = "loose_i32")]
    category_id: i32,
    #[serde(default, deserialize_with = "loose_string")]
    category_name: String,
    #[serde(default, deserialize_with = "opt_text")]
    category_image: Option<String>,
    #[serde(default, deserialize_with = "loose_opt_i64")]
    item_count: Option<i64>,
}

impl CategoryWire {
    /// Convert into a cache row owned by `restaurant_id`.
    #[must_use]
    pub fn into_cached(self, restaurant_id: RestaurantId) -> CachedCategory {
        CachedCategory {
            id: CategoryId::new(self.category_id),
            restaurant_id,
            name: self.category_name,
            image_url: self.category_image,
            item_count: self
                .item_count
                .and_then(|c| u32::try_from(c).ok())
                .unwrap_or_default(),
            selected: false,
        }
    }
}

/// A menu item row from `menu(get).php`.
#[derive(Debug, Clone, Deserialize)]
pub struct MenuItemWire {
    #[serde(deserialize_with = "loose_i32")]
    menu_id: i32,
    #[serde(default, deserialize_with = "loose_string")]
    menu_name: String,
    #[serde(default, deserialize_with = "opt_text")]
    menu_description: Option<String>,
    #[serde(deserialize_with = "loose_f64")]
    menu_price: f64,
    #[serde(default, deserialize_with = "opt_text")]
    menu_image: Option<String>,
}

impl MenuItemWire {
    /// Convert into a cache row owned by `category_id`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Parse` for a negative or non-finite price.
    pub fn into_cached(self, category_id: CategoryId) -> Result<CachedMenuItem, ApiError> {
        let price = Price::from_f64(self.menu_price).ok_or_else(|| {
            ApiError::Parse(format!(
                "menu item {} has invalid price {}",
                self.menu_id, self.menu_price
            ))
        })?;

        Ok(CachedMenuItem {
            id: MenuItemId::new(self.menu_id),
            category_id,
            name: self.menu_name,
            description: self.menu_description,
            price,
            image_url: self.menu_image,
        })
    }
}

// =============================================================================
// Reviews
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ReviewsPayload {
    #[serde(default)]
    pub reviews: Vec<ReviewWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewWire {
    #[serde(deserialize_with = "loose_i32")]
    review_id: i32,
    #[serde(deserialize_with = "loose_i32")]
    restaurant_id: i32,
    #[serde(deserialize_with = "loose_string")]
    user_id: String,
    #[serde(default, deserialize_with = "loose_opt_i64")]
    rating: Option<i64>,
    #[serde(default, deserialize_with = "loose_string")]
    comment: String,
    #[serde(default, deserialize_with = "loose_string")]
    created_at: String,
    #[serde(default, deserialize_with = "opt_text")]
    business_name: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    address: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    restaurant_image: Option<String>,
}

fn clamp_rating(rating: Option<i64>) -> u8 {
    rating
        .map(|r| r.clamp(0, 5))
        .and_then(|r| u8::try_from(r).ok())
        .unwrap_or_default()
}

impl TryFrom<ReviewWire> for Review {
    type Error = ApiError;

    fn try_from(w: ReviewWire) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ReviewId::new(w.review_id),
            restaurant_id: RestaurantId::new(w.restaurant_id),
            user_id: parse_user_id(&w.user_id)?,
            rating: clamp_rating(w.rating),
            comment: w.comment,
            created_at: w.created_at,
            business_name: w.business_name,
            address: w.address,
            restaurant_image: w.restaurant_image,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExistingReviewPayload {
    #[serde(default)]
    pub review: Option<ExistingReviewWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExistingReviewWire {
    #[serde(deserialize_with = "loose_i32")]
    review_id: i32,
    #[serde(default, deserialize_with = "loose_opt_i64")]
    rating: Option<i64>,
    #[serde(default, deserialize_with = "loose_string")]
    comment: String,
}

impl From<ExistingReviewWire> for ExistingReview {
    fn from(w: ExistingReviewWire) -> Self {
        Self {
            id: ReviewId::new(w.review_id),
            rating: clamp_rating(w.rating),
            comment: w.comment,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewSubmitPayload {
    #[serde(default, deserialize_with = "opt_text")]
    action: Option<String>,
}

impl ReviewSubmitPayload {
    pub(crate) fn outcome(&self) -> ReviewOutcome {
        match self.action.as_deref() {
            Some("updated") => ReviewOutcome::Updated,
            _ => ReviewOutcome::Saved,
        }
    }
}

// =============================================================================
// Profile
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct ProfilePayload {
    pub user: ProfileWire,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileWire {
    #[serde(default, deserialize_with = "loose_string")]
    first_name: String,
    #[serde(default, deserialize_with = "loose_string")]
    last_name: String,
    #[serde(default, deserialize_with = "opt_text")]
    email: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    gender: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    phone: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    profile_image_url: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    address: Option<String>,
}

impl From<ProfileWire> for UserProfile {
    fn from(w: ProfileWire) -> Self {
        Self {
            first_name: w.first_name,
            last_name: w.last_name,
            email: w.email,
            gender: w.gender,
            phone: w.phone,
            profile_image_url: w.profile_image_url,
            address: w.address,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileUpdatePayload {
    #[serde(default, deserialize_with = "opt_text")]
    pub image_url: Option<String>,
}

// =============================================================================
// Notifications
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NotificationsPayload {
    #[serde(default)]
    pub notifications: Vec<NotificationWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NotificationWire {
    #[serde(deserialize_with = "loose_i32")]
    notification_id: i32,
    #[serde(deserialize_with = "loose_i32")]
    restaurant_id: i32,
    #[serde(default, deserialize_with = "loose_string")]
    title: String,
    #[serde(default, deserialize_with = "loose_string")]
    message: String,
    #[serde(default, deserialize_with = "loose_string")]
    created_at: String,
    #[serde(default, deserialize_with = "loose_string")]
    business_name: String,
    #[serde(default, deserialize_with = "opt_text")]
    restaurant_image: Option<String>,
}

impl From<NotificationWire> for Notification {
    fn from(w: NotificationWire) -> Self {
        Self {
            id: NotificationId::new(w.notification_id),
            restaurant_id: RestaurantId::new(w.restaurant_id),
            title: w.title,
            message: w.message,
            created_at: w.created_at,
            business_name: w.business_name,
            restaurant_image: w.restaurant_image,
        }
    }
}

/// Payload-less success responses.
#[derive(Debug, Deserialize)]
pub(crate) struct Empty {}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_rejection_uses_message() {
        let body = r#"{"success": false, "message": "Invalid email or password"}"#;
        let err = SuccessEnvelope::decode::<LoginPayload>(body, "Login failed").unwrap_err();
        assert!(matches!(err, ApiError::Rejected { message } if message == "Invalid email or password"));
    }

    #[test]
    fn test_success_envelope_rejection_falls_back() {
        let body = r#"{"success": false}"#;
        let err = SuccessEnvelope::decode::<Empty>(body, "Failed to save").unwrap_err();
        assert!(matches!(err, ApiError::Rejected { message } if message == "Failed to save"));
    }

    #[test]
    fn test_success_envelope_accepts_numeric_flag() {
        let body = r#"{"success": 1, "user": {"user_id": 17}}"#;
        let payload: LoginPayload = SuccessEnvelope::decode(body, "Login failed").unwrap();
        assert_eq!(payload.user.user_id, "17");
    }

    #[test]
    fn test_status_envelope() {
        let body = r#"{"status": "success", "data": [
            {"category_id": "3", "category_name": "BBQ", "category_image": "", "item_count": "4"}
        ]}"#;
        let rows = StatusEnvelope::<CategoryWire>::decode(body, "No categories").unwrap();
        let cat = rows.into_iter().next().unwrap().into_cached(RestaurantId::new(9));
        assert_eq!(cat.id, CategoryId::new(3));
        assert_eq!(cat.restaurant_id, RestaurantId::new(9));
        assert_eq!(cat.image_url, None);
        assert_eq!(cat.item_count, 4);

        let err = StatusEnvelope::<CategoryWire>::decode(r#"{"status": "error"}"#, "No categories")
            .unwrap_err();
        assert!(matches!(err, ApiError::Rejected { message } if message == "No categories"));
    }

    #[test]
    fn test_restaurant_wire_defaults_and_strings() {
        let json = r#"{
            "restaurant_id": "12", "business_name": "Karahi House", "address": "Gulberg",
            "latitude": "31.5", "longitude": 74.3, "distance_km": "2.25",
            "image_url": "null", "discount": "10% off"
        }"#;
        let wire: RestaurantWire = serde_json::from_str(json).unwrap();
        let r = CachedRestaurant::from(wire);
        assert_eq!(r.id, RestaurantId::new(12));
        assert_eq!(r.rating, DEFAULT_RATING);
        assert_eq!(r.distance.km(), 2.25);
        assert_eq!(r.image_url, None);
        assert_eq!(r.discount.as_deref(), Some("10% off"));
        assert!(!r.is_saved);
    }

    #[test]
    fn test_saved_list_uses_restaurant_image() {
        let json = r#"{"restaurant_id": 1, "business_name": "A", "address": "B",
            "latitude": 1.0, "longitude": 2.0, "restaurant_image": "a.jpg"}"#;
        let r = CachedRestaurant::from(serde_json::from_str::<RestaurantWire>(json).unwrap());
        assert_eq!(r.image_url.as_deref(), Some("a.jpg"));
        assert_eq!(r.distance, DistanceKm::UNKNOWN);
        assert!(!r.distance.is_nearby());
    }

    #[test]
    fn test_non_finite_numbers_are_rejected() {
        let json = r#"{"restaurant_id": 4, "business_name": "A", "address": "B",
            "latitude": 1.0, "longitude": 2.0, "distance_km": "NaN", "rating": "inf"}"#;
        let r = CachedRestaurant::from(serde_json::from_str::<RestaurantWire>(json).unwrap());
        assert_eq!(r.distance, DistanceKm::UNKNOWN);
        assert!(r.distance.km().is_finite());
        assert_eq!(r.rating, DEFAULT_RATING);

        let json = r#"{"restaurant_id": 4, "business_name": "A", "address": "B",
            "latitude": "NaN", "longitude": 2.0}"#;
        assert!(serde_json::from_str::<RestaurantWire>(json).is_err());
    }

    #[test]
    fn test_menu_item_price_conversion() {
        let json = r#"{"menu_id": 5, "menu_name": "Naan", "menu_price": "40.5"}"#;
        let wire: MenuItemWire = serde_json::from_str(json).unwrap();
        let item = wire.into_cached(CategoryId::new(2)).unwrap();
        assert_eq!(item.price.to_string(), "$ 40.50");

        let json = r#"{"menu_id": 6, "menu_name": "Bad", "menu_price": -1}"#;
        let wire: MenuItemWire = serde_json::from_str(json).unwrap();
        assert!(wire.into_cached(CategoryId::new(2)).is_err());
    }

    #[test]
    fn test_review_outcome() {
        let p: ReviewSubmitPayload = serde_json::from_str(r#"{"action": "updated"}"#).unwrap();
        assert_eq!(p.outcome(), ReviewOutcome::Updated);
        let p: ReviewSubmitPayload = serde_json::from_str("{}").unwrap();
        assert_eq!(p.outcome(), ReviewOutcome::Saved);
    }

    #[test]
    fn test_review_rating_is_clamped() {
        let json = r#"{"review_id": 1, "restaurant_id": 2, "user_id": 3, "rating": 9,
            "comment": "Great", "created_at": "2025-01-01"}"#;
        let review = Review::try_from(serde_json::from_str::<ReviewWire>(json).unwrap()).unwrap();
        assert_eq!(review.rating, 5);
        assert_eq!(review.user_id.as_str(), "3");
    }
}
