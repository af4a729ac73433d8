//! DineSphere backend HTTP client.
//!
//! One method per PHP script the client uses. Requests are plain query
//! strings (GET) or url-encoded forms (POST); responses use one of the two
//! envelopes in [`super::types`].

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use dinesphere_core::{CategoryId, Coordinates, Email, RestaurantId, UserId};
use reqwest::Response;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use super::error::ApiError;
use super::types::{
    CategoryWire, Empty, ExistingReviewPayload, LocationPayload, LoginPayload, MenuItemWire,
    NotificationsPayload, ProfilePayload, ProfileUpdatePayload, RestaurantWire,
    RestaurantsPayload, ReviewSubmitPayload, ReviewsPayload, SignupPayload, StatusEnvelope,
    SuccessEnvelope, parse_user_id,
};
use crate::config::BackendConfig;
use crate::models::{
    CachedCategory, CachedMenuItem, ExistingReview, LocationUpdate, Notification, ProfileImage,
    ProfileUpdate, Review, ReviewDraft, ReviewOutcome, UserLocation, UserProfile,
};

/// Longest response body snippet kept in [`ApiError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// DineSphere backend client.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: Url,
    restaurant_url: Url,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("restaurant_url", &self.inner.restaurant_url.as_str())
            .finish_non_exhaustive()
    }
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built (e.g. no
    /// TLS backend available).
    pub fn new(config: &BackendConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("dinesphere-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client,
                base_url: config.base_url.clone(),
                restaurant_url: config.restaurant_url.clone(),
            }),
        })
    }

    /// Backend root URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// Log in and return the backend user id.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` for wrong credentials, or another
    /// `ApiError` if the request fails.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &Email, password: &SecretString) -> Result<UserId, ApiError> {
        let body = self
            .post_form(
                "login.php",
                &[
                    ("email", email.as_str()),
                    ("password", password.expose_secret()),
                ],
            )
            .await?;
        let payload: LoginPayload = SuccessEnvelope::decode(&body, "Login failed")?;
        parse_user_id(&payload.user.user_id)
    }

    /// Create an account and return the new user id.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` if the email is taken, or another
    /// `ApiError` if the request fails.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn signup(&self, email: &Email, password: &SecretString) -> Result<UserId, ApiError> {
        let body = self
            .post_form(
                "signup.php",
                &[
                    ("email", email.as_str()),
                    ("password", password.expose_secret()),
                ],
            )
            .await?;
        let payload: SignupPayload = SuccessEnvelope::decode(&body, "Signup failed")?;
        parse_user_id(&payload.user_id)
    }

    /// Set a new password for the account registered under `email`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` if the backend refuses, or another
    /// `ApiError` if the request fails.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn update_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<(), ApiError> {
        let body = self
            .post_form(
                "update_password.php",
                &[
                    ("email", email.as_str()),
                    ("password", password.expose_secret()),
                ],
            )
            .await?;
        let _: Empty = SuccessEnvelope::decode(&body, "Failed to update password")?;
        Ok(())
    }

    // =========================================================================
    // Location
    // =========================================================================

    /// Fetch the user's saved location.
    ///
    /// Returns `None` when the backend has no location on file.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the body is malformed.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn user_location(&self, user_id: &UserId) -> Result<Option<UserLocation>, ApiError> {
        let url = self.url("get_user_location.php", &[("user_id", user_id.as_str())])?;
        let body = self.get(url).await?;

        match SuccessEnvelope::decode::<LocationPayload>(&body, "Location not found") {
            Ok(payload) => Ok(Some(payload.data.into())),
            Err(ApiError::Rejected { message }) => {
                debug!(message = %message, "No location on file");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Store a new location for the user.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the backend refuses.
    #[instrument(skip(self, update), fields(user_id = %user_id))]
    pub async fn update_location(
        &self,
        user_id: &UserId,
        update: &LocationUpdate,
    ) -> Result<(), ApiError> {
        let latitude = update.coordinates.latitude.to_string();
        let longitude = update.coordinates.longitude.to_string();
        let body = self
            .post_form(
                "update_location.php",
                &[
                    ("user_id", user_id.as_str()),
                    ("latitude", &latitude),
                    ("longitude", &longitude),
                    ("address", &update.address),
                ],
            )
            .await?;
        let _: Empty = SuccessEnvelope::decode(&body, "Failed to update location")?;
        Ok(())
    }

    // =========================================================================
    // Listings
    // =========================================================================

    /// Restaurants within `radius_km` of `location`, filtered server-side.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the body is malformed.
    #[instrument(skip(self))]
    pub async fn nearby_restaurants(
        &self,
        location: Coordinates,
        radius_km: f64,
    ) -> Result<Vec<RestaurantWire>, ApiError> {
        let latitude = location.latitude.to_string();
        let longitude = location.longitude.to_string();
        let radius = radius_km.to_string();
        let url = self.url(
            "get_restaurants.php",
            &[
                ("latitude", &latitude),
                ("longitude", &longitude),
                ("max_distance", &radius),
            ],
        )?;

        let body = self.get(url).await?;
        let payload: RestaurantsPayload =
            SuccessEnvelope::decode(&body, "Failed to load restaurants")?;
        debug!(count = payload.restaurants.len(), "Fetched nearby restaurants");
        Ok(payload.restaurants)
    }

    /// Every restaurant, with distances from `location`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the body is malformed.
    #[instrument(skip(self))]
    pub async fn all_restaurants(
        &self,
        location: Coordinates,
    ) -> Result<Vec<RestaurantWire>, ApiError> {
        let latitude = location.latitude.to_string();
        let longitude = location.longitude.to_string();
        let url = self.url(
            "get_all_restaurants.php",
            &[("latitude", &latitude), ("longitude", &longitude)],
        )?;

        let body = self.get(url).await?;
        let payload: RestaurantsPayload =
            SuccessEnvelope::decode(&body, "Failed to load restaurants")?;
        debug!(count = payload.restaurants.len(), "Fetched all restaurants");
        Ok(payload.restaurants)
    }

    // =========================================================================
    // Saved
    // =========================================================================

    /// The user's saved restaurants.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the body is malformed.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn saved_restaurants(&self, user_id: &UserId) -> Result<Vec<RestaurantWire>, ApiError> {
        let url = self.url("saved(get).php", &[("user_id", user_id.as_str())])?;
        let body = self.get(url).await?;
        let payload: RestaurantsPayload =
            SuccessEnvelope::decode(&body, "Failed to load saved restaurants")?;
        Ok(payload.restaurants)
    }

    /// Add a restaurant to the user's saved list.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the backend refuses.
    #[instrument(skip(self), fields(user_id = %user_id, restaurant_id = %restaurant_id))]
    pub async fn save_restaurant(
        &self,
        user_id: &UserId,
        restaurant_id: RestaurantId,
    ) -> Result<(), ApiError> {
        self.saved_mutation("saved(post).php", user_id, restaurant_id, "Failed to save")
            .await
    }

    /// Remove a restaurant from the user's saved list.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the backend refuses.
    #[instrument(skip(self), fields(user_id = %user_id, restaurant_id = %restaurant_id))]
    pub async fn unsave_restaurant(
        &self,
        user_id: &UserId,
        restaurant_id: RestaurantId,
    ) -> Result<(), ApiError> {
        self.saved_mutation("saved(delete).php", user_id, restaurant_id, "Failed to unsave")
            .await
    }

    async fn saved_mutation(
        &self,
        script: &str,
        user_id: &UserId,
        restaurant_id: RestaurantId,
        fallback: &str,
    ) -> Result<(), ApiError> {
        let restaurant_id = restaurant_id.to_string();
        let body = self
            .post_form(
                script,
                &[("user_id", user_id.as_str()), ("restaurant_id", &restaurant_id)],
            )
            .await?;
        let _: Empty = SuccessEnvelope::decode(&body, fallback)?;
        Ok(())
    }

    // =========================================================================
    // Menu
    // =========================================================================

    /// Menu categories of a restaurant.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the body is malformed.
    #[instrument(skip(self), fields(restaurant_id = %restaurant_id))]
    pub async fn categories(&self, restaurant_id: RestaurantId) -> Result<Vec<CachedCategory>, ApiError> {
        let id = restaurant_id.to_string();
        let url = Self::join(&self.inner.restaurant_url, "category(get).php", &[("restaurant_id", &id)])?;
        let body = self.get(url).await?;

        let rows = StatusEnvelope::<CategoryWire>::decode(&body, "No categories found")?;
        Ok(rows
            .into_iter()
            .map(|row| row.into_cached(restaurant_id))
            .collect())
    }

    /// Items in a menu category.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or a row is malformed.
    #[instrument(skip(self), fields(category_id = %category_id))]
    pub async fn menu_items(&self, category_id: CategoryId) -> Result<Vec<CachedMenuItem>, ApiError> {
        let id = category_id.to_string();
        let url = Self::join(&self.inner.restaurant_url, "menu(get).php", &[("category_id", &id)])?;
        let body = self.get(url).await?;

        let rows = StatusEnvelope::<MenuItemWire>::decode(&body, "No menu items found")?;
        rows.into_iter()
            .map(|row| row.into_cached(category_id))
            .collect()
    }

    // =========================================================================
    // Reviews
    // =========================================================================

    /// Every review the user has written.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or a row is malformed.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn reviews(&self, user_id: &UserId) -> Result<Vec<Review>, ApiError> {
        let url = self.url("review(get).php", &[("user_id", user_id.as_str())])?;
        let body = self.get(url).await?;
        let payload: ReviewsPayload = self.decode_list(&body, "No reviews found")?;
        payload.reviews.into_iter().map(TryInto::try_into).collect()
    }

    /// The user's review of one restaurant, if any.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the body is malformed.
    #[instrument(skip(self), fields(user_id = %user_id, restaurant_id = %restaurant_id))]
    pub async fn existing_review(
        &self,
        user_id: &UserId,
        restaurant_id: RestaurantId,
    ) -> Result<Option<ExistingReview>, ApiError> {
        let id = restaurant_id.to_string();
        let url = self.url(
            "review(get).php",
            &[("user_id", user_id.as_str()), ("restaurant_id", &id)],
        )?;
        let body = self.get(url).await?;

        match SuccessEnvelope::decode::<ExistingReviewPayload>(&body, "No review found") {
            Ok(payload) => Ok(payload.review.map(Into::into)),
            Err(ApiError::Rejected { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Submit or replace the user's review of a restaurant.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the backend refuses.
    #[instrument(skip(self, draft), fields(user_id = %user_id, restaurant_id = %draft.restaurant_id))]
    pub async fn submit_review(
        &self,
        user_id: &UserId,
        draft: &ReviewDraft,
    ) -> Result<ReviewOutcome, ApiError> {
        let restaurant_id = draft.restaurant_id.to_string();
        let rating = draft.rating.to_string();
        let body = self
            .post_form(
                "review(post).php",
                &[
                    ("user_id", user_id.as_str()),
                    ("restaurant_id", &restaurant_id),
                    ("rating", &rating),
                    ("comment", &draft.comment),
                ],
            )
            .await?;
        let payload: ReviewSubmitPayload = SuccessEnvelope::decode(&body, "Failed to submit review")?;
        Ok(payload.outcome())
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Fetch the user's profile.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the body is malformed.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn user_profile(&self, user_id: &UserId) -> Result<UserProfile, ApiError> {
        let url = self.url("get_user_details.php", &[("user_id", user_id.as_str())])?;
        let body = self.get(url).await?;
        let payload: ProfilePayload = SuccessEnvelope::decode(&body, "Failed to load profile")?;
        Ok(payload.user.into())
    }

    /// Update profile fields, optionally uploading a new avatar.
    ///
    /// Returns the avatar URL the backend now has on file, if any.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the backend refuses.
    #[instrument(skip(self, update), fields(user_id = %user_id))]
    pub async fn update_profile(
        &self,
        user_id: &UserId,
        update: &ProfileUpdate,
    ) -> Result<Option<String>, ApiError> {
        let mut form: Vec<(&str, String)> = vec![
            ("user_id", user_id.as_str().to_string()),
            ("first_name", update.first_name.clone()),
            ("last_name", update.last_name.clone()),
            ("phone", update.phone.clone()),
            ("gender", update.gender.clone()),
        ];
        match &update.image {
            Some(ProfileImage::Upload(bytes)) => form.push(("base64_image", STANDARD.encode(bytes))),
            Some(ProfileImage::Existing(url)) => form.push(("profile_image_url", url.clone())),
            None => {}
        }

        let body = self.post_form_owned("update_profile.php", &form).await?;
        let payload: ProfileUpdatePayload =
            SuccessEnvelope::decode(&body, "Failed to update profile")?;
        Ok(payload.image_url)
    }

    /// Register the push device token for the user.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the backend refuses.
    #[instrument(skip(self, device_token), fields(user_id = %user_id))]
    pub async fn update_device_token(
        &self,
        user_id: &UserId,
        device_token: &str,
    ) -> Result<(), ApiError> {
        let body = self
            .post_form(
                "update_device_token.php",
                &[("user_id", user_id.as_str()), ("device_token", device_token)],
            )
            .await?;
        let _: Empty = SuccessEnvelope::decode(&body, "Failed to update device token")?;
        Ok(())
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Notifications for the user, newest first as sent by the backend.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the body is malformed.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn notifications(&self, user_id: &UserId) -> Result<Vec<Notification>, ApiError> {
        let url = self.url("notification(get).php", &[("user_id", user_id.as_str())])?;
        let body = self.get(url).await?;
        let payload: NotificationsPayload = self.decode_list(&body, "Failed to load notifications")?;
        Ok(payload.notifications.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Plumbing
    // =========================================================================

    fn url(&self, script: &str, query: &[(&str, &str)]) -> Result<Url, ApiError> {
        Self::join(&self.inner.base_url, script, query)
    }

    fn join(root: &Url, script: &str, query: &[(&str, &str)]) -> Result<Url, ApiError> {
        let mut url = root.join(script)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Decode a list endpoint where "nothing found" is reported as a
    /// rejection. An empty list is returned instead.
    fn decode_list<T: DeserializeOwned + Default>(
        &self,
        body: &str,
        fallback: &str,
    ) -> Result<T, ApiError> {
        match SuccessEnvelope::decode::<T>(body, fallback) {
            Err(ApiError::Rejected { message }) => {
                debug!(base_url = %self.inner.base_url, message = %message, "Backend returned no rows");
                Ok(T::default())
            }
            other => other,
        }
    }

    async fn get(&self, url: Url) -> Result<String, ApiError> {
        debug!(url = %url, "GET");
        let response = self.inner.client.get(url).send().await?;
        Self::read_body(response).await
    }

    async fn post_form(&self, script: &str, form: &[(&str, &str)]) -> Result<String, ApiError> {
        let url = self.url(script, &[])?;
        debug!(url = %url, "POST");
        let response = self.inner.client.post(url).form(form).send().await?;
        Self::read_body(response).await
    }

    async fn post_form_owned(
        &self,
        script: &str,
        form: &[(&str, String)],
    ) -> Result<String, ApiError> {
        let url = self.url(script, &[])?;
        debug!(url = %url, "POST");
        let response = self.inner.client.post(url).form(form).send().await?;
        Self::read_body(response).await
    }

    async fn read_body(response: Response) -> Result<String, ApiError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Backend returned error status");
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::fixtures::client_for;

    fn user() -> UserId {
        UserId::parse("17").unwrap()
    }

    #[tokio::test]
    async fn test_login_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login.php"))
            .and(body_string_contains("email=ayesha%40example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "message": "Login successful",
                "user": {"user_id": 17}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let email = Email::parse("ayesha@example.com").unwrap();
        let id = client
            .login(&email, &SecretString::from("hunter22"))
            .await
            .unwrap();
        assert_eq!(id.as_str(), "17");
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "message": "Invalid email or password"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let email = Email::parse("ayesha@example.com").unwrap();
        let err = client
            .login(&email, &SecretString::from("wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Rejected { message } if message == "Invalid email or password"));
    }

    #[tokio::test]
    async fn test_nearby_sends_radius() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get_restaurants.php"))
            .and(query_param("latitude", "31.5"))
            .and(query_param("longitude", "74.3"))
            .and(query_param("max_distance", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "restaurants": [{
                    "restaurant_id": 1, "business_name": "A", "address": "X",
                    "latitude": 31.5, "longitude": 74.3, "distance_km": 1.2
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let rows = client
            .nearby_restaurants(Coordinates::new(31.5, 74.3), 5.0)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id(), RestaurantId::new(1));
    }

    #[tokio::test]
    async fn test_save_posts_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/saved(post).php"))
            .and(body_string_contains("user_id=17"))
            .and(body_string_contains("restaurant_id=42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true, "message": "Saved"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client
            .save_restaurant(&user(), RestaurantId::new(42))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_server_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/saved(delete).php"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .unsave_restaurant(&user(), RestaurantId::new(42))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 500, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_categories_use_restaurant_root() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/restaurant/category(get).php"))
            .and(query_param("restaurant_id", "9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "data": [
                    {"category_id": 1, "category_name": "BBQ", "item_count": 3},
                    {"category_id": 2, "category_name": "Drinks", "item_count": 5}
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let cats = client.categories(RestaurantId::new(9)).await.unwrap();
        assert_eq!(cats.len(), 2);
        assert!(cats.iter().all(|c| c.restaurant_id == RestaurantId::new(9)));
    }

    #[tokio::test]
    async fn test_empty_reviews_are_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/review(get).php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false, "message": "No reviews found"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.reviews(&user()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_profile_upload_is_base64() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/update_profile.php"))
            .and(body_string_contains("base64_image=aGVsbG8%3D"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true, "image_url": "https://img.example.com/u17.jpg"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let url = client
            .update_profile(
                &user(),
                &ProfileUpdate {
                    first_name: "Ayesha".into(),
                    last_name: "Khan".into(),
                    phone: "0300".into(),
                    gender: "female".into(),
                    image: Some(ProfileImage::Upload(b"hello".to_vec())),
                },
            )
            .await
            .unwrap();
        assert_eq!(url.as_deref(), Some("https://img.example.com/u17.jpg"));
    }

    #[test]
    fn test_join_escapes_query() {
        let root = Url::parse("https://example.com/app/").unwrap();
        let url = BackendClient::join(&root, "saved(get).php", &[("user_id", "a b")]).unwrap();
        assert_eq!(url.as_str(), "https://example.com/app/saved(get).php?user_id=a+b");
    }
}
