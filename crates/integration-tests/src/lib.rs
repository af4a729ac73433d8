//! Integration tests for the DineSphere client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p dinesphere-integration-tests
//! ```
//!
//! Every test runs against an in-memory `SQLite` store and a `wiremock`
//! server standing in for the PHP backend. Nothing external is needed.
//!
//! # Test Categories
//!
//! - `offline_sync` - Optimistic toggles, queue replay and clear policies
//! - `read_path` - Cached-first listing loads and the nearby split
//! - `backend_client` - Endpoint shapes and envelope handling

use std::collections::HashMap;

use dinesphere_client::db::Store;
use dinesphere_client::models::CachedRestaurant;
use dinesphere_client::services::ClearPolicy;
use dinesphere_client::{AppState, ClientConfig, Connectivity};
use dinesphere_core::{Coordinates, DistanceKm, RestaurantId, UserId};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// User id the fixtures log in as.
pub const TEST_USER: &str = "17";

/// A client wired to a mock backend and a fresh in-memory store.
pub struct TestContext {
    /// Stand-in for the PHP backend.
    pub server: MockServer,
    /// Client state under test.
    pub state: AppState,
}

impl TestContext {
    /// Build a context with the default clear policy.
    ///
    /// # Panics
    ///
    /// Panics if the store or the client cannot be created.
    pub async fn new(online: bool) -> Self {
        Self::with_policy(online, ClearPolicy::default()).await
    }

    /// Build a context with an explicit clear policy.
    ///
    /// # Panics
    ///
    /// Panics if the store or the client cannot be created.
    pub async fn with_policy(online: bool, policy: ClearPolicy) -> Self {
        let server = MockServer::start().await;
        let vars = HashMap::from([
            ("DINESPHERE_BASE_URL".to_string(), server.uri()),
            ("DINESPHERE_CLEAR_POLICY".to_string(), policy.to_string()),
            ("DINESPHERE_HTTP_TIMEOUT_SECS".to_string(), "5".to_string()),
        ]);
        let config = ClientConfig::from_vars(&vars).expect("valid test config");
        let store = Store::open_in_memory().await.expect("in-memory store");
        let state = AppState::with_store(config, store, Connectivity::new(online))
            .expect("client state");
        Self { server, state }
    }

    /// Like [`Self::new`], with a session for [`TEST_USER`].
    ///
    /// # Panics
    ///
    /// Panics if the session cannot be written.
    pub async fn logged_in(online: bool) -> Self {
        let ctx = Self::new(online).await;
        ctx.login().await;
        ctx
    }

    /// Write a session for [`TEST_USER`].
    ///
    /// # Panics
    ///
    /// Panics if the session cannot be written.
    pub async fn login(&self) {
        let user = UserId::parse(TEST_USER).expect("valid user id");
        self.state
            .store()
            .sessions()
            .put(&user)
            .await
            .expect("session write");
    }

    /// Flip connectivity.
    pub fn set_online(&self, online: bool) {
        self.state.connectivity().set_online(online);
    }

    /// Cache restaurants directly.
    ///
    /// # Panics
    ///
    /// Panics if the upsert fails.
    pub async fn seed(&self, restaurants: &[CachedRestaurant]) {
        self.state
            .store()
            .restaurants()
            .upsert(restaurants)
            .await
            .expect("seed restaurants");
    }

    /// Answer `POST script` with `{"success": true}`.
    pub async fn mount_success(&self, script: &str) {
        Mock::given(method("POST"))
            .and(path(format!("/{script}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .mount(&self.server)
            .await;
    }

    /// Answer the saved-list endpoint with the given ids.
    pub async fn mount_saved_list(&self, ids: &[i32]) {
        let rows = ids.iter().map(|id| restaurant_json(*id, 0.0)).collect();
        Mock::given(method("GET"))
            .and(path("/saved(get).php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(restaurants_body(rows)))
            .mount(&self.server)
            .await;
    }

    /// Paths of every request the mock backend received, in order.
    ///
    /// # Panics
    ///
    /// Panics if request recording is disabled.
    pub async fn request_paths(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .expect("request recording enabled")
            .iter()
            .map(|r| r.url.path().to_string())
            .collect()
    }

    /// Bodies of every `POST` to `script`, in order.
    ///
    /// # Panics
    ///
    /// Panics if request recording is disabled.
    pub async fn form_bodies(&self, script: &str) -> Vec<String> {
        let wanted = format!("/{script}");
        self.server
            .received_requests()
            .await
            .expect("request recording enabled")
            .iter()
            .filter(|r| r.url.path() == wanted)
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
            .collect()
    }
}

/// A cached restaurant at `distance_km`.
#[must_use]
pub fn cached_restaurant(id: i32, distance_km: f64) -> CachedRestaurant {
    CachedRestaurant {
        id: RestaurantId::new(id),
        name: format!("Restaurant {id}"),
        address: format!("{id} Main Boulevard, Lahore"),
        image_url: None,
        location: Coordinates::new(31.5, 74.3),
        rating: 4.0,
        distance: DistanceKm::new(distance_km),
        is_saved: false,
        discount: None,
        phone: None,
    }
}

/// A restaurant row as the backend sends it.
#[must_use]
pub fn restaurant_json(id: i32, distance_km: f64) -> Value {
    json!({
        "restaurant_id": id,
        "business_name": format!("Restaurant {id}"),
        "address": format!("{id} Main Boulevard, Lahore"),
        "latitude": "31.5",
        "longitude": "74.3",
        "rating": null,
        "distance_km": distance_km.to_string(),
        "is_saved": "0"
    })
}

/// A `{"success": true, "restaurants": [...]}` body.
#[must_use]
pub fn restaurants_body(rows: Vec<Value>) -> Value {
    json!({ "success": true, "restaurants": rows })
}
