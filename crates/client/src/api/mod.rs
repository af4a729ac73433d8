//! DineSphere backend API.

pub mod client;
pub mod error;
pub mod types;

pub use client::BackendClient;
pub use error::ApiError;
pub use types::{RestaurantWire, StatusEnvelope, SuccessEnvelope};

#[cfg(test)]
pub(crate) mod fixtures {
    use std::time::Duration;

    use serde_json::{Value, json};
    use url::Url;
    use wiremock::MockServer;

    use super::BackendClient;
    use crate::config::BackendConfig;

    /// A client pointed at a mock server.
    #[allow(clippy::unwrap_used)]
    pub fn client_for(server: &MockServer) -> BackendClient {
        let base = Url::parse(&format!("{}/", server.uri())).unwrap();
        BackendClient::new(&BackendConfig {
            restaurant_url: base.join("restaurant/").unwrap(),
            base_url: base,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    /// A listing row as the backend sends it.
    pub fn restaurant_json(id: i32, distance_km: f64) -> Value {
        json!({
            "restaurant_id": id.to_string(),
            "business_name": format!("Restaurant {id}"),
            "address": format!("{id} Food Street, Gulberg, Lahore"),
            "image_url": format!("https://img.example.com/{id}.jpg"),
            "latitude": "31.5",
            "longitude": "74.3",
            "rating": "4.5",
            "distance_km": distance_km,
            "is_saved": 0
        })
    }

    /// A success envelope around a restaurant list.
    pub fn restaurants_body(rows: Vec<Value>) -> Value {
        json!({ "success": true, "restaurants": rows })
    }
}
