//! Save/unsave toggling and the saved list.

use std::collections::HashMap;

use dinesphere_core::{ActionKind, RestaurantId, UserId};
use tracing::{debug, info, instrument, warn};

use super::cache::SavedIds;
use super::sync::SyncService;
use super::{require_online, require_user};
use crate::api::BackendClient;
use crate::connectivity::Connectivity;
use crate::db::{QueuedToggle, Store};
use crate::error::AppError;
use crate::models::CachedRestaurant;

/// How a save/unsave was carried out.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveResult {
    /// The backend confirmed the change.
    Synced {
        /// The new saved state.
        saved: bool,
    },
    /// Offline; queued for replay with the cache updated optimistically.
    Queued(QueuedToggle),
}

impl SaveResult {
    /// The saved state the user now sees.
    #[must_use]
    pub fn saved(&self) -> bool {
        match self {
            Self::Synced { saved } => *saved,
            Self::Queued(q) => q.action.kind.resulting_saved_state().unwrap_or_default(),
        }
    }

    /// Whether the change still has to be replayed.
    #[must_use]
    pub const fn is_queued(&self) -> bool {
        matches!(self, Self::Queued(_))
    }
}

/// The user's saved restaurants.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SavedList {
    /// Saved restaurants.
    pub restaurants: Vec<CachedRestaurant>,
    /// Whether the list was read from the cache instead of the backend.
    pub from_cache: bool,
}

/// Saves and unsaves restaurants, online or queued.
#[derive(Debug, Clone)]
pub struct SaveService {
    store: Store,
    api: BackendClient,
    connectivity: Connectivity,
    saved_ids: SavedIds,
    sync: SyncService,
}

impl SaveService {
    /// Create a new save service.
    #[must_use]
    pub const fn new(
        store: Store,
        api: BackendClient,
        connectivity: Connectivity,
        saved_ids: SavedIds,
        sync: SyncService,
    ) -> Self {
        Self {
            store,
            api,
            connectivity,
            saved_ids,
            sync,
        }
    }

    /// Set the saved state of a restaurant.
    ///
    /// Online, the backend is called first and the cache follows on
    /// success; any toggles still queued for the restaurant are dropped,
    /// since the server now holds the newer state. Offline, the change is
    /// queued and applied optimistically.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotLoggedIn` without a session, `AppError::Api`
    /// if the online call fails (nothing is queued), or
    /// `AppError::Database` if a local write fails.
    #[instrument(skip(self), fields(restaurant_id = %restaurant_id))]
    pub async fn set_saved(
        &self,
        restaurant_id: RestaurantId,
        saved: bool,
    ) -> Result<SaveResult, AppError> {
        let user_id = require_user(&self.store).await?;

        if require_online(&self.connectivity).is_err() {
            let queued = self
                .sync
                .queue_toggle(ActionKind::for_saved(saved), restaurant_id)
                .await?;
            return Ok(SaveResult::Queued(queued));
        }

        // No replay may run between the call and the settle, or it would
        // send an older queued toggle after this one.
        let _replay = self.sync.hold_replay().await;
        self.push(&user_id, restaurant_id, saved).await?;

        let settled = self
            .store
            .pending_actions()
            .settle_saved(restaurant_id, saved)
            .await?;
        self.saved_ids.set(restaurant_id, saved);
        debug!(
            cached = settled.flag_updated,
            superseded = settled.superseded,
            "Saved state synced"
        );

        Ok(SaveResult::Synced { saved })
    }

    /// Flip the saved state of a restaurant.
    ///
    /// # Errors
    ///
    /// Same as [`Self::set_saved`].
    pub async fn toggle(&self, restaurant_id: RestaurantId) -> Result<SaveResult, AppError> {
        let current = self.is_saved(restaurant_id).await?;
        self.set_saved(restaurant_id, !current).await
    }

    /// The saved state the user currently sees.
    ///
    /// A queued action wins, then the cached flag, then the saved-id set.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the cache read fails.
    pub async fn is_saved(&self, restaurant_id: RestaurantId) -> Result<bool, AppError> {
        if let Some(saved) = self
            .store
            .pending_actions()
            .latest_kind(restaurant_id)
            .await?
            .and_then(|k| k.resulting_saved_state())
        {
            return Ok(saved);
        }

        let cached = self.store.restaurants().get(restaurant_id).await?;
        Ok(cached.is_some_and(|r| r.is_saved) || self.saved_ids.contains(restaurant_id))
    }

    /// The saved list.
    ///
    /// Online, fetched from the backend with queued changes applied on
    /// top, and the saved-id set replaced. Offline, or when the fetch
    /// fails, built from cached rows flagged as saved.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotLoggedIn` without a session, or
    /// `AppError::Database` if the cache read fails.
    #[instrument(skip(self))]
    pub async fn saved_list(&self) -> Result<SavedList, AppError> {
        let user_id = require_user(&self.store).await?;

        if require_online(&self.connectivity).is_ok() {
            match self.api.saved_restaurants(&user_id).await {
                Ok(wires) => {
                    let remote = wires
                        .into_iter()
                        .map(|w| CachedRestaurant {
                            is_saved: true,
                            ..CachedRestaurant::from(w)
                        })
                        .collect();
                    let restaurants = self.apply_queued(remote).await?;
                    self.saved_ids.replace(restaurants.iter().map(|r| r.id));
                    info!(count = restaurants.len(), "Saved list loaded");
                    return Ok(SavedList {
                        restaurants,
                        from_cache: false,
                    });
                }
                Err(e) => warn!(error = %e, "Saved list fetch failed, serving cache"),
            }
        }

        Ok(SavedList {
            restaurants: self.store.restaurants().saved().await?,
            from_cache: true,
        })
    }

    async fn push(
        &self,
        user_id: &UserId,
        restaurant_id: RestaurantId,
        saved: bool,
    ) -> Result<(), AppError> {
        if saved {
            self.api.save_restaurant(user_id, restaurant_id).await?;
        } else {
            self.api.unsave_restaurant(user_id, restaurant_id).await?;
        }
        Ok(())
    }

    /// Drop queued unsaves and add queued saves that are cached.
    async fn apply_queued(
        &self,
        mut restaurants: Vec<CachedRestaurant>,
    ) -> Result<Vec<CachedRestaurant>, AppError> {
        let mut latest: HashMap<RestaurantId, bool> = HashMap::new();
        for action in self.store.pending_actions().list().await? {
            if let Some(saved) = action.kind.resulting_saved_state() {
                latest.insert(action.restaurant_id, saved);
            }
        }

        restaurants.retain(|r| latest.get(&r.id).copied().unwrap_or(true));

        let mut additions: Vec<RestaurantId> = latest
            .into_iter()
            .filter(|(id, saved)| *saved && !restaurants.iter().any(|r| r.id == *id))
            .map(|(id, _)| id)
            .collect();
        additions.sort_by_key(RestaurantId::as_i32);

        for id in additions {
            if let Some(cached) = self.store.restaurants().get(id).await? {
                restaurants.push(CachedRestaurant {
                    is_saved: true,
                    ..cached
                });
            }
        }

        Ok(restaurants)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::fixtures::{client_for, restaurant_json, restaurants_body};
    use crate::models::restaurant::fixtures::restaurant;
    use crate::services::sync::ClearPolicy;

    async fn saves(server: &MockServer, online: bool) -> SaveService {
        let store = Store::open_in_memory().await.unwrap();
        store.sessions().put(&UserId::parse("17").unwrap()).await.unwrap();
        store
            .restaurants()
            .upsert(&[restaurant(1, 1.0), restaurant(2, 2.0)])
            .await
            .unwrap();
        let api = client_for(server);
        let connectivity = Connectivity::new(online);
        let saved_ids = SavedIds::new();
        let sync = SyncService::new(
            store.clone(),
            api.clone(),
            connectivity.clone(),
            saved_ids.clone(),
            ClearPolicy::RetainFailed,
        );
        SaveService::new(store, api, connectivity, saved_ids, sync)
    }

    #[tokio::test]
    async fn test_offline_save_queues_and_flips_flag() {
        let server = MockServer::start().await;
        let saves = saves(&server, false).await;

        let result = saves.set_saved(RestaurantId::new(1), true).await.unwrap();
        assert!(result.is_queued());
        assert!(result.saved());

        let cached = saves.store.restaurants().get(RestaurantId::new(1)).await.unwrap().unwrap();
        assert!(cached.is_saved);
        assert_eq!(saves.store.pending_actions().count().await.unwrap(), 1);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_online_save_calls_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/saved(post).php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;
        let saves = saves(&server, true).await;

        let result = saves.toggle(RestaurantId::new(2)).await.unwrap();
        assert_eq!(result, SaveResult::Synced { saved: true });
        assert!(saves.saved_ids.contains(RestaurantId::new(2)));
        assert_eq!(saves.store.pending_actions().count().await.unwrap(), 0);
        assert!(saves.is_saved(RestaurantId::new(2)).await.unwrap());
    }

    #[tokio::test]
    async fn test_online_change_drops_queued_toggles_for_that_restaurant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/saved(delete).php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;
        let saves = saves(&server, false).await;
        saves.set_saved(RestaurantId::new(1), true).await.unwrap();
        saves.set_saved(RestaurantId::new(2), true).await.unwrap();

        saves.connectivity.set_online(true);
        let result = saves.set_saved(RestaurantId::new(1), false).await.unwrap();
        assert_eq!(result, SaveResult::Synced { saved: false });
        assert!(!saves.is_saved(RestaurantId::new(1)).await.unwrap());
        assert!(!saves.saved_ids.contains(RestaurantId::new(1)));

        let left = saves.store.pending_actions().list().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].restaurant_id, RestaurantId::new(2));
    }

    #[tokio::test]
    async fn test_online_failure_is_not_queued() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/saved(delete).php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "message": "Not saved"
            })))
            .mount(&server)
            .await;
        let saves = saves(&server, true).await;

        let err = saves.set_saved(RestaurantId::new(1), false).await.unwrap_err();
        assert_eq!(err.user_message(), "Not saved");
        assert_eq!(saves.store.pending_actions().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_toggle_requires_session() {
        let server = MockServer::start().await;
        let saves = saves(&server, false).await;
        saves.store.sessions().clear().await.unwrap();

        let err = saves.toggle(RestaurantId::new(1)).await.unwrap_err();
        assert!(matches!(err, AppError::NotLoggedIn));
    }

    #[tokio::test]
    async fn test_saved_list_applies_queue() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/saved(get).php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(restaurants_body(vec![
                restaurant_json(5, 0.0),
                restaurant_json(6, 0.0),
            ])))
            .mount(&server)
            .await;
        let saves = saves(&server, true).await;
        let queue = saves.store.pending_actions();
        queue.append(&ActionKind::Unsave, RestaurantId::new(6)).await.unwrap();
        queue.append(&ActionKind::Save, RestaurantId::new(1)).await.unwrap();

        let list = saves.saved_list().await.unwrap();
        assert!(!list.from_cache);
        let ids: Vec<i32> = list.restaurants.iter().map(|r| r.id.as_i32()).collect();
        assert_eq!(ids, vec![5, 1]);
        assert!(list.restaurants.iter().all(|r| r.is_saved));
        assert!(saves.saved_ids.contains(RestaurantId::new(1)));
        assert!(!saves.saved_ids.contains(RestaurantId::new(6)));
    }

    #[tokio::test]
    async fn test_saved_list_offline_from_cache() {
        let server = MockServer::start().await;
        let saves = saves(&server, false).await;
        saves.set_saved(RestaurantId::new(2), true).await.unwrap();

        let list = saves.saved_list().await.unwrap();
        assert!(list.from_cache);
        assert_eq!(list.restaurants.len(), 1);
        assert_eq!(list.restaurants[0].id, RestaurantId::new(2));
    }
}
