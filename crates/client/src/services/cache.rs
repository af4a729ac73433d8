//! Merging fetched listings into the local cache.
//!
//! A fresh listing must not undo a save the server has not seen yet. The
//! saved flag written for each row is decided in this order:
//!
//! 1. the latest queued action for the restaurant (`SAVE` → saved,
//!    `UNSAVE` → not saved; unknown kinds are ignored);
//! 2. otherwise the server's flag OR membership in [`SavedIds`].

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use dinesphere_core::{ActionKind, CategoryId, RestaurantId};
use tracing::{debug, instrument};

use crate::db::{RepositoryError, Store};
use crate::models::{CachedCategory, CachedMenuItem, CachedRestaurant};

/// In-memory set of restaurant ids the user is known to have saved.
///
/// Refreshed from the saved-list endpoint and updated on every toggle.
/// Cloning shares the set. The lock is never held across an await.
#[derive(Debug, Clone, Default)]
pub struct SavedIds {
    inner: Arc<RwLock<HashSet<RestaurantId>>>,
}

impl SavedIds {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `id` is known to be saved.
    #[must_use]
    pub fn contains(&self, id: RestaurantId) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    /// Mark `id` as saved or not saved.
    pub fn set(&self, id: RestaurantId, saved: bool) {
        let mut ids = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if saved {
            ids.insert(id);
        } else {
            ids.remove(&id);
        }
    }

    /// Apply the effect of an action. Unknown kinds change nothing.
    pub fn apply(&self, kind: &ActionKind, id: RestaurantId) {
        if let Some(saved) = kind.resulting_saved_state() {
            self.set(id, saved);
        }
    }

    /// Replace the whole set with a server snapshot.
    pub fn replace(&self, ids: impl IntoIterator<Item = RestaurantId>) {
        let fresh: HashSet<RestaurantId> = ids.into_iter().collect();
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = fresh;
    }

    /// Forget every id (logout).
    pub fn clear(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Copy of the current set.
    #[must_use]
    pub fn snapshot(&self) -> HashSet<RestaurantId> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of ids in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Writes fetched rows into the cache with locally known saved state.
#[derive(Debug, Clone)]
pub struct CachePopulator {
    store: Store,
    saved_ids: SavedIds,
}

impl CachePopulator {
    /// Create a new populator.
    #[must_use]
    pub const fn new(store: Store, saved_ids: SavedIds) -> Self {
        Self { store, saved_ids }
    }

    /// Merge saved state and upsert the batch in one transaction.
    ///
    /// The queue is consulted inside the write, so a toggle queued while
    /// the fetch was in flight still decides the flag.
    ///
    /// Returns the rows as written.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the upsert fails.
    #[instrument(skip(self, restaurants), fields(count = restaurants.len()))]
    pub async fn populate_restaurants(
        &self,
        mut restaurants: Vec<CachedRestaurant>,
    ) -> Result<Vec<CachedRestaurant>, RepositoryError> {
        for r in &mut restaurants {
            r.is_saved = r.is_saved || self.saved_ids.contains(r.id);
        }
        let written = self
            .store
            .restaurants()
            .upsert_merging_queue(restaurants)
            .await?;
        debug!("Restaurant cache updated");
        Ok(written)
    }

    /// Upsert the categories of a restaurant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the upsert fails.
    pub async fn populate_categories(
        &self,
        restaurant_id: RestaurantId,
        categories: &[CachedCategory],
    ) -> Result<(), RepositoryError> {
        self.store
            .menu()
            .upsert_categories(restaurant_id, categories)
            .await
    }

    /// Upsert the items of a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the upsert fails.
    pub async fn populate_menu_items(
        &self,
        category_id: CategoryId,
        items: &[CachedMenuItem],
    ) -> Result<(), RepositoryError> {
        self.store.menu().upsert_items(category_id, items).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::restaurant::fixtures::restaurant;

    #[test]
    fn test_saved_ids_apply_and_replace() {
        let ids = SavedIds::new();
        ids.apply(&ActionKind::Save, RestaurantId::new(1));
        ids.apply(&ActionKind::Save, RestaurantId::new(2));
        ids.apply(&ActionKind::Unsave, RestaurantId::new(1));
        ids.apply(&ActionKind::parse("ARCHIVE"), RestaurantId::new(3));
        assert!(!ids.contains(RestaurantId::new(1)));
        assert!(ids.contains(RestaurantId::new(2)));
        assert_eq!(ids.len(), 1);

        ids.replace([RestaurantId::new(9)]);
        assert_eq!(ids.snapshot(), HashSet::from([RestaurantId::new(9)]));

        ids.clear();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_saved_ids_membership_merged_into_fetch() {
        let store = Store::open_in_memory().await.unwrap();
        let saved = SavedIds::new();
        saved.set(RestaurantId::new(2), true);
        let populator = CachePopulator::new(store.clone(), saved);

        let written = populator
            .populate_restaurants(vec![restaurant(1, 1.0), restaurant(2, 2.0)])
            .await
            .unwrap();
        assert!(!written[0].is_saved);
        assert!(written[1].is_saved);

        let cached = store.restaurants().all().await.unwrap();
        assert_eq!(cached, written);
    }

    #[tokio::test]
    async fn test_queued_action_wins_over_server_flag() {
        let store = Store::open_in_memory().await.unwrap();
        let saved = SavedIds::new();
        // Server still thinks 1 is saved; user unsaved it offline.
        saved.set(RestaurantId::new(1), true);
        store
            .pending_actions()
            .record_optimistic_toggle(&ActionKind::Unsave, RestaurantId::new(1))
            .await
            .unwrap();
        // User saved 2 offline; server has not seen it.
        store
            .pending_actions()
            .record_optimistic_toggle(&ActionKind::Save, RestaurantId::new(2))
            .await
            .unwrap();

        let mut remote_one = restaurant(1, 1.0);
        remote_one.is_saved = true;
        let populator = CachePopulator::new(store.clone(), saved);
        let written = populator
            .populate_restaurants(vec![remote_one, restaurant(2, 2.0), restaurant(3, 3.0)])
            .await
            .unwrap();

        let flags: Vec<bool> = written.iter().map(|r| r.is_saved).collect();
        assert_eq!(flags, vec![false, true, false]);
    }

    #[tokio::test]
    async fn test_latest_queued_action_decides() {
        let store = Store::open_in_memory().await.unwrap();
        let queue = store.pending_actions();
        queue
            .record_optimistic_toggle(&ActionKind::Save, RestaurantId::new(5))
            .await
            .unwrap();
        queue
            .record_optimistic_toggle(&ActionKind::Unsave, RestaurantId::new(5))
            .await
            .unwrap();

        // A stale server flag and saved-id membership both lose to the queue.
        let saved = SavedIds::new();
        saved.set(RestaurantId::new(5), true);
        let mut remote = restaurant(5, 1.0);
        remote.is_saved = true;
        let populator = CachePopulator::new(store.clone(), saved);
        let written = populator.populate_restaurants(vec![remote]).await.unwrap();
        assert!(!written[0].is_saved);

        let cached = store.restaurants().get(RestaurantId::new(5)).await.unwrap().unwrap();
        assert!(!cached.is_saved);
    }
}
