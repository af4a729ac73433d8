//! Shared client state.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::api::BackendClient;
use crate::config::ClientConfig;
use crate::connectivity::Connectivity;
use crate::db::{Store, StoreOptions};
use crate::error::AppError;
use crate::services::{
    AccountService, ActivityService, FeedService, SaveService, SavedIds, SyncService,
};

/// Everything the services share.
///
/// Cheap to clone via `Arc`. Every service handed out works on the same
/// store, saved-id set and replay lock.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ClientConfig,
    store: Store,
    api: BackendClient,
    connectivity: Connectivity,
    saved_ids: SavedIds,
    sync: SyncService,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.inner.config)
            .field("online", &self.inner.connectivity.is_online())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Open the store and build the backend client.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the store cannot be opened or
    /// migrated, or `AppError::Api` if the HTTP client cannot be built.
    pub async fn open(config: ClientConfig, connectivity: Connectivity) -> Result<Self, AppError> {
        let store = Store::open(&StoreOptions::new(config.database_url.clone())).await?;
        let state = Self::with_store(config, store, connectivity)?;
        info!(
            base_url = %state.inner.config.backend.base_url,
            online = state.inner.connectivity.is_online(),
            "Client state ready"
        );
        Ok(state)
    }

    /// Build state around an already opened store.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Api` if the HTTP client cannot be built.
    pub fn with_store(
        config: ClientConfig,
        store: Store,
        connectivity: Connectivity,
    ) -> Result<Self, AppError> {
        let api = BackendClient::new(&config.backend)?;
        let saved_ids = SavedIds::new();
        let sync = SyncService::new(
            store.clone(),
            api.clone(),
            connectivity.clone(),
            saved_ids.clone(),
            config.clear_policy,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                api,
                connectivity,
                saved_ids,
                sync,
            }),
        })
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Get a reference to the local store.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    /// Get a reference to the backend client.
    #[must_use]
    pub fn api(&self) -> &BackendClient {
        &self.inner.api
    }

    /// Get a reference to the connectivity provider.
    #[must_use]
    pub fn connectivity(&self) -> &Connectivity {
        &self.inner.connectivity
    }

    /// Get a reference to the saved-id set.
    #[must_use]
    pub fn saved_ids(&self) -> &SavedIds {
        &self.inner.saved_ids
    }

    /// The queue replay service.
    #[must_use]
    pub fn sync(&self) -> &SyncService {
        &self.inner.sync
    }

    /// Listing screens.
    #[must_use]
    pub fn feed(&self) -> FeedService {
        FeedService::new(
            self.inner.store.clone(),
            self.inner.api.clone(),
            self.inner.connectivity.clone(),
            self.inner.saved_ids.clone(),
            self.inner.config.nearby_radius_km,
        )
    }

    /// Save/unsave and the saved list.
    #[must_use]
    pub fn saves(&self) -> SaveService {
        SaveService::new(
            self.inner.store.clone(),
            self.inner.api.clone(),
            self.inner.connectivity.clone(),
            self.inner.saved_ids.clone(),
            self.inner.sync.clone(),
        )
    }

    /// Session and account details.
    #[must_use]
    pub fn account(&self) -> AccountService {
        AccountService::new(
            self.inner.store.clone(),
            self.inner.api.clone(),
            self.inner.connectivity.clone(),
            self.inner.saved_ids.clone(),
            self.inner.sync.clone(),
        )
    }

    /// Reviews and notifications.
    #[must_use]
    pub fn activity(&self) -> ActivityService {
        ActivityService::new(
            self.inner.store.clone(),
            self.inner.api.clone(),
            self.inner.connectivity.clone(),
        )
    }

    /// Replay the queue on every reconnect.
    #[must_use]
    pub fn spawn_reconnect_watcher(&self) -> JoinHandle<()> {
        self.inner.sync.spawn_reconnect_watcher()
    }

    /// Close the store.
    pub async fn close(&self) {
        self.inner.store.close().await;
    }
}
