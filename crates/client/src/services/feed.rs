//! Cached-first, refresh-second loading of listing screens.
//!
//! Every load first yields what the cache holds (possibly nothing), then
//! exactly one of: fresh rows from the backend, an offline marker, or a
//! refresh failure. Callers render each update as it arrives.

use std::collections::HashSet;

use async_stream::stream;
use dinesphere_core::{CategoryId, Coordinates, RestaurantId};
use futures::Stream;
use tracing::{debug, instrument, warn};

use super::cache::{CachePopulator, SavedIds};
use crate::api::BackendClient;
use crate::connectivity::Connectivity;
use crate::db::Store;
use crate::error::AppError;
use crate::models::menu::select_first;
use crate::models::{CachedCategory, CachedMenuItem, CachedRestaurant};

/// A listing screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Screen {
    /// Restaurants within the nearby radius of a location.
    Nearby(Coordinates),
    /// Every restaurant outside the nearby radius.
    AllOther(Coordinates),
    /// Menu categories of a restaurant.
    Categories(RestaurantId),
    /// Items of a menu category.
    MenuItems(CategoryId),
}

/// Rows shown by a screen.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedRows {
    /// Restaurant listing, closest first.
    Restaurants(Vec<CachedRestaurant>),
    /// Menu categories, first one selected.
    Categories(Vec<CachedCategory>),
    /// Menu items.
    MenuItems(Vec<CachedMenuItem>),
}

impl FeedRows {
    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Restaurants(rows) => rows.len(),
            Self::Categories(rows) => rows.len(),
            Self::MenuItems(rows) => rows.len(),
        }
    }

    /// Whether there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One step of a screen load.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedUpdate {
    /// Rows read from the local cache. Always the first update.
    Cached(FeedRows),
    /// Rows fetched from the backend; the cache has been rewritten.
    Fresh(FeedRows),
    /// No network. The cached rows are all there is.
    Offline,
    /// The refresh failed; the cached rows stay on screen.
    RefreshFailed(String),
}

impl FeedUpdate {
    /// Whether this update ends the load.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Cached(_))
    }
}

/// Both home-screen buckets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HomeFeed {
    /// Restaurants within the nearby radius.
    pub nearby: Vec<CachedRestaurant>,
    /// Everything else.
    pub other: Vec<CachedRestaurant>,
    /// Whether the lists come from the cache because there is no network.
    pub offline: bool,
    /// Set when online but the refresh failed and cached rows were used.
    pub refresh_error: Option<String>,
}

/// Loads listing screens from the cache and the backend.
#[derive(Debug, Clone)]
pub struct FeedService {
    store: Store,
    api: BackendClient,
    connectivity: Connectivity,
    populator: CachePopulator,
    radius_km: f64,
}

impl FeedService {
    /// Create a new feed service.
    #[must_use]
    pub fn new(
        store: Store,
        api: BackendClient,
        connectivity: Connectivity,
        saved_ids: SavedIds,
        radius_km: f64,
    ) -> Self {
        Self {
            populator: CachePopulator::new(store.clone(), saved_ids),
            store,
            api,
            connectivity,
            radius_km,
        }
    }

    /// Load a screen.
    ///
    /// Yields `Cached` first, then one terminal update. A cache read
    /// failure is yielded as an error and ends the stream.
    pub fn load(&self, screen: Screen) -> impl Stream<Item = Result<FeedUpdate, AppError>> + Send + 'static {
        let this = self.clone();

        stream! {
            let cached = match this.cached(screen).await {
                Ok(rows) => rows,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            debug!(?screen, count = cached.len(), "Cached rows loaded");
            yield Ok(FeedUpdate::Cached(cached));

            if !this.connectivity.is_online() {
                yield Ok(FeedUpdate::Offline);
                return;
            }

            match this.refresh(screen).await {
                Ok(rows) => yield Ok(FeedUpdate::Fresh(rows)),
                Err(e) => {
                    warn!(?screen, error = %e, "Refresh failed, keeping cached rows");
                    yield Ok(FeedUpdate::RefreshFailed(e.user_message()));
                }
            }
        }
    }

    /// Rows the cache holds for a screen.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the cache read fails.
    pub async fn cached(&self, screen: Screen) -> Result<FeedRows, AppError> {
        let rows = match screen {
            Screen::Nearby(_) => {
                FeedRows::Restaurants(self.store.restaurants().within(self.radius_km).await?)
            }
            Screen::AllOther(_) => {
                FeedRows::Restaurants(self.store.restaurants().beyond(self.radius_km).await?)
            }
            Screen::Categories(restaurant_id) => {
                FeedRows::Categories(self.store.menu().categories(restaurant_id).await?)
            }
            Screen::MenuItems(category_id) => {
                FeedRows::MenuItems(self.store.menu().items(category_id).await?)
            }
        };
        Ok(rows)
    }

    /// Fetch a screen from the backend and rewrite the cache.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Api` if the fetch fails, or `AppError::Database`
    /// if the cache write fails.
    #[instrument(skip(self))]
    pub async fn refresh(&self, screen: Screen) -> Result<FeedRows, AppError> {
        let rows = match screen {
            Screen::Nearby(location) => {
                let fetched = self.fetch_nearby(location).await?;
                let nearby = self.populator.populate_restaurants(fetched).await?;
                FeedRows::Restaurants(sorted_by_distance(nearby))
            }
            Screen::AllOther(location) => {
                let (_, other) = self.refresh_home(location).await?;
                FeedRows::Restaurants(other)
            }
            Screen::Categories(restaurant_id) => {
                let mut categories = self.api.categories(restaurant_id).await?;
                self.populator
                    .populate_categories(restaurant_id, &categories)
                    .await?;
                select_first(&mut categories);
                FeedRows::Categories(categories)
            }
            Screen::MenuItems(category_id) => {
                let items = self.api.menu_items(category_id).await?;
                self.populator.populate_menu_items(category_id, &items).await?;
                FeedRows::MenuItems(items)
            }
        };
        Ok(rows)
    }

    /// Both home buckets in one call.
    ///
    /// Offline, or when the refresh fails, the buckets come from the
    /// cache split at the nearby radius. An empty cache gives empty lists.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the cache cannot be read or written.
    #[instrument(skip(self))]
    pub async fn home(&self, location: Coordinates) -> Result<HomeFeed, AppError> {
        if !self.connectivity.is_online() {
            return Ok(HomeFeed {
                offline: true,
                ..self.cached_home().await?
            });
        }

        match self.refresh_home(location).await {
            Ok((nearby, other)) => Ok(HomeFeed {
                nearby,
                other,
                offline: false,
                refresh_error: None,
            }),
            Err(AppError::Api(e)) => {
                warn!(error = %e, "Home refresh failed, serving cache");
                Ok(HomeFeed {
                    refresh_error: Some(AppError::Api(e).user_message()),
                    ..self.cached_home().await?
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Search cached menu items by name or description.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the cache read fails.
    pub async fn search_menu(
        &self,
        category_id: Option<CategoryId>,
        query: &str,
    ) -> Result<Vec<CachedMenuItem>, AppError> {
        Ok(self.store.menu().search_items(category_id, query).await?)
    }

    /// Search cached restaurants by name or address.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the cache read fails.
    pub async fn search_restaurants(&self, query: &str) -> Result<Vec<CachedRestaurant>, AppError> {
        Ok(self.store.restaurants().search(query).await?)
    }

    async fn cached_home(&self) -> Result<HomeFeed, AppError> {
        let restaurants = self.store.restaurants();
        Ok(HomeFeed {
            nearby: restaurants.within(self.radius_km).await?,
            other: restaurants.beyond(self.radius_km).await?,
            ..HomeFeed::default()
        })
    }

    async fn fetch_nearby(&self, location: Coordinates) -> Result<Vec<CachedRestaurant>, AppError> {
        let wires = self.api.nearby_restaurants(location, self.radius_km).await?;
        Ok(wires.into_iter().map(Into::into).collect())
    }

    /// Fetch nearby and all restaurants, cache both, and split them.
    async fn refresh_home(
        &self,
        location: Coordinates,
    ) -> Result<(Vec<CachedRestaurant>, Vec<CachedRestaurant>), AppError> {
        let nearby = self.fetch_nearby(location).await?;
        let nearby_ids: HashSet<RestaurantId> = nearby.iter().map(|r| r.id).collect();

        let other: Vec<CachedRestaurant> = self
            .api
            .all_restaurants(location)
            .await?
            .into_iter()
            .map(CachedRestaurant::from)
            .filter(|r| !nearby_ids.contains(&r.id))
            .collect();

        let nearby_count = nearby.len();
        let mut written = self
            .populator
            .populate_restaurants(nearby.into_iter().chain(other).collect())
            .await?;
        let other = written.split_off(nearby_count);

        debug!(nearby = written.len(), other = other.len(), "Home refreshed");
        Ok((sorted_by_distance(written), sorted_by_distance(other)))
    }
}

fn sorted_by_distance(mut restaurants: Vec<CachedRestaurant>) -> Vec<CachedRestaurant> {
    restaurants.sort_by(|a, b| {
        a.distance
            .km()
            .total_cmp(&b.distance.km())
            .then(a.id.as_i32().cmp(&b.id.as_i32()))
    });
    restaurants
}
