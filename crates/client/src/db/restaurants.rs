//! Database operations for the restaurant listing cache.

use dinesphere_core::{Coordinates, DistanceKm, RestaurantId};
use sqlx::SqlitePool;

use super::RepositoryError;
use crate::models::CachedRestaurant;

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct RestaurantRow {
    restaurant_id: RestaurantId,
    business_name: String,
    address: String,
    image_url: Option<String>,
    latitude: f64,
    longitude: f64,
    rating: f64,
    distance_km: f64,
    is_saved: bool,
    discount: Option<String>,
    phone: Option<String>,
}

impl TryFrom<RestaurantRow> for CachedRestaurant {
    type Error = RepositoryError;

    #[allow(clippy::cast_possible_truncation)] // ratings are 0-5
    fn try_from(row: RestaurantRow) -> Result<Self, Self::Error> {
        if !row.distance_km.is_finite() {
            return Err(RepositoryError::DataCorruption(format!(
                "restaurant {} has non-finite distance",
                row.restaurant_id
            )));
        }

        Ok(Self {
            id: row.restaurant_id,
            name: row.business_name,
            address: row.address,
            image_url: row.image_url,
            location: Coordinates::new(row.latitude, row.longitude),
            rating: row.rating as f32,
            distance: DistanceKm::new(row.distance_km),
            is_saved: row.is_saved,
            discount: row.discount,
            phone: row.phone,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT restaurant_id, business_name, address, image_url, \
     latitude, longitude, rating, distance_km, is_saved, discount, phone \
     FROM restaurants_cache";

// =============================================================================
// Repository
// =============================================================================

/// Repository for cached restaurants.
pub struct RestaurantRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RestaurantRepository<'a> {
    /// Create a new restaurant repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace every restaurant by id in a single transaction.
    ///
    /// Readers never observe a partially written batch.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any write fails; nothing from
    /// the batch is kept in that case.
    pub async fn upsert(&self, restaurants: &[CachedRestaurant]) -> Result<(), RepositoryError> {
        if restaurants.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for r in restaurants {
            sqlx::query(
                r"
                INSERT OR REPLACE INTO restaurants_cache (
                    restaurant_id, business_name, address, image_url,
                    latitude, longitude, rating, distance_km,
                    is_saved, discount, phone
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )
            .bind(r.id)
            .bind(&r.name)
            .bind(&r.address)
            .bind(r.image_url.as_deref())
            .bind(r.location.latitude)
            .bind(r.location.longitude)
            .bind(f64::from(r.rating))
            .bind(r.distance.km())
            .bind(r.is_saved)
            .bind(r.discount.as_deref())
            .bind(r.phone.as_deref())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Upsert a fetched batch, letting the queue decide the saved flag.
    ///
    /// Each row's `is_saved` is only a fallback: if the queue holds a
    /// `SAVE` or `UNSAVE` for the restaurant, the latest one wins. The
    /// queue is read inside the write transaction, so a toggle queued
    /// concurrently is either seen here or applied after this batch.
    ///
    /// Returns the rows as written.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; nothing
    /// from the batch is kept in that case.
    pub async fn upsert_merging_queue(
        &self,
        mut restaurants: Vec<CachedRestaurant>,
    ) -> Result<Vec<CachedRestaurant>, RepositoryError> {
        if restaurants.is_empty() {
            return Ok(restaurants);
        }

        // The first statement writes, so the transaction holds the write
        // lock before the queue is consulted.
        let mut tx = self.pool.begin().await?;

        for r in &mut restaurants {
            sqlx::query(
                r"
                INSERT OR REPLACE INTO restaurants_cache (
                    restaurant_id, business_name, address, image_url,
                    latitude, longitude, rating, distance_km,
                    is_saved, discount, phone
                )
                VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
                    COALESCE(
                        (SELECT action_type = 'SAVE' FROM pending_actions
                         WHERE target_id = ?1 AND action_type IN ('SAVE', 'UNSAVE')
                         ORDER BY id DESC LIMIT 1),
                        ?9
                    ),
                    ?10, ?11
                )
                ",
            )
            .bind(r.id)
            .bind(&r.name)
            .bind(&r.address)
            .bind(r.image_url.as_deref())
            .bind(r.location.latitude)
            .bind(r.location.longitude)
            .bind(f64::from(r.rating))
            .bind(r.distance.km())
            .bind(r.is_saved)
            .bind(r.discount.as_deref())
            .bind(r.phone.as_deref())
            .execute(&mut *tx)
            .await?;

            let (saved,): (bool,) =
                sqlx::query_as("SELECT is_saved FROM restaurants_cache WHERE restaurant_id = ?")
                    .bind(r.id)
                    .fetch_one(&mut *tx)
                    .await?;
            r.is_saved = saved;
        }

        tx.commit().await?;
        Ok(restaurants)
    }

    /// Every cached restaurant, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn all(&self) -> Result<Vec<CachedRestaurant>, RepositoryError> {
        let rows = sqlx::query_as::<_, RestaurantRow>(&format!(
            "{SELECT_COLUMNS} ORDER BY restaurant_id"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Cached restaurants at most `radius_km` away (inclusive), nearest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn within(&self, radius_km: f64) -> Result<Vec<CachedRestaurant>, RepositoryError> {
        let rows = sqlx::query_as::<_, RestaurantRow>(&format!(
            "{SELECT_COLUMNS} WHERE distance_km <= ? ORDER BY distance_km, restaurant_id"
        ))
        .bind(radius_km)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Cached restaurants strictly further than `radius_km`, nearest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn beyond(&self, radius_km: f64) -> Result<Vec<CachedRestaurant>, RepositoryError> {
        let rows = sqlx::query_as::<_, RestaurantRow>(&format!(
            "{SELECT_COLUMNS} WHERE distance_km > ? ORDER BY distance_km, restaurant_id"
        ))
        .bind(radius_km)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a cached restaurant by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: RestaurantId) -> Result<Option<CachedRestaurant>, RepositoryError> {
        let row = sqlx::query_as::<_, RestaurantRow>(&format!(
            "{SELECT_COLUMNS} WHERE restaurant_id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Cached restaurants currently flagged as saved, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn saved(&self) -> Result<Vec<CachedRestaurant>, RepositoryError> {
        let rows = sqlx::query_as::<_, RestaurantRow>(&format!(
            "{SELECT_COLUMNS} WHERE is_saved = 1 ORDER BY restaurant_id"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Set the saved flag on a cached restaurant.
    ///
    /// Returns `false` when no row matched. A missing row is not an error:
    /// the restaurant may simply not have been listed yet.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_saved(&self, id: RestaurantId, saved: bool) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE restaurants_cache SET is_saved = ? WHERE restaurant_id = ?")
            .bind(saved)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Case-insensitive search over cached names and addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search(&self, query: &str) -> Result<Vec<CachedRestaurant>, RepositoryError> {
        let restaurants = self.all().await?;
        Ok(restaurants.into_iter().filter(|r| r.matches(query)).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use dinesphere_core::ActionKind;

    use super::super::Store;
    use super::*;
    use crate::models::restaurant::fixtures::restaurant;

    #[tokio::test]
    async fn test_upsert_replaces_by_primary_key() {
        let store = Store::open_in_memory().await.unwrap();
        let repo = store.restaurants();

        repo.upsert(&[restaurant(1, 1.0), restaurant(2, 2.0)])
            .await
            .unwrap();

        let mut updated = restaurant(1, 1.5);
        updated.name = "Renamed".into();
        updated.rating = 4.5;
        repo.upsert(&[updated]).await.unwrap();

        let all = repo.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, RestaurantId::new(1));
        assert_eq!(all[0].name, "Renamed");
        assert_eq!(all[0].rating, 4.5);
        assert_eq!(all[0].distance.km(), 1.5);
        assert_eq!(all[1].name, "Restaurant 2");
    }

    #[tokio::test]
    async fn test_roundtrip_keeps_optional_fields() {
        let store = Store::open_in_memory().await.unwrap();
        let mut r = restaurant(5, 3.0);
        r.discount = Some("20% off".into());
        r.phone = None;
        r.image_url = None;
        r.is_saved = true;
        store.restaurants().upsert(&[r.clone()]).await.unwrap();

        let loaded = store
            .restaurants()
            .get(RestaurantId::new(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, r);
    }

    #[tokio::test]
    async fn test_within_and_beyond_split_on_inclusive_boundary() {
        let store = Store::open_in_memory().await.unwrap();
        let batch: Vec<_> = [0.5, 1.0, 2.0, 3.0, 4.9, 5.0, 5.1, 7.0, 10.0, 25.0]
            .iter()
            .zip(1..)
            .map(|(d, id)| restaurant(id, *d))
            .collect();
        store.restaurants().upsert(&batch).await.unwrap();

        let nearby = store.restaurants().within(5.0).await.unwrap();
        let other = store.restaurants().beyond(5.0).await.unwrap();
        assert_eq!(nearby.len(), 6);
        assert_eq!(other.len(), 4);
        assert!(nearby.iter().any(|r| r.distance.km() == 5.0));
    }

    #[tokio::test]
    async fn test_set_saved_missing_row_is_noop() {
        let store = Store::open_in_memory().await.unwrap();
        let hit = store
            .restaurants()
            .set_saved(RestaurantId::new(42), true)
            .await
            .unwrap();
        assert!(!hit);
        assert!(store.restaurants().all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_saved_flips_flag() {
        let store = Store::open_in_memory().await.unwrap();
        store.restaurants().upsert(&[restaurant(3, 1.0)]).await.unwrap();

        assert!(store
            .restaurants()
            .set_saved(RestaurantId::new(3), true)
            .await
            .unwrap());
        let saved = store.restaurants().saved().await.unwrap();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].is_saved);
    }

    #[tokio::test]
    async fn test_search_matches_name_and_address() {
        let store = Store::open_in_memory().await.unwrap();
        let mut karahi = restaurant(1, 1.0);
        karahi.name = "Karahi House".into();
        store
            .restaurants()
            .upsert(&[karahi, restaurant(2, 2.0)])
            .await
            .unwrap();

        let hits = store.restaurants().search("karahi").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, RestaurantId::new(1));

        let hits = store.restaurants().search("gulberg").await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_merging_upsert_lets_latest_queued_toggle_win() {
        let store = Store::open_in_memory().await.unwrap();
        let queue = store.pending_actions();
        queue
            .record_optimistic_toggle(&ActionKind::Save, RestaurantId::new(3))
            .await
            .unwrap();
        queue
            .record_optimistic_toggle(&ActionKind::Save, RestaurantId::new(4))
            .await
            .unwrap();
        queue
            .record_optimistic_toggle(&ActionKind::Unsave, RestaurantId::new(4))
            .await
            .unwrap();

        // The fetch started before the toggles and carries stale flags.
        let mut stale_four = restaurant(4, 2.0);
        stale_four.is_saved = true;
        let mut remote_five = restaurant(5, 3.0);
        remote_five.is_saved = true;

        let written = store
            .restaurants()
            .upsert_merging_queue(vec![restaurant(3, 1.0), stale_four, remote_five])
            .await
            .unwrap();
        let flags: Vec<bool> = written.iter().map(|r| r.is_saved).collect();
        assert_eq!(flags, vec![true, false, true]);

        let cached = store.restaurants().all().await.unwrap();
        assert_eq!(cached, written);
    }

    #[tokio::test]
    async fn test_merging_upsert_of_nothing_writes_nothing() {
        let store = Store::open_in_memory().await.unwrap();
        let written = store.restaurants().upsert_merging_queue(Vec::new()).await.unwrap();
        assert!(written.is_empty());
        assert!(store.restaurants().all().await.unwrap().is_empty());
    }
}
