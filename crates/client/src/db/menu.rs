//! Database operations for cached menu categories and items.
//!
//! Both record sets are scoped by their parent id. The parent is not a
//! declared foreign key; the write paths below stamp it on every row.

use dinesphere_core::{CategoryId, MenuItemId, Price, RestaurantId};
use sqlx::SqlitePool;

use super::{RepositoryError, column_u32};
use crate::models::{CachedCategory, CachedMenuItem, menu::select_first};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    category_id: CategoryId,
    restaurant_id: RestaurantId,
    category_name: String,
    category_image: Option<String>,
    item_count: i64,
}

impl TryFrom<CategoryRow> for CachedCategory {
    type Error = RepositoryError;

    fn try_from(row: CategoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.category_id,
            restaurant_id: row.restaurant_id,
            name: row.category_name,
            image_url: row.category_image,
            item_count: column_u32(row.item_count, "item_count")?,
            selected: false,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MenuItemRow {
    menu_id: MenuItemId,
    category_id: CategoryId,
    menu_name: String,
    menu_description: Option<String>,
    menu_price: String,
    menu_image: Option<String>,
}

impl TryFrom<MenuItemRow> for CachedMenuItem {
    type Error = RepositoryError;

    fn try_from(row: MenuItemRow) -> Result<Self, Self::Error> {
        let price: Price = row.menu_price.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!(
                "menu item {} has invalid price {:?}: {e}",
                row.menu_id, row.menu_price
            ))
        })?;

        Ok(Self {
            id: row.menu_id,
            category_id: row.category_id,
            name: row.menu_name,
            description: row.menu_description,
            price,
            image_url: row.menu_image,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the menu cache.
pub struct MenuRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MenuRepository<'a> {
    /// Create a new menu repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace the categories of `restaurant_id`.
    ///
    /// Every row is written with `restaurant_id` as its parent, whatever the
    /// incoming value says.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any write fails.
    pub async fn upsert_categories(
        &self,
        restaurant_id: RestaurantId,
        categories: &[CachedCategory],
    ) -> Result<(), RepositoryError> {
        if categories.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for c in categories {
            sqlx::query(
                r"
                INSERT OR REPLACE INTO categories_cache (
                    category_id, restaurant_id, category_name, category_image, item_count
                )
                VALUES (?, ?, ?, ?, ?)
                ",
            )
            .bind(c.id)
            .bind(restaurant_id)
            .bind(&c.name)
            .bind(c.image_url.as_deref())
            .bind(i64::from(c.item_count))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Cached categories of a restaurant, ordered by id, first one selected.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `RepositoryError::DataCorruption` for a negative item count.
    pub async fn categories(
        &self,
        restaurant_id: RestaurantId,
    ) -> Result<Vec<CachedCategory>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            r"
            SELECT category_id, restaurant_id, category_name, category_image, item_count
            FROM categories_cache
            WHERE restaurant_id = ?
            ORDER BY category_id
            ",
        )
        .bind(restaurant_id)
        .fetch_all(self.pool)
        .await?;

        let mut categories = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<CachedCategory>, _>>()?;
        select_first(&mut categories);

        Ok(categories)
    }

    /// Insert or replace the items of `category_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any write fails.
    pub async fn upsert_items(
        &self,
        category_id: CategoryId,
        items: &[CachedMenuItem],
    ) -> Result<(), RepositoryError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for item in items {
            sqlx::query(
                r"
                INSERT OR REPLACE INTO menu_items_cache (
                    menu_id, category_id, menu_name, menu_description, menu_price, menu_image
                )
                VALUES (?, ?, ?, ?, ?, ?)
                ",
            )
            .bind(item.id)
            .bind(category_id)
            .bind(&item.name)
            .bind(item.description.as_deref())
            .bind(item.price.amount().to_string())
            .bind(item.image_url.as_deref())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Cached items of a category, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `RepositoryError::DataCorruption` for an unparseable price.
    pub async fn items(&self, category_id: CategoryId) -> Result<Vec<CachedMenuItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, MenuItemRow>(
            r"
            SELECT menu_id, category_id, menu_name, menu_description, menu_price, menu_image
            FROM menu_items_cache
            WHERE category_id = ?
            ORDER BY menu_id
            ",
        )
        .bind(category_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Case-insensitive search over cached item names and descriptions.
    ///
    /// Restricted to `category_id` when given, otherwise searches every
    /// cached item.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search_items(
        &self,
        category_id: Option<CategoryId>,
        query: &str,
    ) -> Result<Vec<CachedMenuItem>, RepositoryError> {
        let items = match category_id {
            Some(id) => self.items(id).await?,
            None => {
                let rows = sqlx::query_as::<_, MenuItemRow>(
                    r"
                    SELECT menu_id, category_id, menu_name, menu_description, menu_price, menu_image
                    FROM menu_items_cache
                    ORDER BY menu_id
                    ",
                )
                .fetch_all(self.pool)
                .await?;
                rows.into_iter()
                    .map(TryInto::try_into)
                    .collect::<Result<Vec<CachedMenuItem>, _>>()?
            }
        };

        Ok(items.into_iter().filter(|i| i.matches(query)).collect())
    }
}
