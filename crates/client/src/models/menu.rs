//! Cached menu categories and items.

use dinesphere_core::{CategoryId, MenuItemId, Price, RestaurantId};
use serde::{Deserialize, Serialize};

/// A menu category belonging to a restaurant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCategory {
    /// Category identifier (cache primary key).
    pub id: CategoryId,
    /// Owning restaurant.
    pub restaurant_id: RestaurantId,
    /// Display name.
    pub name: String,
    /// Image reference, if any.
    pub image_url: Option<String>,
    /// Number of items the backend reports for this category.
    pub item_count: u32,
    /// UI selection marker. Never persisted.
    #[serde(skip)]
    pub selected: bool,
}

/// A single dish on a menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedMenuItem {
    /// Menu item identifier (cache primary key).
    pub id: MenuItemId,
    /// Owning category.
    pub category_id: CategoryId,
    /// Dish name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Price.
    pub price: Price,
    /// Image reference, if any.
    pub image_url: Option<String>,
}

impl CachedMenuItem {
    /// Case-insensitive match against name and description.
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self.name.to_lowercase().contains(&query)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&query))
    }
}

/// Mark the first category as selected and clear the rest.
pub fn select_first(categories: &mut [CachedCategory]) {
    for (i, category) in categories.iter_mut().enumerate() {
        category.selected = i == 0;
    }
}
