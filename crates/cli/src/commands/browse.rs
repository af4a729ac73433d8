//! Listing commands: home feed, menus and search.

use std::pin::pin;

use dinesphere_client::AppState;
use dinesphere_client::services::{FeedRows, FeedUpdate, Screen};
use dinesphere_core::{CategoryId, Coordinates, RestaurantId};
use futures::StreamExt;

use super::{CliError, restaurant_line, say};

/// Print the home feed around `at`, or around the saved location.
///
/// # Errors
///
/// Returns `CliError` if no location is known or the cache read fails.
pub async fn home(state: &AppState, at: Option<(f64, f64)>) -> Result<(), CliError> {
    let location = match at {
        Some((latitude, longitude)) => Coordinates::new(latitude, longitude),
        None => saved_location(state).await?,
    };

    let home = state.feed().home(location).await?;

    if home.offline {
        say("(offline, showing cached restaurants)");
    }
    if let Some(error) = &home.refresh_error {
        say(format!("(refresh failed: {error}; showing cached restaurants)"));
    }

    say(format!("Nearby ({}):", home.nearby.len()));
    home.nearby.iter().map(restaurant_line).for_each(say);
    say(format!("Other restaurants ({}):", home.other.len()));
    home.other.iter().map(restaurant_line).for_each(say);
    Ok(())
}

/// Print a restaurant's categories, or one category's items.
///
/// Shows every update of the load so cached and fresh rows are visible.
///
/// # Errors
///
/// Returns `CliError` if the cache read fails.
pub async fn menu(
    state: &AppState,
    restaurant_id: i32,
    category_id: Option<i32>,
) -> Result<(), CliError> {
    let screen = category_id.map_or_else(
        || Screen::Categories(RestaurantId::new(restaurant_id)),
        |id| Screen::MenuItems(CategoryId::new(id)),
    );

    let feed = state.feed();
    let mut updates = pin!(feed.load(screen));

    while let Some(update) = updates.next().await {
        match update? {
            FeedUpdate::Cached(rows) => {
                say(format!("cached ({}):", rows.len()));
                print_rows(&rows);
            }
            FeedUpdate::Fresh(rows) => {
                say(format!("fresh ({}):", rows.len()));
                print_rows(&rows);
            }
            FeedUpdate::Offline => say("(offline)"),
            FeedUpdate::RefreshFailed(error) => say(format!("(refresh failed: {error})")),
        }
    }
    Ok(())
}

/// Search the cache.
///
/// # Errors
///
/// Returns `CliError` if the cache read fails.
pub async fn search(state: &AppState, query: &str, menu: bool) -> Result<(), CliError> {
    let feed = state.feed();
    if menu {
        print_rows(&FeedRows::MenuItems(feed.search_menu(None, query).await?));
    } else {
        feed.search_restaurants(query)
            .await?
            .iter()
            .map(restaurant_line)
            .for_each(say);
    }
    Ok(())
}

async fn saved_location(state: &AppState) -> Result<Coordinates, CliError> {
    if !state.connectivity().is_online() {
        return Err(CliError::Usage(
            "Offline: pass --lat and --lon to pick a location".into(),
        ));
    }
    state
        .account()
        .location()
        .await?
        .map(|l| l.coordinates)
        .filter(Coordinates::is_set)
        .ok_or_else(|| CliError::Usage("No saved location; pass --lat and --lon".into()))
}

fn print_rows(rows: &FeedRows) {
    match rows {
        FeedRows::Restaurants(restaurants) => {
            restaurants.iter().map(restaurant_line).for_each(say);
        }
        FeedRows::Categories(categories) => {
            for c in categories {
                let marker = if c.selected { ">" } else { " " };
                say(format!(
                    "{marker} {:>5}  {} ({} items)",
                    c.id.as_i32(),
                    c.name,
                    c.item_count
                ));
            }
        }
        FeedRows::MenuItems(items) => {
            for item in items {
                say(format!("  {:>5}  {:<32} {}", item.id.as_i32(), item.name, item.price));
                if let Some(description) = &item.description {
                    say(format!("         {description}"));
                }
            }
        }
    }
}
