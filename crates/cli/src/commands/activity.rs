//! Review and notification commands.

use dinesphere_client::AppState;
use dinesphere_client::models::{ReviewDraft, ReviewOutcome};
use dinesphere_core::RestaurantId;

use super::{CliError, say};

/// Print the user's reviews. `pending` limits to unrated visits.
///
/// # Errors
///
/// Returns `CliError` if the backend call fails.
pub async fn reviews(state: &AppState, pending: bool) -> Result<(), CliError> {
    let activity = state.activity();
    let reviews = if pending {
        activity.pending_reviews().await?
    } else {
        activity.reviews().await?
    };

    if reviews.is_empty() {
        say("No reviews");
    }
    for review in reviews {
        let name = review
            .business_name
            .unwrap_or_else(|| format!("restaurant {}", review.restaurant_id));
        let stars = if review.rating == 0 {
            "not rated".to_string()
        } else {
            format!("{}/5", review.rating)
        };
        say(format!("{name:<32} {stars:<9} {}", review.created_at));
        if !review.comment.is_empty() {
            say(format!("    {}", review.comment));
        }
    }
    Ok(())
}

/// Submit or replace a review.
///
/// # Errors
///
/// Returns `CliError` for an invalid rating or a failed call.
pub async fn review(
    state: &AppState,
    restaurant_id: i32,
    rating: u8,
    comment: Option<String>,
) -> Result<(), CliError> {
    let restaurant_id = RestaurantId::new(restaurant_id);
    let activity = state.activity();

    if let Some(existing) = activity.existing_review(restaurant_id).await? {
        say(format!(
            "Replacing your {}/5 review #{}",
            existing.rating, existing.id
        ));
    }

    let draft = ReviewDraft {
        restaurant_id,
        rating,
        comment: comment.unwrap_or_default(),
    };
    match activity.submit_review(&draft).await? {
        ReviewOutcome::Saved => say("Review saved"),
        ReviewOutcome::Updated => say("Review updated"),
    }
    Ok(())
}

/// Print notifications.
///
/// # Errors
///
/// Returns `CliError` if the backend call fails.
pub async fn notifications(state: &AppState) -> Result<(), CliError> {
    let notifications = state.activity().notifications().await?;
    if notifications.is_empty() {
        say("No notifications");
    }
    for n in notifications {
        say(format!("[{}] {}: {}", n.created_at, n.business_name, n.title));
        say(format!("    {}", n.message));
    }
    Ok(())
}
