//! Save/unsave, the saved list and the offline queue.

use dinesphere_client::AppState;
use dinesphere_client::services::{ReplayOutcome, SaveResult, SkipReason};
use dinesphere_core::RestaurantId;

use super::{CliError, restaurant_line, say};

/// Save or unsave a restaurant. `None` flips the current state.
///
/// # Errors
///
/// Returns `CliError` if not logged in, the online call fails, or the
/// local store fails.
pub async fn set(state: &AppState, restaurant_id: i32, saved: Option<bool>) -> Result<(), CliError> {
    let id = RestaurantId::new(restaurant_id);
    let saves = state.saves();
    let result = match saved {
        Some(saved) => saves.set_saved(id, saved).await?,
        None => saves.toggle(id).await?,
    };

    let verb = if result.saved() { "Saved" } else { "Unsaved" };
    match result {
        SaveResult::Synced { .. } => say(format!("{verb} restaurant {id}")),
        SaveResult::Queued(queued) => {
            let note = if queued.flag_updated {
                ""
            } else {
                " (not in the local cache)"
            };
            say(format!(
                "{verb} restaurant {id} offline, queued as #{}{note}",
                queued.action.id
            ));
        }
    }
    Ok(())
}

/// Print the saved list.
///
/// # Errors
///
/// Returns `CliError` if not logged in or the cache read fails.
pub async fn list(state: &AppState) -> Result<(), CliError> {
    let saved = state.saves().saved_list().await?;
    if saved.from_cache {
        say("(from local cache)");
    }
    if saved.restaurants.is_empty() {
        say("No saved restaurants");
    }
    saved.restaurants.iter().map(restaurant_line).for_each(say);
    Ok(())
}

/// Print queued actions.
///
/// # Errors
///
/// Returns `CliError` if the queue cannot be read.
pub async fn queue(state: &AppState) -> Result<(), CliError> {
    let actions = state.store().pending_actions().list().await?;
    if actions.is_empty() {
        say("Queue is empty");
    }
    for action in actions {
        let queued_at = action
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let error = action
            .last_error
            .map(|e| format!("  last error: {e}"))
            .unwrap_or_default();
        say(format!(
            "#{:<4} {:<7} restaurant {:<6} queued {queued_at}  attempts {}{error}",
            action.id.as_i32(),
            action.kind.as_str(),
            action.restaurant_id.as_i32(),
            action.attempts
        ));
    }
    Ok(())
}

/// Replay the queue now.
///
/// # Errors
///
/// Returns `CliError` if the queue cannot be read or updated.
pub async fn sync(state: &AppState) -> Result<(), CliError> {
    let report = state.sync().reconcile().await?;

    match report.skipped {
        Some(SkipReason::Offline) => {
            say(format!("Offline, {} actions kept", report.remaining));
            return Ok(());
        }
        Some(SkipReason::NotLoggedIn) => {
            say(format!("Not logged in, {} actions kept", report.remaining));
            return Ok(());
        }
        None => {}
    }

    for record in &report.records {
        let outcome = match &record.outcome {
            ReplayOutcome::Succeeded => "ok".to_string(),
            ReplayOutcome::Failed(error) => format!("failed: {error}"),
            ReplayOutcome::Deferred => "deferred".to_string(),
            ReplayOutcome::Dropped => "dropped (unknown kind)".to_string(),
        };
        say(format!(
            "#{:<4} {:<7} restaurant {:<6} {outcome}",
            record.action.id.as_i32(),
            record.action.kind.as_str(),
            record.action.restaurant_id.as_i32()
        ));
    }
    say(format!(
        "{} replayed, {} failed, {} deferred, {} still queued (policy {})",
        report.succeeded(),
        report.failed(),
        report.deferred(),
        report.remaining,
        state.sync().policy()
    ));
    Ok(())
}
