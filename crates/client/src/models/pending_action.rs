//! Queued offline action.

use chrono::{DateTime, Utc};
use dinesphere_core::{ActionKind, PendingActionId, RestaurantId};
use serde::{Deserialize, Serialize};

/// A save/unsave recorded while offline, awaiting replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    /// Queue position (auto-increment, replay order).
    pub id: PendingActionId,
    /// What to replay.
    pub kind: ActionKind,
    /// Target restaurant.
    pub restaurant_id: RestaurantId,
    /// When the action was queued, if recorded.
    pub created_at: Option<DateTime<Utc>>,
    /// Number of failed replay attempts so far.
    pub attempts: u32,
    /// Error from the most recent failed attempt.
    pub last_error: Option<String>,
}
