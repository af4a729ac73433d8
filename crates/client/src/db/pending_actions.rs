//! Database operations for the offline action queue.
//!
//! Rows are replayed in id order. Queuing an action and flipping the cached
//! saved flag happen in one transaction so offline reads always reflect
//! what is queued.

use chrono::{DateTime, Utc};
use dinesphere_core::{ActionKind, PendingActionId, RestaurantId};
use sqlx::SqlitePool;
use tracing::debug;

use super::{RepositoryError, column_u32};
use crate::models::PendingAction;

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct PendingActionRow {
    id: PendingActionId,
    action_type: String,
    target_id: RestaurantId,
    created_at: Option<DateTime<Utc>>,
    attempts: i64,
    last_error: Option<String>,
}

impl TryFrom<PendingActionRow> for PendingAction {
    type Error = RepositoryError;

    fn try_from(row: PendingActionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            kind: ActionKind::parse(&row.action_type),
            restaurant_id: row.target_id,
            created_at: row.created_at,
            attempts: column_u32(row.attempts, "attempts")?,
            last_error: row.last_error,
        })
    }
}

/// Result of queuing an optimistic toggle.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedToggle {
    /// The queued row.
    pub action: PendingAction,
    /// Whether a cached restaurant row had its saved flag updated.
    pub flag_updated: bool,
}

/// Result of settling a restaurant's saved state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettledToggle {
    /// Queued toggles removed for the restaurant.
    pub superseded: u64,
    /// Whether a cached restaurant row had its saved flag updated.
    pub flag_updated: bool,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for queued offline actions.
pub struct PendingActionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PendingActionRepository<'a> {
    /// Create a new pending action repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Queue an action and apply its optimistic effect atomically.
    ///
    /// `SAVE` sets the cached saved flag and `UNSAVE` clears it. Unknown
    /// kinds are queued without touching the flag. If the restaurant is not
    /// cached the flag update matches no row, which is not an error.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if either write fails; neither is
    /// kept in that case.
    pub async fn record_optimistic_toggle(
        &self,
        kind: &ActionKind,
        restaurant_id: RestaurantId,
    ) -> Result<QueuedToggle, RepositoryError> {
        let created_at = Utc::now();
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO pending_actions (action_type, target_id, created_at, attempts) VALUES (?, ?, ?, 0)",
        )
        .bind(kind.as_str())
        .bind(restaurant_id)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        let id = i32::try_from(inserted.last_insert_rowid()).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "pending action id out of range: {}",
                inserted.last_insert_rowid()
            ))
        })?;

        let flag_updated = match kind.resulting_saved_state() {
            Some(saved) => {
                sqlx::query("UPDATE restaurants_cache SET is_saved = ? WHERE restaurant_id = ?")
                    .bind(saved)
                    .bind(restaurant_id)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected()
                    > 0
            }
            None => false,
        };

        tx.commit().await?;

        debug!(
            id,
            kind = %kind,
            restaurant_id = %restaurant_id,
            flag_updated,
            "Queued pending action"
        );

        Ok(QueuedToggle {
            action: PendingAction {
                id: PendingActionId::new(id),
                kind: kind.clone(),
                restaurant_id,
                created_at: Some(created_at),
                attempts: 0,
                last_error: None,
            },
            flag_updated,
        })
    }

    /// Alias of [`Self::record_optimistic_toggle`].
    ///
    /// # Errors
    ///
    /// See [`Self::record_optimistic_toggle`].
    pub async fn append(
        &self,
        kind: &ActionKind,
        restaurant_id: RestaurantId,
    ) -> Result<QueuedToggle, RepositoryError> {
        self.record_optimistic_toggle(kind, restaurant_id).await
    }

    /// Every queued action in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<PendingAction>, RepositoryError> {
        let rows = sqlx::query_as::<_, PendingActionRow>(
            r"
            SELECT id, action_type, target_id, created_at, attempts, last_error
            FROM pending_actions
            ORDER BY id
            ",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Number of queued actions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_actions")
            .fetch_one(self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Kind of the most recently queued action for a restaurant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn latest_kind(
        &self,
        restaurant_id: RestaurantId,
    ) -> Result<Option<ActionKind>, RepositoryError> {
        let kind: Option<String> = sqlx::query_scalar(
            "SELECT action_type FROM pending_actions WHERE target_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(restaurant_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(kind.as_deref().map(ActionKind::parse))
    }

    /// Remove every queued action.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM pending_actions")
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Remove the given actions in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any delete fails.
    pub async fn delete(&self, ids: &[PendingActionId]) -> Result<u64, RepositoryError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for id in ids {
            removed += sqlx::query("DELETE FROM pending_actions WHERE id = ?")
                .bind(*id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;

        Ok(removed)
    }

    /// Settle a restaurant's saved state after the server confirmed it.
    ///
    /// Drops every queued `SAVE` and `UNSAVE` for the restaurant and writes
    /// the confirmed flag in one transaction, so a later replay cannot
    /// resurrect an older toggle. Actions of other kinds stay queued.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if either write fails; neither is
    /// kept in that case.
    pub async fn settle_saved(
        &self,
        restaurant_id: RestaurantId,
        saved: bool,
    ) -> Result<SettledToggle, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let superseded = sqlx::query(
            "DELETE FROM pending_actions WHERE target_id = ? AND action_type IN ('SAVE', 'UNSAVE')",
        )
        .bind(restaurant_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let flag_updated =
            sqlx::query("UPDATE restaurants_cache SET is_saved = ? WHERE restaurant_id = ?")
                .bind(saved)
                .bind(restaurant_id)
                .execute(&mut *tx)
                .await?
                .rows_affected()
                > 0;

        tx.commit().await?;

        if superseded > 0 {
            debug!(
                restaurant_id = %restaurant_id,
                superseded,
                "Dropped queued toggles superseded by a direct call"
            );
        }

        Ok(SettledToggle {
            superseded,
            flag_updated,
        })
    }

    /// Record a failed replay attempt.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the action no longer exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn mark_failed(&self, id: PendingActionId, error: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE pending_actions SET attempts = attempts + 1, last_error = ? WHERE id = ?",
        )
        .bind(error)
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::Store;
    use super::*;
    use crate::models::restaurant::fixtures::restaurant;

    #[tokio::test]
    async fn test_save_flips_cached_flag_immediately() {
        let store = Store::open_in_memory().await.unwrap();
        store.restaurants().upsert(&[restaurant(7, 1.0)]).await.unwrap();

        let queued = store
            .pending_actions()
            .record_optimistic_toggle(&ActionKind::Save, RestaurantId::new(7))
            .await
            .unwrap();
        assert!(queued.flag_updated);
        assert_eq!(queued.action.kind, ActionKind::Save);

        let cached = store
            .restaurants()
            .get(RestaurantId::new(7))
            .await
            .unwrap()
            .unwrap();
        assert!(cached.is_saved);
    }

    #[tokio::test]
    async fn test_append_for_uncached_restaurant_is_noop_flag() {
        let store = Store::open_in_memory().await.unwrap();

        let queued = store
            .pending_actions()
            .append(&ActionKind::parse("SAVE"), RestaurantId::new(42))
            .await
            .unwrap();
        assert!(!queued.flag_updated);

        let queue = store.pending_actions().list().await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].restaurant_id, RestaurantId::new(42));
        assert!(store.restaurants().all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let store = Store::open_in_memory().await.unwrap();
        let queue = store.pending_actions();
        queue
            .record_optimistic_toggle(&ActionKind::Save, RestaurantId::new(1))
            .await
            .unwrap();
        queue
            .record_optimistic_toggle(&ActionKind::Unsave, RestaurantId::new(1))
            .await
            .unwrap();
        queue
            .record_optimistic_toggle(&ActionKind::Save, RestaurantId::new(2))
            .await
            .unwrap();

        let kinds: Vec<_> = queue
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|a| (a.kind, a.restaurant_id.as_i32()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (ActionKind::Save, 1),
                (ActionKind::Unsave, 1),
                (ActionKind::Save, 2)
            ]
        );
        assert_eq!(
            queue.latest_kind(RestaurantId::new(1)).await.unwrap(),
            Some(ActionKind::Unsave)
        );
        assert_eq!(queue.latest_kind(RestaurantId::new(3)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_kind_is_queued_without_flag_change() {
        let store = Store::open_in_memory().await.unwrap();
        store.restaurants().upsert(&[restaurant(3, 1.0)]).await.unwrap();

        let queued = store
            .pending_actions()
            .record_optimistic_toggle(&ActionKind::parse("ARCHIVE"), RestaurantId::new(3))
            .await
            .unwrap();
        assert!(!queued.flag_updated);

        let queue = store.pending_actions().list().await.unwrap();
        assert_eq!(queue[0].kind, ActionKind::Other("ARCHIVE".into()));
    }

    #[tokio::test]
    async fn test_mark_failed_and_delete() {
        let store = Store::open_in_memory().await.unwrap();
        let queue = store.pending_actions();
        let a = queue
            .record_optimistic_toggle(&ActionKind::Save, RestaurantId::new(1))
            .await
            .unwrap()
            .action;
        let b = queue
            .record_optimistic_toggle(&ActionKind::Save, RestaurantId::new(2))
            .await
            .unwrap()
            .action;

        queue.mark_failed(b.id, "HTTP 500").await.unwrap();
        queue.mark_failed(b.id, "HTTP 502").await.unwrap();
        assert_eq!(queue.delete(&[a.id]).await.unwrap(), 1);

        let remaining = queue.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, b.id);
        assert_eq!(remaining[0].attempts, 2);
        assert_eq!(remaining[0].last_error.as_deref(), Some("HTTP 502"));
        assert!(remaining[0].created_at.is_some());

        assert!(matches!(
            queue.mark_failed(a.id, "gone").await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_clear_empties_queue() {
        let store = Store::open_in_memory().await.unwrap();
        let queue = store.pending_actions();
        queue
            .record_optimistic_toggle(&ActionKind::Save, RestaurantId::new(1))
            .await
            .unwrap();
        queue
            .record_optimistic_toggle(&ActionKind::Unsave, RestaurantId::new(2))
            .await
            .unwrap();

        assert_eq!(queue.clear().await.unwrap(), 2);
        assert_eq!(queue.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_settle_saved_drops_only_that_restaurants_toggles() {
        let store = Store::open_in_memory().await.unwrap();
        store.restaurants().upsert(&[restaurant(1, 1.0)]).await.unwrap();
        let queue = store.pending_actions();
        queue
            .record_optimistic_toggle(&ActionKind::Save, RestaurantId::new(1))
            .await
            .unwrap();
        queue
            .record_optimistic_toggle(&ActionKind::parse("ARCHIVE"), RestaurantId::new(1))
            .await
            .unwrap();
        queue
            .record_optimistic_toggle(&ActionKind::Save, RestaurantId::new(2))
            .await
            .unwrap();

        let settled = queue.settle_saved(RestaurantId::new(1), false).await.unwrap();
        assert_eq!(
            settled,
            SettledToggle {
                superseded: 1,
                flag_updated: true
            }
        );

        let left: Vec<_> = queue
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|a| (a.kind, a.restaurant_id.as_i32()))
            .collect();
        assert_eq!(
            left,
            vec![
                (ActionKind::Other("ARCHIVE".into()), 1),
                (ActionKind::Save, 2)
            ]
        );

        let cached = store
            .restaurants()
            .get(RestaurantId::new(1))
            .await
            .unwrap()
            .unwrap();
        assert!(!cached.is_saved);
    }
}
