//! Database operations for the logged-in user.
//!
//! The table holds at most one row. Writing a new session replaces any
//! previous one.

use dinesphere_core::UserId;
use sqlx::SqlitePool;

use super::RepositoryError;

/// Repository for the active user session.
pub struct SessionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SessionRepository<'a> {
    /// Create a new session repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Record `user_id` as the logged-in user, replacing any prior session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the write fails.
    pub async fn put(&self, user_id: &UserId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_session")
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO user_session (user_id) VALUES (?)")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Get the logged-in user, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self) -> Result<Option<UserId>, RepositoryError> {
        let user_id = sqlx::query_scalar::<_, UserId>(
            "SELECT user_id FROM user_session ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(self.pool)
        .await?;

        Ok(user_id)
    }

    /// Remove the session (logout).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear(&self) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM user_session")
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// End the session and discard the queued actions made under it.
    ///
    /// Both deletes run in one transaction: either the user is logged out
    /// with an empty queue, or nothing changes. Returns the number of
    /// queued actions discarded.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if either delete fails.
    pub async fn end(&self) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let discarded = sqlx::query("DELETE FROM pending_actions")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM user_session")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(discarded)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use dinesphere_core::{ActionKind, RestaurantId};

    use super::super::Store;
    use super::*;

    #[tokio::test]
    async fn test_put_replaces_previous_session() {
        let store = Store::open_in_memory().await.unwrap();
        let sessions = store.sessions();

        assert!(sessions.get().await.unwrap().is_none());

        sessions.put(&UserId::parse("12").unwrap()).await.unwrap();
        sessions.put(&UserId::parse("34").unwrap()).await.unwrap();

        assert_eq!(sessions.get().await.unwrap().unwrap().as_str(), "34");
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM user_session")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_clear_removes_session() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .sessions()
            .put(&UserId::parse("12").unwrap())
            .await
            .unwrap();
        store.sessions().clear().await.unwrap();
        assert!(store.sessions().get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_end_discards_queue_with_session() {
        let store = Store::open_in_memory().await.unwrap();
        store.sessions().put(&UserId::parse("12").unwrap()).await.unwrap();
        store
            .pending_actions()
            .append(&ActionKind::Save, RestaurantId::new(1))
            .await
            .unwrap();

        assert_eq!(store.sessions().end().await.unwrap(), 1);
        assert!(store.sessions().get().await.unwrap().is_none());
        assert_eq!(store.pending_actions().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_end_keeps_queue_and_session() {
        let store = Store::open_in_memory().await.unwrap();
        store.sessions().put(&UserId::parse("12").unwrap()).await.unwrap();
        store
            .pending_actions()
            .append(&ActionKind::Save, RestaurantId::new(1))
            .await
            .unwrap();
        sqlx::query(
            r"
            CREATE TRIGGER keep_session BEFORE DELETE ON user_session
            BEGIN SELECT RAISE(ABORT, 'session locked'); END
            ",
        )
        .execute(store.pool())
        .await
        .unwrap();

        assert!(matches!(
            store.sessions().end().await,
            Err(RepositoryError::Database(_))
        ));
        assert_eq!(store.sessions().get().await.unwrap().unwrap().as_str(), "12");
        assert_eq!(store.pending_actions().count().await.unwrap(), 1);
    }
}
