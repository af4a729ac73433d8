//! Key/value preferences.
//!
//! Holds small client settings that live outside the cache proper, such as
//! the push device token and whether it still has to be uploaded.

use chrono::Utc;
use sqlx::SqlitePool;

use super::RepositoryError;

/// Preference key for the push device token.
pub const DEVICE_TOKEN_KEY: &str = "device_token";

/// Preference key set while the device token has not reached the backend.
pub const DEVICE_TOKEN_PENDING_KEY: &str = "device_token_pending";

/// Repository for preferences.
pub struct PreferenceRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PreferenceRepository<'a> {
    /// Create a new preference repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a preference value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        let value = sqlx::query_scalar("SELECT value FROM preferences WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool)
            .await?;
        Ok(value)
    }

    /// Set a preference value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the write fails.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO preferences (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            ",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Delete a preference. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, key: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM preferences WHERE key = ?")
            .bind(key)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Whether a boolean flag preference is set to `true`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn flag(&self, key: &str) -> Result<bool, RepositoryError> {
        Ok(self.get(key).await?.as_deref() == Some("true"))
    }

    /// Set or clear a boolean flag preference.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the write fails.
    pub async fn set_flag(&self, key: &str, on: bool) -> Result<(), RepositoryError> {
        if on {
            self.set(key, "true").await
        } else {
            self.delete(key).await
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::Store;
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = Store::open_in_memory().await.unwrap();
        let prefs = store.preferences();

        assert_eq!(prefs.get(DEVICE_TOKEN_KEY).await.unwrap(), None);
        prefs.set(DEVICE_TOKEN_KEY, "tok-1").await.unwrap();
        prefs.set(DEVICE_TOKEN_KEY, "tok-2").await.unwrap();
        assert_eq!(
            prefs.get(DEVICE_TOKEN_KEY).await.unwrap().as_deref(),
            Some("tok-2")
        );

        prefs.delete(DEVICE_TOKEN_KEY).await.unwrap();
        prefs.delete(DEVICE_TOKEN_KEY).await.unwrap();
        assert_eq!(prefs.get(DEVICE_TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_flags() {
        let store = Store::open_in_memory().await.unwrap();
        let prefs = store.preferences();

        assert!(!prefs.flag(DEVICE_TOKEN_PENDING_KEY).await.unwrap());
        prefs.set_flag(DEVICE_TOKEN_PENDING_KEY, true).await.unwrap();
        assert!(prefs.flag(DEVICE_TOKEN_PENDING_KEY).await.unwrap());
        prefs.set_flag(DEVICE_TOKEN_PENDING_KEY, false).await.unwrap();
        assert!(!prefs.flag(DEVICE_TOKEN_PENDING_KEY).await.unwrap());
    }
}
