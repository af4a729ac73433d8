//! Local SQLite store for the offline cache.
//!
//! # Database: `dinesphere.db` (embedded, one file per device)
//!
//! ## Tables
//!
//! - `user_session` - Active login (zero or one row)
//! - `restaurants_cache` - Restaurant listings plus the local saved flag
//! - `categories_cache` - Menu categories per restaurant
//! - `menu_items_cache` - Menu items per category
//! - `pending_actions` - Save/unsave actions queued while offline
//! - `preferences` - Key/value settings (device token)
//!
//! # Migrations
//!
//! Migrations live in `crates/client/migrations/` and are applied when the
//! store is opened, or explicitly via:
//! ```bash
//! cargo run -p dinesphere-cli -- migrate
//! ```
//!
//! Migrations are additive. Dropping everything and re-creating the schema
//! only happens when [`StoreOptions::destructive_reset`] is set, which is
//! meant for test fixtures.

pub mod menu;
pub mod pending_actions;
pub mod preferences;
pub mod restaurants;
pub mod session;

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use thiserror::Error;
use tracing::{info, instrument, warn};

pub use menu::MenuRepository;
pub use pending_actions::{PendingActionRepository, QueuedToggle, SettledToggle};
pub use preferences::{DEVICE_TOKEN_KEY, DEVICE_TOKEN_PENDING_KEY, PreferenceRepository};
pub use restaurants::RestaurantRepository;
pub use session::SessionRepository;

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Every table the migrations create, in drop order.
const ALL_TABLES: &[&str] = &[
    "preferences",
    "pending_actions",
    "menu_items_cache",
    "categories_cache",
    "restaurants_cache",
    "user_session",
    "_sqlx_migrations",
];

/// URL for a private in-memory database.
pub const IN_MEMORY_URL: &str = "sqlite::memory:";

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,
}

/// How to open the local store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// `SQLite` connection string (`sqlite://path/to/file.db` or
    /// [`IN_MEMORY_URL`]).
    pub database_url: String,
    /// Pool size. Forced to 1 for in-memory databases, where every
    /// connection would otherwise see its own empty database.
    pub max_connections: u32,
    /// Drop every table and re-run migrations on open. Test fixtures only.
    pub destructive_reset: bool,
}

impl StoreOptions {
    /// Options for a file-backed database at `database_url`.
    #[must_use]
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 4,
            destructive_reset: false,
        }
    }

    /// Options for a private in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            database_url: IN_MEMORY_URL.to_string(),
            max_connections: 1,
            destructive_reset: false,
        }
    }

    /// Opt into dropping and re-creating the schema on open.
    #[must_use]
    pub const fn with_destructive_reset(mut self) -> Self {
        self.destructive_reset = true;
        self
    }

    fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }
}

/// Create an `SQLite` connection pool with sensible defaults.
///
/// File databases use WAL journaling so readers are not blocked by the
/// writer; every connection waits up to five seconds on a locked database
/// instead of failing immediately.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is invalid or the file cannot be opened.
pub async fn create_pool(options: &StoreOptions) -> Result<SqlitePool, sqlx::Error> {
    let mut connect = SqliteConnectOptions::from_str(&options.database_url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));

    let in_memory = options.is_in_memory();
    if !in_memory {
        connect = connect
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
    }

    let mut pool = SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { options.max_connections.max(1) })
        .acquire_timeout(Duration::from_secs(10));

    if in_memory {
        // The database lives exactly as long as its single connection.
        pool = pool.min_connections(1).idle_timeout(None).max_lifetime(None);
    }

    pool.connect_with(connect).await
}

/// The local store: one owned pool for the lifetime of the client.
///
/// Cloning is cheap and shares the pool. Call [`Store::close`] on shutdown.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open the store, applying pending migrations.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the database cannot be opened or a
    /// migration fails.
    #[instrument(skip(options), fields(url = %options.database_url))]
    pub async fn open(options: &StoreOptions) -> Result<Self, RepositoryError> {
        let pool = create_pool(options).await?;
        let store = Self { pool };

        if options.destructive_reset {
            warn!("Destructive reset requested, dropping all cache tables");
            store.drop_all_tables().await?;
        }

        MIGRATOR.run(&store.pool).await?;
        info!("Local store ready");

        Ok(store)
    }

    /// Open a fresh in-memory store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if migrations fail.
    pub async fn open_in_memory() -> Result<Self, RepositoryError> {
        Self::open(&StoreOptions::in_memory()).await
    }

    /// Wrap an existing pool. Migrations are not run.
    #[must_use]
    pub const fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Session repository.
    #[must_use]
    pub const fn sessions(&self) -> SessionRepository<'_> {
        SessionRepository::new(&self.pool)
    }

    /// Restaurant cache repository.
    #[must_use]
    pub const fn restaurants(&self) -> RestaurantRepository<'_> {
        RestaurantRepository::new(&self.pool)
    }

    /// Category and menu item cache repository.
    #[must_use]
    pub const fn menu(&self) -> MenuRepository<'_> {
        MenuRepository::new(&self.pool)
    }

    /// Pending-action queue repository.
    #[must_use]
    pub const fn pending_actions(&self) -> PendingActionRepository<'_> {
        PendingActionRepository::new(&self.pool)
    }

    /// Preference repository.
    #[must_use]
    pub const fn preferences(&self) -> PreferenceRepository<'_> {
        PreferenceRepository::new(&self.pool)
    }

    /// Close the pool, waiting for in-flight queries.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn drop_all_tables(&self) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for table in ALL_TABLES {
            sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Convert a non-negative integer column into `u32`.
pub(crate) fn column_u32(value: i64, column: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::DataCorruption(format!("{column} out of range: {value}"))
    })
}
