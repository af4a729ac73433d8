//! Local store migration command.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending migrations to the cache database
//! dinesphere migrate
//!
//! # Drop every table and migrate from scratch
//! dinesphere migrate --reset
//! ```
//!
//! # Environment Variables
//!
//! - `DINESPHERE_DATABASE_URL` - `SQLite` connection string for the cache

use dinesphere_client::config::ClientConfig;
use dinesphere_client::db::{Store, StoreOptions};

use super::{CliError, say};

/// Apply migrations, optionally after dropping everything.
///
/// # Errors
///
/// Returns `CliError` if the store cannot be opened or migrated.
pub async fn run(config: &ClientConfig, reset: bool) -> Result<(), CliError> {
    let mut options = StoreOptions::new(config.database_url.clone());
    if reset {
        tracing::warn!(database_url = %config.database_url, "Resetting local store");
        options = options.with_destructive_reset();
    }

    tracing::info!("Running migrations...");
    let store = Store::open(&options).await?;
    let pending = store.pending_actions().count().await?;
    store.close().await;

    say(format!("Migrations complete ({pending} queued actions)"));
    Ok(())
}
