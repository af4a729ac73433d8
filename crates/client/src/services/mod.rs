//! Business logic services for the client.
//!
//! # Services
//!
//! - `cache` - Saved-id set and merging of fetched rows into the cache
//! - `sync` - Offline action queue replay on reconnect
//! - `feed` - Cached-first, refresh-second listing loads
//! - `saves` - Save/unsave toggling and the saved list
//! - `account` - Login, signup, location, profile and device token
//! - `activity` - Reviews and notifications

pub mod account;
pub mod activity;
pub mod cache;
pub mod feed;
pub mod saves;
pub mod sync;

pub use account::AccountService;
pub use activity::ActivityService;
pub use cache::{CachePopulator, SavedIds};
pub use feed::{FeedRows, FeedService, FeedUpdate, HomeFeed, Screen};
pub use saves::{SaveResult, SaveService, SavedList};
pub use sync::{ClearPolicy, ReconcileReport, ReplayOutcome, ReplayRecord, SkipReason, SyncService};

use dinesphere_core::UserId;

use crate::connectivity::Connectivity;
use crate::db::Store;
use crate::error::AppError;

/// The logged-in user, or `AppError::NotLoggedIn`.
pub(crate) async fn require_user(store: &Store) -> Result<UserId, AppError> {
    store.sessions().get().await?.ok_or(AppError::NotLoggedIn)
}

/// `Ok` while online, `AppError::Offline` otherwise.
pub(crate) fn require_online(connectivity: &Connectivity) -> Result<(), AppError> {
    if connectivity.is_online() {
        Ok(())
    } else {
        Err(AppError::Offline)
    }
}
