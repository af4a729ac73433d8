//! Replaying the offline action queue.
//!
//! While offline, save/unsave toggles are queued together with their
//! optimistic cache update. When connectivity returns, [`SyncService::reconcile`]
//! replays the queue in insertion order, one call at a time, and keeps
//! whatever the [`ClearPolicy`] says to keep.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use dinesphere_core::{ActionKind, RestaurantId, UserId};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::cache::SavedIds;
use super::require_user;
use crate::api::{ApiError, BackendClient};
use crate::connectivity::Connectivity;
use crate::db::{QueuedToggle, Store};
use crate::error::AppError;
use crate::models::PendingAction;

/// What reconciliation does with entries whose replay failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearPolicy {
    /// Delete entries that replayed successfully; keep failed ones with
    /// their attempt count and error for the next pass.
    #[default]
    RetainFailed,
    /// Dispatch every entry, then delete all of them whatever the outcome.
    ClearOnDispatch,
}

impl ClearPolicy {
    /// Configuration spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RetainFailed => "retain-failed",
            Self::ClearOnDispatch => "clear-on-dispatch",
        }
    }
}

impl fmt::Display for ClearPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClearPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retain-failed" => Ok(Self::RetainFailed),
            "clear-on-dispatch" => Ok(Self::ClearOnDispatch),
            other => Err(format!(
                "unknown clear policy {other:?} (expected retain-failed or clear-on-dispatch)"
            )),
        }
    }
}

/// Outcome of replaying one queued action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// The backend accepted the call.
    Succeeded,
    /// The call failed.
    Failed(String),
    /// Not replayed because an earlier action for the same restaurant
    /// failed in this pass.
    Deferred,
    /// Unknown kind; removed from the queue without a call.
    Dropped,
}

/// One queued action and what happened to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayRecord {
    /// The action as it was queued.
    pub action: PendingAction,
    /// Replay outcome.
    pub outcome: ReplayOutcome,
}

/// Why a reconciliation pass did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No network; the queue is kept.
    Offline,
    /// No session; there is no user to replay as.
    NotLoggedIn,
}

/// Aggregated result of a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReconcileReport {
    /// Per-action outcomes, in replay order.
    pub records: Vec<ReplayRecord>,
    /// Set when the pass was skipped entirely.
    pub skipped: Option<SkipReason>,
    /// Whether the saved-id set was refreshed afterwards.
    pub saved_ids_refreshed: bool,
    /// Entries still queued after the pass.
    pub remaining: u64,
}

impl ReconcileReport {
    fn skipped(reason: SkipReason, remaining: u64) -> Self {
        Self {
            skipped: Some(reason),
            remaining,
            ..Self::default()
        }
    }

    fn count(&self, pred: impl Fn(&ReplayOutcome) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.outcome)).count()
    }

    /// Number of successful replays.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, ReplayOutcome::Succeeded))
    }

    /// Number of failed replays.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ReplayOutcome::Failed(_)))
    }

    /// Number of deferred actions.
    #[must_use]
    pub fn deferred(&self) -> usize {
        self.count(|o| matches!(o, ReplayOutcome::Deferred))
    }

    /// Number of dropped unknown actions.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.count(|o| matches!(o, ReplayOutcome::Dropped))
    }

    /// Whether every replayed action went through.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped.is_none() && self.failed() == 0 && self.deferred() == 0
    }
}

/// Queues offline toggles and replays them on reconnect.
///
/// Clones share one replay lock, so two passes never interleave.
#[derive(Debug, Clone)]
pub struct SyncService {
    store: Store,
    api: BackendClient,
    connectivity: Connectivity,
    saved_ids: SavedIds,
    policy: ClearPolicy,
    replay_lock: Arc<Mutex<()>>,
}

impl SyncService {
    /// Create a new sync service.
    #[must_use]
    pub fn new(
        store: Store,
        api: BackendClient,
        connectivity: Connectivity,
        saved_ids: SavedIds,
        policy: ClearPolicy,
    ) -> Self {
        Self {
            store,
            api,
            connectivity,
            saved_ids,
            policy,
            replay_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The configured clear policy.
    #[must_use]
    pub const fn policy(&self) -> ClearPolicy {
        self.policy
    }

    /// Keep replay passes out until the guard is dropped.
    pub(crate) async fn hold_replay(&self) -> MutexGuard<'_, ()> {
        self.replay_lock.lock().await
    }

    /// Queue a toggle and apply it optimistically.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the queue write fails; nothing is
    /// changed in that case.
    #[instrument(skip(self), fields(kind = %kind, restaurant_id = %restaurant_id))]
    pub async fn queue_toggle(
        &self,
        kind: ActionKind,
        restaurant_id: RestaurantId,
    ) -> Result<QueuedToggle, AppError> {
        let queued = self
            .store
            .pending_actions()
            .record_optimistic_toggle(&kind, restaurant_id)
            .await?;
        self.saved_ids.apply(&kind, restaurant_id);

        info!(
            id = %queued.action.id,
            flag_updated = queued.flag_updated,
            "Queued action for replay"
        );
        Ok(queued)
    }

    /// Replay the queue if online and logged in.
    ///
    /// Actions are replayed strictly in insertion order, each awaited before
    /// the next. Afterwards the saved-id set is refreshed from the server.
    /// Remote failures never fail the pass; they are recorded in the
    /// report and handled per [`ClearPolicy`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the queue cannot be read or updated.
    #[instrument(skip(self), fields(policy = %self.policy))]
    pub async fn reconcile(&self) -> Result<ReconcileReport, AppError> {
        if !self.connectivity.is_online() {
            let remaining = self.store.pending_actions().count().await?;
            debug!(remaining, "Offline, keeping queue");
            return Ok(ReconcileReport::skipped(SkipReason::Offline, remaining));
        }

        // Held before the session is read, so a logout cannot slip in
        // between.
        let _guard = self.hold_replay().await;

        let user_id = match require_user(&self.store).await {
            Ok(user_id) => user_id,
            Err(AppError::NotLoggedIn) => {
                let remaining = self.store.pending_actions().count().await?;
                debug!(remaining, "No session, keeping queue");
                return Ok(ReconcileReport::skipped(SkipReason::NotLoggedIn, remaining));
            }
            Err(e) => return Err(e),
        };

        let actions = self.store.pending_actions().list().await?;
        let records = self.replay_all(&user_id, actions).await;
        self.apply_outcomes(&records).await?;

        // Refresh only after every replay has completed so the snapshot
        // reflects them.
        let saved_ids_refreshed = match self.refresh_saved_ids(&user_id).await {
            Ok(count) => {
                debug!(count, "Saved ids refreshed");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to refresh saved ids after replay");
                false
            }
        };

        let report = ReconcileReport {
            records,
            skipped: None,
            saved_ids_refreshed,
            remaining: self.store.pending_actions().count().await?,
        };

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            deferred = report.deferred(),
            dropped = report.dropped(),
            remaining = report.remaining,
            "Reconciliation finished"
        );

        Ok(report)
    }

    /// Replace the saved-id set with the server's saved list.
    ///
    /// Queued actions are re-applied on top, so an unconfirmed toggle is
    /// not undone by a stale snapshot. Returns the size of the new set.
    ///
    /// # Errors
    ///
    /// Returns `AppError` if the saved list or the queue cannot be read.
    pub async fn refresh_saved_ids(&self, user_id: &UserId) -> Result<usize, AppError> {
        let saved = self.api.saved_restaurants(user_id).await?;
        let queued = self.store.pending_actions().list().await?;

        self.saved_ids.replace(saved.iter().map(|r| r.id()));
        for action in &queued {
            self.saved_ids.apply(&action.kind, action.restaurant_id);
        }

        Ok(self.saved_ids.len())
    }

    /// Run [`Self::reconcile`] on every offline→online transition.
    ///
    /// The task holds a clone of the service and runs until aborted.
    #[must_use]
    pub fn spawn_reconnect_watcher(&self) -> JoinHandle<()> {
        let service = self.clone();
        let mut rx = self.connectivity.subscribe();

        tokio::spawn(async move {
            let mut was_online = *rx.borrow_and_update();

            while rx.changed().await.is_ok() {
                let online = *rx.borrow_and_update();
                if online && !was_online {
                    match service.reconcile().await {
                        Ok(report) => debug!(
                            replayed = report.records.len(),
                            remaining = report.remaining,
                            "Reconnect reconciliation done"
                        ),
                        Err(e) => error!(error = %e, "Reconnect reconciliation failed"),
                    }
                }
                was_online = online;
            }

            debug!("Connectivity closed, reconnect watcher exiting");
        })
    }

    async fn replay_all(&self, user_id: &UserId, actions: Vec<PendingAction>) -> Vec<ReplayRecord> {
        let mut failed_restaurants: HashSet<RestaurantId> = HashSet::new();
        let mut records = Vec::with_capacity(actions.len());

        for action in actions {
            let outcome = if matches!(action.kind, ActionKind::Other(_)) {
                warn!(
                    id = %action.id,
                    kind = %action.kind,
                    restaurant_id = %action.restaurant_id,
                    "Dropping queued action of unknown kind"
                );
                ReplayOutcome::Dropped
            } else if self.policy == ClearPolicy::RetainFailed
                && failed_restaurants.contains(&action.restaurant_id)
            {
                ReplayOutcome::Deferred
            } else {
                match self.replay_one(user_id, &action).await {
                    Ok(()) => ReplayOutcome::Succeeded,
                    Err(e) => {
                        warn!(
                            id = %action.id,
                            kind = %action.kind,
                            restaurant_id = %action.restaurant_id,
                            error = %e,
                            "Replay failed"
                        );
                        failed_restaurants.insert(action.restaurant_id);
                        ReplayOutcome::Failed(e.to_string())
                    }
                }
            };

            records.push(ReplayRecord { action, outcome });
        }

        records
    }

    async fn replay_one(&self, user_id: &UserId, action: &PendingAction) -> Result<(), ApiError> {
        match action.kind {
            ActionKind::Save => self.api.save_restaurant(user_id, action.restaurant_id).await,
            ActionKind::Unsave => self.api.unsave_restaurant(user_id, action.restaurant_id).await,
            // Filtered out before replay.
            ActionKind::Other(_) => Ok(()),
        }
    }

    async fn apply_outcomes(&self, records: &[ReplayRecord]) -> Result<(), AppError> {
        let queue = self.store.pending_actions();

        match self.policy {
            ClearPolicy::ClearOnDispatch => {
                let ids: Vec<_> = records.iter().map(|r| r.action.id).collect();
                let removed = queue.delete(&ids).await?;
                let lost = records
                    .iter()
                    .filter(|r| matches!(r.outcome, ReplayOutcome::Failed(_)))
                    .count();
                if lost > 0 {
                    warn!(lost, "Cleared queue after dispatch, failed actions discarded");
                }
                debug!(removed, "Queue cleared after dispatch");
            }
            ClearPolicy::RetainFailed => {
                let done: Vec<_> = records
                    .iter()
                    .filter(|r| {
                        matches!(r.outcome, ReplayOutcome::Succeeded | ReplayOutcome::Dropped)
                    })
                    .map(|r| r.action.id)
                    .collect();
                queue.delete(&done).await?;

                for record in records {
                    if let ReplayOutcome::Failed(error) = &record.outcome {
                        queue.mark_failed(record.action.id, error).await?;
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use dinesphere_core::PendingActionId;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::fixtures::{client_for, restaurant_json, restaurants_body};
    use crate::models::restaurant::fixtures::restaurant;

    async fn service(server: &MockServer, online: bool, policy: ClearPolicy) -> SyncService {
        let store = Store::open_in_memory().await.unwrap();
        store.sessions().put(&UserId::parse("17").unwrap()).await.unwrap();
        SyncService::new(
            store,
            client_for(server),
            Connectivity::new(online),
            SavedIds::new(),
            policy,
        )
    }

    async fn mount_saved_list(server: &MockServer, ids: &[i32]) {
        let rows = ids.iter().map(|id| restaurant_json(*id, 1.0)).collect();
        Mock::given(method("GET"))
            .and(path("/saved(get).php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(restaurants_body(rows)))
            .mount(server)
            .await;
    }

    fn ok() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"success": true}))
    }

    #[test]
    fn test_clear_policy_parse() {
        assert_eq!("retain-failed".parse::<ClearPolicy>().unwrap(), ClearPolicy::RetainFailed);
        assert_eq!(
            " Clear-On-Dispatch ".parse::<ClearPolicy>().unwrap(),
            ClearPolicy::ClearOnDispatch
        );
        assert!("never".parse::<ClearPolicy>().is_err());
        assert_eq!(ClearPolicy::default(), ClearPolicy::RetainFailed);
        assert_eq!(ClearPolicy::ClearOnDispatch.to_string(), "clear-on-dispatch");
    }

    #[test]
    fn test_report_counts() {
        let action = |id: i32| PendingAction {
            id: PendingActionId::new(id),
            kind: ActionKind::Save,
            restaurant_id: RestaurantId::new(1),
            created_at: None,
            attempts: 0,
            last_error: None,
        };
        let report = ReconcileReport {
            records: vec![
                ReplayRecord { action: action(1), outcome: ReplayOutcome::Succeeded },
                ReplayRecord { action: action(2), outcome: ReplayOutcome::Failed("x".into()) },
                ReplayRecord { action: action(3), outcome: ReplayOutcome::Deferred },
                ReplayRecord { action: action(4), outcome: ReplayOutcome::Dropped },
            ],
            ..ReconcileReport::default()
        };
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.deferred(), 1);
        assert_eq!(report.dropped(), 1);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_offline_reconcile_keeps_queue() {
        let server = MockServer::start().await;
        let sync = service(&server, false, ClearPolicy::RetainFailed).await;
        sync.queue_toggle(ActionKind::Save, RestaurantId::new(3)).await.unwrap();

        let report = sync.reconcile().await.unwrap();
        assert_eq!(report.skipped, Some(SkipReason::Offline));
        assert_eq!(report.remaining, 1);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_without_session_is_skipped() {
        let server = MockServer::start().await;
        let sync = service(&server, true, ClearPolicy::RetainFailed).await;
        sync.queue_toggle(ActionKind::Save, RestaurantId::new(3)).await.unwrap();
        sync.store.sessions().clear().await.unwrap();

        let report = sync.reconcile().await.unwrap();
        assert_eq!(report.skipped, Some(SkipReason::NotLoggedIn));
        assert_eq!(report.remaining, 1);
    }

    #[tokio::test]
    async fn test_queue_toggle_updates_cache_and_saved_ids() {
        let server = MockServer::start().await;
        let sync = service(&server, false, ClearPolicy::RetainFailed).await;
        sync.store.restaurants().upsert(&[restaurant(4, 2.0)]).await.unwrap();

        let queued = sync.queue_toggle(ActionKind::Save, RestaurantId::new(4)).await.unwrap();
        assert!(queued.flag_updated);
        assert!(sync.saved_ids.contains(RestaurantId::new(4)));
        let cached = sync.store.restaurants().get(RestaurantId::new(4)).await.unwrap().unwrap();
        assert!(cached.is_saved);
    }

    #[tokio::test]
    async fn test_replay_in_order_then_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/saved(post).php"))
            .and(body_string_contains("restaurant_id=1"))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/saved(delete).php"))
            .and(body_string_contains("restaurant_id=2"))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;
        mount_saved_list(&server, &[1, 8]).await;

        let sync = service(&server, true, ClearPolicy::RetainFailed).await;
        sync.queue_toggle(ActionKind::Save, RestaurantId::new(1)).await.unwrap();
        sync.queue_toggle(ActionKind::Unsave, RestaurantId::new(2)).await.unwrap();

        let report = sync.reconcile().await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.remaining, 0);
        assert!(report.saved_ids_refreshed);
        assert_eq!(
            sync.saved_ids.snapshot(),
            HashSet::from([RestaurantId::new(1), RestaurantId::new(8)])
        );

        // Replay calls precede the saved-list refresh.
        let paths: Vec<String> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect();
        assert_eq!(paths, vec!["/saved(post).php", "/saved(delete).php", "/saved(get).php"]);
    }

    #[tokio::test]
    async fn test_retain_failed_defers_same_restaurant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/saved(post).php"))
            .and(body_string_contains("restaurant_id=5"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/saved(post).php"))
            .and(body_string_contains("restaurant_id=6"))
            .respond_with(ok())
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/saved(delete).php"))
            .respond_with(ok())
            .expect(0)
            .mount(&server)
            .await;
        mount_saved_list(&server, &[6]).await;

        let sync = service(&server, true, ClearPolicy::RetainFailed).await;
        sync.queue_toggle(ActionKind::Save, RestaurantId::new(5)).await.unwrap();
        sync.queue_toggle(ActionKind::Save, RestaurantId::new(6)).await.unwrap();
        sync.queue_toggle(ActionKind::Unsave, RestaurantId::new(5)).await.unwrap();

        let report = sync.reconcile().await.unwrap();
        assert_eq!(report.failed(), 1);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.deferred(), 1);
        assert_eq!(report.remaining, 2);

        let left = sync.store.pending_actions().list().await.unwrap();
        assert_eq!(left.len(), 2);
        assert_eq!(left[0].restaurant_id, RestaurantId::new(5));
        assert_eq!(left[0].attempts, 1);
        assert!(left[0].last_error.is_some());
        assert_eq!(left[1].kind, ActionKind::Unsave);
        assert_eq!(left[1].attempts, 0);

        // The still-queued unsave wins over the refreshed server list.
        assert!(!sync.saved_ids.contains(RestaurantId::new(5)));
        assert!(sync.saved_ids.contains(RestaurantId::new(6)));
    }

    #[tokio::test]
    async fn test_clear_on_dispatch_discards_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/saved(post).php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "message": "Restaurant not found"
            })))
            .mount(&server)
            .await;
        mount_saved_list(&server, &[]).await;

        let sync = service(&server, true, ClearPolicy::ClearOnDispatch).await;
        sync.queue_toggle(ActionKind::Save, RestaurantId::new(1)).await.unwrap();
        sync.queue_toggle(ActionKind::Save, RestaurantId::new(1)).await.unwrap();

        let report = sync.reconcile().await.unwrap();
        // Nothing is deferred under this policy.
        assert_eq!(report.failed(), 2);
        assert_eq!(report.remaining, 0);
        assert!(sync.saved_ids.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_kind_dropped_without_call() {
        let server = MockServer::start().await;
        mount_saved_list(&server, &[]).await;
        let sync = service(&server, true, ClearPolicy::RetainFailed).await;
        sync.store
            .pending_actions()
            .append(&ActionKind::parse("ARCHIVE"), RestaurantId::new(2))
            .await
            .unwrap();

        let report = sync.reconcile().await.unwrap();
        assert_eq!(report.dropped(), 1);
        assert_eq!(report.remaining, 0);
        let paths: Vec<String> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect();
        assert_eq!(paths, vec!["/saved(get).php"]);
    }

    #[tokio::test]
    async fn test_refresh_failure_does_not_fail_pass() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/saved(post).php"))
            .respond_with(ok())
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/saved(get).php"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let sync = service(&server, true, ClearPolicy::RetainFailed).await;
        sync.queue_toggle(ActionKind::Save, RestaurantId::new(1)).await.unwrap();

        let report = sync.reconcile().await.unwrap();
        assert_eq!(report.succeeded(), 1);
        assert!(!report.saved_ids_refreshed);
        assert!(sync.saved_ids.contains(RestaurantId::new(1)));
    }

    #[tokio::test]
    async fn test_reconnect_watcher_replays() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/saved(post).php"))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;
        mount_saved_list(&server, &[1]).await;

        let sync = service(&server, false, ClearPolicy::RetainFailed).await;
        sync.queue_toggle(ActionKind::Save, RestaurantId::new(1)).await.unwrap();
        let watcher = sync.spawn_reconnect_watcher();

        sync.connectivity.set_online(true);
        for _ in 0..50 {
            if sync.store.pending_actions().count().await.unwrap() == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(sync.store.pending_actions().count().await.unwrap(), 0);
        watcher.abort();
    }
}
