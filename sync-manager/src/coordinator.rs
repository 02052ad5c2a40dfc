//! The sync coordinator - public face of the orchestrator.
//!
//! [`SyncManager`] owns the round lifecycle: it drives readiness, runs the
//! engine-state reconciler, creates and retires the round's task reducer,
//! resolves the aggregate display state, and schedules periodic and
//! foreground-triggered syncs. At most one round is active at a time; a
//! sync request arriving mid-round appends to the active reducer and
//! resolves with that round's terminal result.

use crate::auth::AuthProvider;
use crate::engines::EngineContext;
use crate::prefs::SyncPrefs;
use crate::ready::ReadinessStateMachine;
use crate::reconcile::EngineStateReconciler;
use crate::reducer::TaskReducer;
use crate::server::SyncServerClient;
use crate::storage::Stores;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use sync_core::{
    resolve_display_state, should_sync_on_resume, FOREGROUND_MIN_DELAY, SYNC_SOON_DEBOUNCE,
    SYNC_TIMER_PERIOD,
};
use sync_types::{
    EngineIdentifier, NotStartedReason, SyncDisplayState, SyncError, SyncOperationResult,
    SyncOperationStatsSession, SyncReason, SyncStatus,
};
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;

/// Notifications broadcast to observers around each round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncNotification {
    /// A round began.
    Started,
    /// A round finished, with the resolved display state attached.
    Finished(SyncDisplayState),
}

/// Scheduling knobs. The defaults are the production values; tests shrink
/// them.
#[derive(Debug, Clone)]
pub struct SyncManagerConfig {
    /// Period of the repeating sync timer.
    pub timer_period: Duration,
    /// Minimum elapsed time before a foreground return triggers a sync.
    pub foreground_min_delay: Duration,
    /// Debounce applied to "sync soon" requests.
    pub sync_soon_debounce: Duration,
}

impl Default for SyncManagerConfig {
    fn default() -> Self {
        Self {
            timer_period: SYNC_TIMER_PERIOD,
            foreground_min_delay: FOREGROUND_MIN_DELAY,
            sync_soon_debounce: SYNC_SOON_DEBOUNCE,
        }
    }
}

struct CoordinatorState {
    // The active round's reducer, tagged with its round id so a stale
    // finalizer can never clear a newer round's handle.
    active: Option<(u64, TaskReducer)>,
    next_round: u64,
    display_state: SyncDisplayState,
    timer: Option<JoinHandle<()>>,
    sync_soon: Option<JoinHandle<()>>,
}

struct Inner {
    auth: Arc<dyn AuthProvider>,
    stores: Stores,
    prefs: SyncPrefs,
    readiness: ReadinessStateMachine,
    reconciler: EngineStateReconciler,
    config: SyncManagerConfig,
    state: Mutex<CoordinatorState>,
    notifications: broadcast::Sender<SyncNotification>,
    backgrounded: AtomicBool,
}

/// The public-facing sync orchestrator. Cheap to clone.
#[derive(Clone)]
pub struct SyncManager {
    inner: Arc<Inner>,
}

impl SyncManager {
    /// Create a manager with production scheduling defaults.
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        server: Arc<dyn SyncServerClient>,
        stores: Stores,
        prefs: SyncPrefs,
    ) -> Self {
        Self::with_config(auth, server, stores, prefs, SyncManagerConfig::default())
    }

    /// Create a manager with explicit scheduling knobs.
    pub fn with_config(
        auth: Arc<dyn AuthProvider>,
        server: Arc<dyn SyncServerClient>,
        stores: Stores,
        prefs: SyncPrefs,
        config: SyncManagerConfig,
    ) -> Self {
        let (notifications, _) = broadcast::channel(16);
        let readiness =
            ReadinessStateMachine::new(auth.clone(), server, prefs.clone());
        let reconciler = EngineStateReconciler::new(stores.clone());
        Self {
            inner: Arc::new(Inner {
                auth,
                stores,
                prefs,
                readiness,
                reconciler,
                config,
                state: Mutex::new(CoordinatorState {
                    active: None,
                    next_round: 0,
                    display_state: SyncDisplayState::Good,
                    timer: None,
                    sync_soon: None,
                }),
                notifications,
                backgrounded: AtomicBool::new(false),
            }),
        }
    }

    /// Sync every engine.
    pub async fn sync_everything(
        &self,
        reason: SyncReason,
    ) -> Result<SyncOperationResult, SyncError> {
        self.sync_engines(reason, EngineIdentifier::ALL.to_vec())
            .await
    }

    /// Sync the engines implied by the given public collection names.
    ///
    /// `"passwords"` maps to logins and `"tabs"` implies clients; unknown
    /// names are skipped with a warning. Duplicate engines across names are
    /// deduplicated by the reducer.
    pub async fn sync_named_collections(
        &self,
        reason: SyncReason,
        names: &[&str],
    ) -> Result<SyncOperationResult, SyncError> {
        let mut engines: Vec<EngineIdentifier> = Vec::new();
        let mut seen = BTreeSet::new();
        for name in names {
            let mapped = EngineIdentifier::from_collection_name(name);
            if mapped.is_empty() {
                tracing::warn!("ignoring unknown collection name {name:?}");
            }
            for engine in mapped {
                if seen.insert(engine) {
                    engines.push(engine);
                }
            }
        }
        self.sync_engines(reason, engines).await
    }

    /// Sync the clients engine alone.
    pub async fn sync_clients(&self) -> Result<SyncOperationResult, SyncError> {
        self.sync_engines(SyncReason::User, vec![EngineIdentifier::Clients])
            .await
    }

    /// Sync clients, then tabs.
    ///
    /// Both engines go into one batch. Two sequential calls would let the
    /// second request find a reducer still processing the first and treat
    /// tabs as already satisfied, silently dropping the tabs sync; batch
    /// composition matters here, not call ordering.
    pub async fn sync_clients_then_tabs(&self) -> Result<SyncOperationResult, SyncError> {
        self.sync_engines(
            SyncReason::User,
            vec![EngineIdentifier::Clients, EngineIdentifier::Tabs],
        )
        .await
    }

    /// Sync the history engine alone.
    pub async fn sync_history(&self) -> Result<SyncOperationResult, SyncError> {
        self.sync_engines(SyncReason::User, vec![EngineIdentifier::History])
            .await
    }

    /// Request engines for the current round, starting one if needed.
    async fn sync_engines(
        &self,
        reason: SyncReason,
        engines: Vec<EngineIdentifier>,
    ) -> Result<SyncOperationResult, SyncError> {
        if engines.is_empty() {
            return Ok(SyncOperationResult {
                engine_results: Vec::new(),
                stats: None,
            });
        }

        loop {
            let mut state = self.inner.state.lock().await;

            if let Some((_, reducer)) = &state.active {
                match reducer.append(engines.clone()) {
                    Ok(rx) => {
                        drop(state);
                        match rx.await {
                            Ok(result) => return Ok(result),
                            // Raced a finishing round; try again.
                            Err(_) => continue,
                        }
                    }
                    Err(_) => {
                        // The round finished but its owner has not cleared
                        // it yet; clear and start fresh.
                        tracing::debug!("clearing finished reducer before new round");
                        state.active = None;
                    }
                }
            }

            let _ = self.inner.notifications.send(SyncNotification::Started);
            state.display_state = SyncDisplayState::InProgress;
            tracing::info!("sync round starting ({reason}): {engines:?}");

            let ready = match self.inner.readiness.to_ready().await {
                Ok(ready) => Arc::new(ready),
                Err(err) => {
                    tracing::warn!("sync round failed readiness: {err}");
                    drop(state);
                    let status = SyncStatus::NotStarted(not_started_reason(&err));
                    let result = SyncOperationResult {
                        engine_results: engines.iter().map(|e| (*e, status.clone())).collect(),
                        stats: None,
                    };
                    // Finalize in an owned task so a caller dropped
                    // mid-await cannot leave the display state stuck.
                    let (done_tx, done_rx) = oneshot::channel();
                    let manager = self.clone();
                    tokio::spawn(async move {
                        manager.finish_round(&result).await;
                        let _ = done_tx.send(result);
                    });
                    return done_rx.await.map_err(|_| SyncError::RoundFinished);
                }
            };

            // All local resets must be acknowledged before any engine in
            // this round runs.
            let changes = self.inner.reconciler.changes_for_round(&ready);
            self.inner
                .reconciler
                .take_actions_on_engine_state_changes(changes)
                .await;

            let stats =
                SyncOperationStatsSession::new(reason, ready.uid, ready.local_device_id.clone());
            let ctx = EngineContext {
                stores: self.inner.stores.clone(),
                auth: self.inner.auth.clone(),
                ready,
                reason,
            };
            let round_id = state.next_round;
            state.next_round += 1;
            let reducer = TaskReducer::spawn(ctx, stats);
            let rx = reducer.append(engines.clone())?;
            state.active = Some((round_id, reducer));
            drop(state);

            // The round is driven to completion by its own task: aborting
            // a requesting caller (ending the timer mid-round) must not
            // orphan the finalization.
            let (done_tx, done_rx) = oneshot::channel();
            let manager = self.clone();
            tokio::spawn(async move {
                match rx.await {
                    Ok(result) => {
                        manager.clear_active(round_id).await;
                        manager.finish_round(&result).await;
                        let _ = done_tx.send(result);
                    }
                    Err(_) => {
                        tracing::error!("round ended without a terminal result");
                        manager.clear_active(round_id).await;
                    }
                }
            });
            return done_rx.await.map_err(|_| SyncError::RoundFinished);
        }
    }

    /// Drop the active reducer handle, but only when it still belongs to
    /// the given round. A stale finalizer racing a newer round must leave
    /// the newer round's handle in place.
    async fn clear_active(&self, round_id: u64) {
        let mut state = self.inner.state.lock().await;
        if state.active.as_ref().map(|(id, _)| *id) == Some(round_id) {
            state.active = None;
        }
    }

    async fn finish_round(&self, result: &SyncOperationResult) {
        let resolved = resolve_display_state(&result.engine_results);
        {
            let mut state = self.inner.state.lock().await;
            state.display_state = resolved.clone();
        }

        // Only a fully good round advances the last-finish gate.
        if resolved == SyncDisplayState::Good {
            self.inner.prefs.set_last_sync_finish_millis(now_millis());
        }

        if let Some(stats) = &result.stats {
            tracing::info!(
                "sync round finished ({}): {:?}, took {:?}ms",
                stats.why,
                resolved,
                stats.took_millis
            );
        } else {
            tracing::info!("sync round finished without engine I/O: {resolved:?}");
        }

        // A backgrounded app skips the completion broadcast; the round
        // itself still ran to completion.
        if !self.inner.backgrounded.load(Ordering::Relaxed) {
            let _ = self
                .inner
                .notifications
                .send(SyncNotification::Finished(resolved));
        }
    }

    /// Start the repeating sync timer. Idempotent.
    pub async fn begin_timed_syncs(&self) {
        let mut state = self.inner.state.lock().await;
        if state.timer.is_some() {
            return;
        }
        let manager = self.clone();
        let period = self.inner.config.timer_period;
        tracing::info!("sync timer started (period {period:?})");
        state.timer = Some(tokio::spawn(async move {
            let mut timer = tokio::time::interval(period);
            // The first tick completes immediately; skip it.
            timer.tick().await;
            loop {
                timer.tick().await;
                tracing::debug!("sync timer fired");
                if let Err(err) = manager.sync_everything(SyncReason::Scheduled).await {
                    tracing::warn!("timed sync failed: {err}");
                }
            }
        }));
    }

    /// Stop the repeating sync timer.
    pub async fn end_timed_syncs(&self) {
        let mut state = self.inner.state.lock().await;
        if let Some(handle) = state.timer.take() {
            handle.abort();
            tracing::info!("sync timer stopped");
        }
    }

    /// The app returned to the foreground.
    ///
    /// Schedules a debounced sync when enough time has passed since the
    /// last finished round, or when the wall clock moved backwards.
    pub async fn application_did_become_active(&self) {
        self.inner.backgrounded.store(false, Ordering::Relaxed);
        let last = self.inner.prefs.last_sync_finish_millis();
        if should_sync_on_resume(now_millis(), last, self.inner.config.foreground_min_delay) {
            self.sync_soon().await;
        }
    }

    /// The app moved to the background. The active round, if any, still
    /// runs to completion; only its completion broadcast is suppressed.
    pub fn application_did_enter_background(&self) {
        self.inner.backgrounded.store(true, Ordering::Relaxed);
    }

    /// Schedule a debounced full sync. Coalesces repeated requests.
    async fn sync_soon(&self) {
        let mut state = self.inner.state.lock().await;
        if let Some(handle) = &state.sync_soon {
            if !handle.is_finished() {
                return;
            }
        }
        let manager = self.clone();
        let delay = self.inner.config.sync_soon_debounce;
        state.sync_soon = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = manager.sync_everything(SyncReason::Backgrounded).await {
                tracing::warn!("deferred sync failed: {err}");
            }
        }));
    }

    /// True while a round is active.
    pub async fn is_syncing(&self) -> bool {
        let state = self.inner.state.lock().await;
        state.active.is_some() || state.display_state == SyncDisplayState::InProgress
    }

    /// The current aggregate display state.
    pub async fn display_state(&self) -> SyncDisplayState {
        self.inner.state.lock().await.display_state.clone()
    }

    /// Subscribe to round start/finish notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotification> {
        self.inner.notifications.subscribe()
    }

    /// Record a user-driven engine enablement change; takes effect at the
    /// next round's negotiation.
    pub fn set_engine_enabled(&self, engine: EngineIdentifier, enabled: bool) {
        self.inner.prefs.set_engine_enabled(engine, enabled);
    }

    /// The account was removed; wipe the sync-prefs branch wholesale.
    pub async fn on_account_removed(&self) {
        tracing::info!("account removed, clearing sync prefs");
        self.end_timed_syncs().await;
        self.inner.prefs.clear_all();
    }
}

fn not_started_reason(err: &SyncError) -> NotStartedReason {
    match err {
        SyncError::NoAccount => NotStartedReason::NoAccount,
        SyncError::Network(_) => NotStartedReason::Offline,
        _ => NotStartedReason::Unknown,
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MockAuthProvider;
    use crate::server::MockSyncServer;
    use crate::storage::{
        MockBookmarksStore, MockHistoryStore, MockLoginsStore, MockTabsStore,
    };

    struct Harness {
        manager: SyncManager,
        prefs: SyncPrefs,
        auth: MockAuthProvider,
        server: MockSyncServer,
        history: Arc<MockHistoryStore>,
        bookmarks: Arc<MockBookmarksStore>,
        tabs: Arc<MockTabsStore>,
        logins: Arc<MockLoginsStore>,
    }

    fn harness() -> Harness {
        harness_with_config(SyncManagerConfig::default())
    }

    fn harness_with_config(config: SyncManagerConfig) -> Harness {
        let auth = MockAuthProvider::new();
        let server = MockSyncServer::new();
        let prefs = SyncPrefs::new();
        prefs.set_auth_state(b"signed-in");
        let (stores, history, bookmarks, tabs, logins) = Stores::mocks();
        let manager = SyncManager::with_config(
            Arc::new(auth.clone()),
            Arc::new(server.clone()),
            stores,
            prefs.clone(),
            config,
        );
        Harness {
            manager,
            prefs,
            auth,
            server,
            history,
            bookmarks,
            tabs,
            logins,
        }
    }

    #[tokio::test]
    async fn sync_everything_runs_all_engines() {
        let h = harness();
        let result = h.manager.sync_everything(SyncReason::User).await.unwrap();

        assert_eq!(result.engine_results.len(), 5);
        assert!(result
            .engine_results
            .iter()
            .all(|(_, status)| status.is_completed()));
        assert_eq!(h.history.sync_calls(), 1);
        assert_eq!(h.bookmarks.sync_calls(), 1);
        assert_eq!(h.tabs.clients_sync_calls(), 1);
        assert_eq!(h.tabs.tabs_sync_calls(), 1);
        assert_eq!(h.logins.sync_calls(), 1);
        assert_eq!(h.manager.display_state().await, SyncDisplayState::Good);
        assert!(h.prefs.last_sync_finish_millis().is_some());
    }

    #[tokio::test]
    async fn named_collections_map_to_engines() {
        let h = harness();
        let result = h
            .manager
            .sync_named_collections(SyncReason::User, &["passwords", "bogus"])
            .await
            .unwrap();

        assert_eq!(result.engine_results.len(), 1);
        assert!(result.status_for(EngineIdentifier::Logins).is_some());
        assert_eq!(h.logins.sync_calls(), 1);
        assert_eq!(h.history.sync_calls(), 0);
    }

    #[tokio::test]
    async fn tabs_collection_name_brings_clients_along() {
        let h = harness();
        let result = h
            .manager
            .sync_named_collections(SyncReason::User, &["tabs"])
            .await
            .unwrap();

        assert!(result.status_for(EngineIdentifier::Clients).is_some());
        assert!(result.status_for(EngineIdentifier::Tabs).is_some());
        assert_eq!(h.tabs.clients_sync_calls(), 1);
        assert_eq!(h.tabs.tabs_sync_calls(), 1);
    }

    #[tokio::test]
    async fn all_unknown_names_short_circuit_without_a_round() {
        let h = harness();
        let result = h
            .manager
            .sync_named_collections(SyncReason::User, &["bogus"])
            .await
            .unwrap();

        assert!(result.engine_results.is_empty());
        assert_eq!(h.server.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn clients_then_tabs_reports_both_statuses() {
        let h = harness();
        let result = h.manager.sync_clients_then_tabs().await.unwrap();

        assert!(result
            .status_for(EngineIdentifier::Clients)
            .unwrap()
            .is_completed());
        assert!(result
            .status_for(EngineIdentifier::Tabs)
            .unwrap()
            .is_completed());
        assert_eq!(h.tabs.tabs_sync_calls(), 1);
    }

    #[tokio::test]
    async fn readiness_failure_reports_all_engines_not_started() {
        let h = harness();
        h.prefs.clear_auth_state();

        let result = h.manager.sync_everything(SyncReason::Startup).await.unwrap();

        assert_eq!(result.engine_results.len(), 5);
        assert!(result.engine_results.iter().all(|(_, status)| matches!(
            status,
            SyncStatus::NotStarted(NotStartedReason::NoAccount)
        )));
        assert!(matches!(
            h.manager.display_state().await,
            SyncDisplayState::Warning(_)
        ));
        assert_eq!(h.prefs.last_sync_finish_millis(), None);
        assert!(!h.manager.is_syncing().await);
    }

    #[tokio::test]
    async fn engine_failure_resolves_bad_but_siblings_complete() {
        let h = harness();
        h.history.fail_next_sync("server 503");

        let result = h
            .manager
            .sync_named_collections(SyncReason::User, &["history", "bookmarks"])
            .await
            .unwrap();

        assert!(!result
            .status_for(EngineIdentifier::History)
            .unwrap()
            .is_completed());
        assert!(result
            .status_for(EngineIdentifier::Bookmarks)
            .unwrap()
            .is_completed());
        assert!(matches!(
            h.manager.display_state().await,
            SyncDisplayState::Bad(_)
        ));
        // A bad round does not advance the foreground gate.
        assert_eq!(h.prefs.last_sync_finish_millis(), None);
    }

    #[tokio::test]
    async fn overlapping_requests_share_one_round() {
        let h = harness();
        h.history.hold_syncs();

        let manager_a = h.manager.clone();
        let task_a = tokio::spawn(async move {
            manager_a
                .sync_named_collections(SyncReason::Scheduled, &["history"])
                .await
                .unwrap()
        });

        // Let round A reach its engine dispatch before B arrives.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.manager.is_syncing().await);

        let manager_b = h.manager.clone();
        let task_b = tokio::spawn(async move {
            manager_b
                .sync_named_collections(SyncReason::User, &["history", "bookmarks"])
                .await
                .unwrap()
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        h.history.release_syncs();
        let result_a = task_a.await.unwrap();
        let result_b = task_b.await.unwrap();

        // One round: history ran once, bookmarks once (for B only).
        assert_eq!(h.history.sync_calls(), 1);
        assert_eq!(h.bookmarks.sync_calls(), 1);
        assert_eq!(
            result_a.status_for(EngineIdentifier::History),
            result_b.status_for(EngineIdentifier::History)
        );
        // Readiness ran once for the shared round.
        assert_eq!(h.server.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn server_reset_collections_trigger_local_resets_before_sync() {
        let h = harness();
        h.server.set_reset_collections(&["clients", "tabs", "history"]);

        h.manager.sync_everything(SyncReason::User).await.unwrap();

        // clients absorbed tabs: one pass over the shared store.
        assert_eq!(h.tabs.remote_tabs_resets(), 1);
        assert_eq!(h.tabs.clients_registry_resets(), 1);
        assert_eq!(h.history.reset_calls(), 1);
        assert_eq!(h.tabs.clear_local_commands_calls(), 1);
    }

    #[tokio::test]
    async fn notifications_bracket_the_round() {
        let h = harness();
        let mut rx = h.manager.subscribe();

        h.manager.sync_everything(SyncReason::User).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), SyncNotification::Started);
        assert_eq!(
            rx.recv().await.unwrap(),
            SyncNotification::Finished(SyncDisplayState::Good)
        );
    }

    #[tokio::test]
    async fn backgrounded_app_suppresses_finish_notification_only() {
        let h = harness();
        let mut rx = h.manager.subscribe();

        h.manager.application_did_enter_background();
        h.manager.sync_everything(SyncReason::Scheduled).await.unwrap();

        // The round ran to completion.
        assert_eq!(h.history.sync_calls(), 1);
        assert_eq!(rx.recv().await.unwrap(), SyncNotification::Started);
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn foreground_return_with_backwards_clock_still_syncs() {
        let h = harness_with_config(SyncManagerConfig {
            sync_soon_debounce: Duration::from_millis(10),
            ..SyncManagerConfig::default()
        });
        // last_finish in the future: the clock was set backwards.
        h.prefs.set_last_sync_finish_millis(now_millis() + 60 * 60 * 1000);

        h.manager.application_did_become_active().await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(h.history.sync_calls(), 1);
    }

    #[tokio::test]
    async fn recent_finish_suppresses_foreground_sync() {
        let h = harness_with_config(SyncManagerConfig {
            sync_soon_debounce: Duration::from_millis(10),
            ..SyncManagerConfig::default()
        });
        h.prefs.set_last_sync_finish_millis(now_millis());

        h.manager.application_did_become_active().await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.history.sync_calls(), 0);
    }

    #[tokio::test]
    async fn timed_syncs_fire_until_ended() {
        let h = harness_with_config(SyncManagerConfig {
            timer_period: Duration::from_millis(50),
            ..SyncManagerConfig::default()
        });

        h.manager.begin_timed_syncs().await;
        tokio::time::sleep(Duration::from_millis(180)).await;
        h.manager.end_timed_syncs().await;

        let fired = h.history.sync_calls();
        assert!(fired >= 1, "timer never fired");

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(h.history.sync_calls(), fired, "timer kept firing after end");
    }

    #[tokio::test]
    async fn ending_timed_syncs_mid_round_still_resolves_the_round() {
        let h = harness_with_config(SyncManagerConfig {
            timer_period: Duration::from_millis(30),
            ..SyncManagerConfig::default()
        });
        let mut rx = h.manager.subscribe();
        h.history.hold_syncs();

        h.manager.begin_timed_syncs().await;
        // Wait for the timer-fired round to reach its engines.
        for _ in 0..50 {
            if h.manager.is_syncing().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(h.manager.is_syncing().await);

        // Aborting the timer task mid-round must not orphan the round.
        h.manager.end_timed_syncs().await;
        h.history.release_syncs();

        for _ in 0..50 {
            if !h.manager.is_syncing().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(!h.manager.is_syncing().await);
        assert_eq!(h.manager.display_state().await, SyncDisplayState::Good);
        assert!(h.prefs.last_sync_finish_millis().is_some());
        assert_eq!(rx.recv().await.unwrap(), SyncNotification::Started);
        assert_eq!(
            rx.recv().await.unwrap(),
            SyncNotification::Finished(SyncDisplayState::Good)
        );
    }

    #[tokio::test]
    async fn stale_round_finalizer_leaves_newer_round_untouched() {
        let h = harness();

        let auth = MockAuthProvider::new();
        let prefs = SyncPrefs::new();
        prefs.set_auth_state(b"signed-in");
        let machine = ReadinessStateMachine::new(
            Arc::new(auth.clone()),
            Arc::new(MockSyncServer::new()),
            prefs,
        );
        let ready = Arc::new(machine.to_ready().await.unwrap());
        let (stores, _history, _bookmarks, _tabs, _logins) = Stores::mocks();
        let ctx = EngineContext {
            stores,
            auth: Arc::new(auth),
            ready,
            reason: SyncReason::User,
        };
        let reducer = TaskReducer::spawn(
            ctx,
            SyncOperationStatsSession::new(SyncReason::User, None, None),
        );
        {
            let mut state = h.manager.inner.state.lock().await;
            state.active = Some((7, reducer));
        }

        // An earlier round's finalizer must not wipe the newer handle.
        h.manager.clear_active(3).await;
        assert!(h.manager.inner.state.lock().await.active.is_some());

        h.manager.clear_active(7).await;
        assert!(h.manager.inner.state.lock().await.active.is_none());
    }

    #[tokio::test]
    async fn account_removal_wipes_prefs() {
        let h = harness();
        h.manager.sync_everything(SyncReason::User).await.unwrap();
        assert!(h.prefs.last_sync_finish_millis().is_some());

        h.manager.on_account_removed().await;

        assert_eq!(h.prefs.auth_state(), None);
        assert_eq!(h.prefs.last_sync_finish_millis(), None);
    }

    #[tokio::test]
    async fn engine_enablement_change_reaches_next_negotiation() {
        let h = harness();
        h.manager.set_engine_enabled(EngineIdentifier::Logins, false);

        h.manager.sync_everything(SyncReason::User).await.unwrap();

        // The flip was consumed by negotiation and triggered a logins reset.
        assert_eq!(h.logins.reset_calls(), 1);
        // The round still did its sync-scope token exchange.
        assert!(!h.auth.token_requests().is_empty());
    }
}
