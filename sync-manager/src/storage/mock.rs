//! Mock storage backends for testing.
//!
//! Each mock counts calls, can fail its next operation, and can hold a sync
//! in flight behind a gate so tests can overlap rounds deterministically.

use super::{
    BookmarksStore, EngineUnlockInfo, HistoryStore, LoginsStore, TabsStore,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use sync_types::{EngineStats, SyncError, SyncReason};
use tokio::sync::Notify;

/// A reusable open/closed gate for holding mock syncs in flight.
#[derive(Debug, Default)]
struct SyncGate {
    held: Mutex<bool>,
    notify: Notify,
}

impl SyncGate {
    fn hold(&self) {
        *self.held.lock().unwrap() = true;
    }

    fn release(&self) {
        *self.held.lock().unwrap() = false;
        self.notify.notify_waiters();
    }

    async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if !*self.held.lock().unwrap() {
                return;
            }
            notified.await;
        }
    }
}

/// Call counters and failure scripting shared by the simple engine mocks.
#[derive(Debug, Default)]
struct EngineMockState {
    sync_calls: Mutex<u32>,
    reset_calls: Mutex<u32>,
    fail_next_sync: Mutex<Option<String>>,
    fail_next_reset: Mutex<Option<String>>,
    gate: SyncGate,
}

impl EngineMockState {
    async fn run_sync(&self) -> Result<EngineStats, SyncError> {
        self.gate.wait().await;
        *self.sync_calls.lock().unwrap() += 1;
        if let Some(msg) = self.fail_next_sync.lock().unwrap().take() {
            return Err(SyncError::Network(msg));
        }
        Ok(EngineStats {
            applied: 1,
            failed: 0,
            uploaded: 1,
        })
    }

    async fn run_reset(&self) -> Result<(), SyncError> {
        *self.reset_calls.lock().unwrap() += 1;
        if let Some(msg) = self.fail_next_reset.lock().unwrap().take() {
            return Err(SyncError::Storage(msg));
        }
        Ok(())
    }
}

macro_rules! simple_engine_mock {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Default)]
        pub struct $name {
            state: Arc<EngineMockState>,
        }

        impl $name {
            /// Create a new mock backend.
            pub fn new() -> Self {
                Self::default()
            }

            /// Number of sync calls so far.
            pub fn sync_calls(&self) -> u32 {
                *self.state.sync_calls.lock().unwrap()
            }

            /// Number of metadata resets so far.
            pub fn reset_calls(&self) -> u32 {
                *self.state.reset_calls.lock().unwrap()
            }

            /// Cause the next sync to fail with a network error.
            pub fn fail_next_sync(&self, msg: &str) {
                *self.state.fail_next_sync.lock().unwrap() = Some(msg.to_string());
            }

            /// Cause the next reset to fail with a storage error.
            pub fn fail_next_reset(&self, msg: &str) {
                *self.state.fail_next_reset.lock().unwrap() = Some(msg.to_string());
            }

            /// Hold subsequent syncs in flight until [`Self::release_syncs`].
            pub fn hold_syncs(&self) {
                self.state.gate.hold();
            }

            /// Release syncs held by [`Self::hold_syncs`].
            pub fn release_syncs(&self) {
                self.state.gate.release();
            }
        }
    };
}

simple_engine_mock!(MockHistoryStore, "Mock history backend.");
simple_engine_mock!(MockBookmarksStore, "Mock bookmarks backend.");
simple_engine_mock!(MockLoginsStore, "Mock logins backend.");

#[async_trait]
impl HistoryStore for MockHistoryStore {
    async fn reset_history_metadata(&self) -> Result<(), SyncError> {
        self.state.run_reset().await
    }

    async fn sync(
        &self,
        _unlock: &EngineUnlockInfo,
        _reason: SyncReason,
    ) -> Result<EngineStats, SyncError> {
        self.state.run_sync().await
    }
}

#[async_trait]
impl BookmarksStore for MockBookmarksStore {
    async fn reset_bookmarks_metadata(&self) -> Result<(), SyncError> {
        self.state.run_reset().await
    }

    async fn sync(
        &self,
        _unlock: &EngineUnlockInfo,
        _reason: SyncReason,
    ) -> Result<EngineStats, SyncError> {
        self.state.run_sync().await
    }
}

#[async_trait]
impl LoginsStore for MockLoginsStore {
    async fn reset_sync(&self) -> Result<(), SyncError> {
        self.state.run_reset().await
    }

    async fn sync(
        &self,
        _unlock: &EngineUnlockInfo,
        _reason: SyncReason,
    ) -> Result<EngineStats, SyncError> {
        self.state.run_sync().await
    }
}

/// Mock remote tabs + client registry backend.
///
/// Tracks the clients and tabs engines separately, since both run against
/// this one store.
#[derive(Debug, Default)]
pub struct MockTabsStore {
    clients_sync_calls: Mutex<u32>,
    tabs_sync_calls: Mutex<u32>,
    remote_tabs_resets: Mutex<u32>,
    clients_registry_resets: Mutex<u32>,
    clear_local_commands_calls: Mutex<u32>,
    fail_next_clients_sync: Mutex<Option<String>>,
    fail_next_tabs_sync: Mutex<Option<String>>,
    gate: SyncGate,
}

impl MockTabsStore {
    /// Create a new mock backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of clients-engine sync calls so far.
    pub fn clients_sync_calls(&self) -> u32 {
        *self.clients_sync_calls.lock().unwrap()
    }

    /// Number of tabs-engine sync calls so far.
    pub fn tabs_sync_calls(&self) -> u32 {
        *self.tabs_sync_calls.lock().unwrap()
    }

    /// Number of remote-tabs metadata resets so far.
    pub fn remote_tabs_resets(&self) -> u32 {
        *self.remote_tabs_resets.lock().unwrap()
    }

    /// Number of client-registry resets so far.
    pub fn clients_registry_resets(&self) -> u32 {
        *self.clients_registry_resets.lock().unwrap()
    }

    /// Number of `clear_local_commands` calls so far.
    pub fn clear_local_commands_calls(&self) -> u32 {
        *self.clear_local_commands_calls.lock().unwrap()
    }

    /// Cause the next clients-engine sync to fail.
    pub fn fail_next_clients_sync(&self, msg: &str) {
        *self.fail_next_clients_sync.lock().unwrap() = Some(msg.to_string());
    }

    /// Cause the next tabs-engine sync to fail.
    pub fn fail_next_tabs_sync(&self, msg: &str) {
        *self.fail_next_tabs_sync.lock().unwrap() = Some(msg.to_string());
    }

    /// Hold subsequent syncs in flight until [`Self::release_syncs`].
    pub fn hold_syncs(&self) {
        self.gate.hold();
    }

    /// Release syncs held by [`Self::hold_syncs`].
    pub fn release_syncs(&self) {
        self.gate.release();
    }
}

#[async_trait]
impl TabsStore for MockTabsStore {
    async fn reset_remote_tabs(&self) -> Result<(), SyncError> {
        *self.remote_tabs_resets.lock().unwrap() += 1;
        Ok(())
    }

    async fn reset_clients_registry(&self) -> Result<(), SyncError> {
        *self.clients_registry_resets.lock().unwrap() += 1;
        Ok(())
    }

    async fn clear_local_commands(&self) -> Result<(), SyncError> {
        *self.clear_local_commands_calls.lock().unwrap() += 1;
        Ok(())
    }

    async fn sync_clients(
        &self,
        _unlock: &EngineUnlockInfo,
        _reason: SyncReason,
    ) -> Result<EngineStats, SyncError> {
        self.gate.wait().await;
        *self.clients_sync_calls.lock().unwrap() += 1;
        if let Some(msg) = self.fail_next_clients_sync.lock().unwrap().take() {
            return Err(SyncError::Network(msg));
        }
        Ok(EngineStats::default())
    }

    async fn sync_tabs(
        &self,
        _unlock: &EngineUnlockInfo,
        _reason: SyncReason,
    ) -> Result<EngineStats, SyncError> {
        self.gate.wait().await;
        *self.tabs_sync_calls.lock().unwrap() += 1;
        if let Some(msg) = self.fail_next_tabs_sync.lock().unwrap().take() {
            return Err(SyncError::Network(msg));
        }
        Ok(EngineStats::default())
    }
}
