//! Storage backend abstraction.
//!
//! One trait per data domain. The backends own their schemas and their own
//! write serialization; the orchestrator only sequences *when* each engine's
//! sync runs and when sync metadata is reset. The "reset" operations discard
//! locally cached sync bookkeeping, never user data.
//!
//! The clients and tabs engines share [`TabsStore`]: remote tab state is
//! derived from the client registry, and the two historically shared a
//! storage table.

mod mock;

pub use mock::{MockBookmarksStore, MockHistoryStore, MockLoginsStore, MockTabsStore};

use async_trait::async_trait;
use std::sync::Arc;
use sync_types::{EngineStats, SyncError, SyncReason};

/// Engine-scoped session info a backend needs to perform its exchange.
#[derive(Debug, Clone)]
pub struct EngineUnlockInfo {
    /// Bearer token for the sync service.
    pub token: String,
    /// Key identifier for the engine's key material.
    pub kid: String,
    /// Token-server endpoint URL.
    pub tokenserver_url: String,
}

/// Browsing history backend.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Discard local history sync metadata, forcing a full resync.
    async fn reset_history_metadata(&self) -> Result<(), SyncError>;

    /// Perform the history engine's remote exchange.
    async fn sync(&self, unlock: &EngineUnlockInfo, reason: SyncReason)
        -> Result<EngineStats, SyncError>;
}

/// Bookmarks backend.
#[async_trait]
pub trait BookmarksStore: Send + Sync {
    /// Discard local bookmarks sync metadata, forcing a full resync.
    async fn reset_bookmarks_metadata(&self) -> Result<(), SyncError>;

    /// Perform the bookmarks engine's remote exchange.
    async fn sync(&self, unlock: &EngineUnlockInfo, reason: SyncReason)
        -> Result<EngineStats, SyncError>;
}

/// Remote tabs + client registry backend.
#[async_trait]
pub trait TabsStore: Send + Sync {
    /// Discard cached remote tabs sync metadata.
    async fn reset_remote_tabs(&self) -> Result<(), SyncError>;

    /// Discard the cached client registry.
    async fn reset_clients_registry(&self) -> Result<(), SyncError>;

    /// Discard queued remote commands that reference now-stale client state.
    async fn clear_local_commands(&self) -> Result<(), SyncError>;

    /// Perform the clients engine's remote exchange.
    async fn sync_clients(
        &self,
        unlock: &EngineUnlockInfo,
        reason: SyncReason,
    ) -> Result<EngineStats, SyncError>;

    /// Perform the tabs engine's remote exchange.
    async fn sync_tabs(
        &self,
        unlock: &EngineUnlockInfo,
        reason: SyncReason,
    ) -> Result<EngineStats, SyncError>;
}

/// Saved credentials backend.
#[async_trait]
pub trait LoginsStore: Send + Sync {
    /// Discard local logins sync metadata, forcing a full resync.
    async fn reset_sync(&self) -> Result<(), SyncError>;

    /// Perform the logins engine's remote exchange.
    async fn sync(&self, unlock: &EngineUnlockInfo, reason: SyncReason)
        -> Result<EngineStats, SyncError>;
}

/// The full set of storage backends, threaded through the coordinator's
/// constructor rather than reached via globals.
#[derive(Clone)]
pub struct Stores {
    /// History backend.
    pub history: Arc<dyn HistoryStore>,
    /// Bookmarks backend.
    pub bookmarks: Arc<dyn BookmarksStore>,
    /// Remote tabs + client registry backend.
    pub tabs: Arc<dyn TabsStore>,
    /// Logins backend.
    pub logins: Arc<dyn LoginsStore>,
}

impl Stores {
    /// A full set of mock backends, for tests.
    pub fn mocks() -> (
        Self,
        Arc<MockHistoryStore>,
        Arc<MockBookmarksStore>,
        Arc<MockTabsStore>,
        Arc<MockLoginsStore>,
    ) {
        let history = Arc::new(MockHistoryStore::new());
        let bookmarks = Arc::new(MockBookmarksStore::new());
        let tabs = Arc::new(MockTabsStore::new());
        let logins = Arc::new(MockLoginsStore::new());
        (
            Self {
                history: history.clone(),
                bookmarks: bookmarks.clone(),
                tabs: tabs.clone(),
                logins: logins.clone(),
            },
            history,
            bookmarks,
            tabs,
            logins,
        )
    }
}
