//! # sync-manager
//!
//! Async orchestration for device-sync: the readiness state machine, the
//! per-round engine-state reconciler, the serialized task reducer, and the
//! [`SyncManager`] coordinator that the host application drives.
//!
//! ## Architecture
//!
//! ```text
//! host app ──▶ SyncManager (coordinator)
//!                 │  to_ready()        ──▶ ReadinessStateMachine
//!                 │  reconcile          ──▶ EngineStateReconciler ──▶ stores
//!                 │  append(engines)    ──▶ TaskReducer (actor)
//!                 │                           └─▶ sync_engine() per engine
//!                 └─ resolve display, broadcast notifications
//! ```
//!
//! The pure decision logic (round ledger, enablement diff, scheduling
//! gates, display resolution) lives in `sync-core`; this crate owns the
//! I/O, the tasks, and the timers. Mock implementations of every external
//! seam (`MockAuthProvider`, `MockSyncServer`, the mock stores) ship in the
//! library so host applications can test their integration without a
//! server.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod coordinator;
pub mod engines;
pub mod prefs;
pub mod ready;
pub mod reconcile;
pub mod reducer;
pub mod reset;
pub mod server;
pub mod storage;

pub use auth::{AccessTokenInfo, AuthProvider, MockAuthProvider, ScopedKeyBundle};
pub use coordinator::{SyncManager, SyncManagerConfig, SyncNotification};
pub use prefs::SyncPrefs;
pub use ready::{ReadinessStateMachine, ReadyContext};
pub use reconcile::EngineStateReconciler;
pub use reducer::TaskReducer;
pub use server::{CollectionInfo, MockSyncServer, SyncServerClient};
pub use storage::{
    BookmarksStore, EngineUnlockInfo, HistoryStore, LoginsStore, Stores, TabsStore,
};
