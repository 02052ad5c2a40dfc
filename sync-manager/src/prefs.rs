//! The persisted sync-prefs branch.
//!
//! A small string-keyed store holding engine enablement flags, the last
//! sync-finish timestamp, the opaque auth-state blob, and the cached server
//! collection info. Layout:
//!
//! - `engine.<name>.enabled` - `"true"` / `"false"`
//! - `engine.<name>.enabled-state-changed` - set when the user flipped the
//!   engine since the last successful negotiation
//! - `sync.last-finish-millis`
//! - `sync.auth-state` - base64 blob, cleared wholesale on account removal
//! - `sync.collection-info` - JSON snapshot of the last server fetch
//!
//! Backed by an in-memory map with JSON snapshot import/export; the host
//! application decides where snapshots live on disk. All mutation happens
//! behind one mutex, so reads observe complete writes.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use sync_types::{EngineIdentifier, SyncError};

const KEY_LAST_FINISH: &str = "sync.last-finish-millis";
const KEY_AUTH_STATE: &str = "sync.auth-state";
const KEY_COLLECTION_INFO: &str = "sync.collection-info";

/// Handle to the sync-prefs branch. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct SyncPrefs {
    map: Arc<Mutex<BTreeMap<String, String>>>,
}

impl SyncPrefs {
    /// Create an empty prefs branch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Import a prefs branch from a JSON snapshot.
    pub fn from_snapshot(json: &str) -> Result<Self, SyncError> {
        let map: BTreeMap<String, String> =
            serde_json::from_str(json).map_err(|e| SyncError::Prefs(e.to_string()))?;
        Ok(Self {
            map: Arc::new(Mutex::new(map)),
        })
    }

    /// Export the branch as a JSON snapshot for persistence.
    pub fn snapshot(&self) -> String {
        let map = self.guard();
        serde_json::to_string(&*map).unwrap_or_else(|_| "{}".to_string())
    }

    // A poisoned lock only means another thread panicked mid-access; every
    // write here is a single insert/remove, so the map stays consistent
    // and reads can safely continue.
    fn guard(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enabled_key(engine: EngineIdentifier) -> String {
        format!("engine.{engine}.enabled")
    }

    fn changed_key(engine: EngineIdentifier) -> String {
        format!("engine.{engine}.enabled-state-changed")
    }

    /// Whether an engine is enabled. `None` if never set (callers treat
    /// that as enabled by default).
    pub fn engine_enabled(&self, engine: EngineIdentifier) -> Option<bool> {
        let map = self.guard();
        map.get(&Self::enabled_key(engine)).map(|v| v == "true")
    }

    /// Record a user-driven enablement change for an engine.
    ///
    /// Marks the engine's changed flag so the next readiness negotiation
    /// knows the local state is authoritative.
    pub fn set_engine_enabled(&self, engine: EngineIdentifier, enabled: bool) {
        let mut map = self.guard();
        map.insert(Self::enabled_key(engine), enabled.to_string());
        map.insert(Self::changed_key(engine), "true".to_string());
    }

    /// Write an engine's enablement without marking it changed (used when
    /// persisting the negotiated configuration).
    pub fn store_negotiated_enabled(&self, engine: EngineIdentifier, enabled: bool) {
        let mut map = self.guard();
        map.insert(Self::enabled_key(engine), enabled.to_string());
    }

    /// Consume the set of engines whose enablement changed since the last
    /// negotiation, clearing the changed flags.
    pub fn take_changed_engines(&self) -> BTreeMap<EngineIdentifier, bool> {
        let mut map = self.guard();
        let mut changed = BTreeMap::new();
        for engine in EngineIdentifier::ALL {
            if map.remove(&Self::changed_key(engine)).is_some() {
                let enabled = map
                    .get(&Self::enabled_key(engine))
                    .map(|v| v == "true")
                    .unwrap_or(true);
                changed.insert(engine, enabled);
            }
        }
        changed
    }

    /// When the last round with a `Good` display state finished.
    pub fn last_sync_finish_millis(&self) -> Option<u64> {
        let map = self.guard();
        map.get(KEY_LAST_FINISH).and_then(|v| v.parse().ok())
    }

    /// Advance the last-finish timestamp.
    pub fn set_last_sync_finish_millis(&self, millis: u64) {
        let mut map = self.guard();
        map.insert(KEY_LAST_FINISH.to_string(), millis.to_string());
    }

    /// The persisted auth-state blob, if present.
    pub fn auth_state(&self) -> Option<Vec<u8>> {
        let map = self.guard();
        map.get(KEY_AUTH_STATE).and_then(|v| BASE64.decode(v).ok())
    }

    /// Persist the auth-state blob.
    pub fn set_auth_state(&self, blob: &[u8]) {
        let mut map = self.guard();
        map.insert(KEY_AUTH_STATE.to_string(), BASE64.encode(blob));
    }

    /// Clear the auth-state blob and the cached collection info, forcing
    /// the next readiness run to start from scratch.
    pub fn clear_auth_state(&self) {
        let mut map = self.guard();
        map.remove(KEY_AUTH_STATE);
        map.remove(KEY_COLLECTION_INFO);
    }

    /// The cached collection-info JSON from the last successful fetch.
    pub fn cached_collection_info(&self) -> Option<String> {
        let map = self.guard();
        map.get(KEY_COLLECTION_INFO).cloned()
    }

    /// Cache the latest collection-info JSON.
    pub fn cache_collection_info(&self, json: &str) {
        let mut map = self.guard();
        map.insert(KEY_COLLECTION_INFO.to_string(), json.to_string());
    }

    /// Wipe the whole branch. Used on account removal.
    pub fn clear_all(&self) {
        self.guard().clear();
    }
}
