//! The readiness state machine.
//!
//! Before any engine can sync, the stored credentials must be exchanged for
//! a short-lived session bundle: access token, scoped key material, the
//! token-server endpoint, a server collection-info snapshot, and the
//! negotiated engine configuration. [`ReadinessStateMachine::to_ready`]
//! advances through those steps in order and fails fast with a typed error
//! at the first one that cannot complete; it never retries internally.
//! Retry policy belongs to the coordinator's scheduling layer.
//!
//! The resulting [`ReadyContext`] lives for exactly one round and is never
//! persisted.

use crate::auth::{AccessTokenInfo, AuthProvider, ScopedKeyBundle, SCOPE_SYNC};
use crate::prefs::SyncPrefs;
use crate::server::{CollectionInfo, SyncServerClient};
use std::collections::BTreeSet;
use std::sync::Arc;
use sync_types::{EngineIdentifier, SyncError};
use uuid::Uuid;

/// The negotiated engine configuration for one round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Engines that will sync.
    pub enabled: BTreeSet<EngineIdentifier>,
    /// Engines declined locally or server-side.
    pub declined: BTreeSet<EngineIdentifier>,
}

/// The short-lived session bundle required by every engine sync.
///
/// Created fresh per round; invalidated (dropped) when the round ends or
/// when readiness fails on the next round.
#[derive(Debug, Clone)]
pub struct ReadyContext {
    /// Access token for the sync scope.
    pub token: AccessTokenInfo,
    /// Decrypted sync key material. Zeroed on drop.
    pub key_bundle: ScopedKeyBundle,
    /// Token-server endpoint URL.
    pub tokenserver_url: String,
    /// Server collection-info snapshot for this round.
    pub collection_info: CollectionInfo,
    /// The engine configuration negotiated this round.
    pub engine_config: EngineConfig,
    /// The enabled set as it stood after the previous round, captured for
    /// the engine-state reconciler's diff.
    pub previously_enabled: BTreeSet<EngineIdentifier>,
    /// Account identifier, if known.
    pub uid: Option<Uuid>,
    /// This device's identifier, if registered.
    pub local_device_id: Option<String>,
}

/// Drives credentials → session bundle once per round.
pub struct ReadinessStateMachine {
    auth: Arc<dyn AuthProvider>,
    server: Arc<dyn SyncServerClient>,
    prefs: SyncPrefs,
}

impl ReadinessStateMachine {
    /// Create a readiness machine over the given collaborators.
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        server: Arc<dyn SyncServerClient>,
        prefs: SyncPrefs,
    ) -> Self {
        Self {
            auth,
            server,
            prefs,
        }
    }

    /// Advance to a ready state, or fail with the first typed error.
    ///
    /// On an unrecoverable auth error (`TokenExpired`, `InvalidAuthState`)
    /// the persisted auth blob is cleared so the next round restarts from
    /// scratch.
    pub async fn to_ready(&self) -> Result<ReadyContext, SyncError> {
        if self.prefs.auth_state().is_none() {
            return Err(SyncError::NoAccount);
        }

        let token = match self.auth.get_access_token(SCOPE_SYNC).await {
            Ok(token) => token,
            Err(err @ (SyncError::TokenExpired | SyncError::InvalidAuthState(_))) => {
                tracing::warn!("unrecoverable auth error, clearing sync auth state: {err}");
                self.prefs.clear_auth_state();
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let key_bundle = token
            .key
            .clone()
            .ok_or_else(|| SyncError::MissingKey("sync".into()))?;

        let tokenserver_url = self.auth.token_server_url().await?;

        let collection_info = self.fetch_collection_info(&token, &tokenserver_url).await?;

        let uid = self.auth.account_uid().await?;
        let constellation = self.auth.device_constellation().await?;
        let local_device_id = constellation.local_device.map(|d| d.id);

        let (engine_config, previously_enabled) = self.negotiate_engines(&collection_info);

        Ok(ReadyContext {
            token,
            key_bundle,
            tokenserver_url,
            collection_info,
            engine_config,
            previously_enabled,
            uid,
            local_device_id,
        })
    }

    /// Fetch the collection-info snapshot, caching it for fast-path reuse.
    ///
    /// On a fetch failure the last cached snapshot is used when one exists;
    /// with no cache the error propagates and the round fails readiness.
    async fn fetch_collection_info(
        &self,
        token: &AccessTokenInfo,
        tokenserver_url: &str,
    ) -> Result<CollectionInfo, SyncError> {
        match self.server.fetch_collection_info(token, tokenserver_url).await {
            Ok(info) => {
                if let Ok(json) = serde_json::to_string(&info) {
                    self.prefs.cache_collection_info(&json);
                }
                Ok(info)
            }
            Err(err) => {
                if let Some(cached) = self.prefs.cached_collection_info() {
                    if let Ok(info) = serde_json::from_str::<CollectionInfo>(&cached) {
                        tracing::debug!("collection-info fetch failed, using cache: {err}");
                        return Ok(info);
                    }
                }
                Err(err)
            }
        }
    }

    /// Negotiate the engine configuration for this round.
    ///
    /// Local enablement changes made since the last negotiation win over the
    /// server's declined list (they are pending uploads); otherwise the
    /// server's declined list wins over the stored flags, and an engine with
    /// no stored flag defaults to enabled. The negotiated result is written
    /// back to prefs without re-marking anything changed.
    fn negotiate_engines(
        &self,
        info: &CollectionInfo,
    ) -> (EngineConfig, BTreeSet<EngineIdentifier>) {
        let changed = self.prefs.take_changed_engines();

        // The enabled set as the previous round left it. For engines the
        // user flipped since then, the previous value is the flip's inverse.
        let previously_enabled: BTreeSet<EngineIdentifier> = EngineIdentifier::ALL
            .iter()
            .copied()
            .filter(|e| match changed.get(e) {
                Some(new_value) => !new_value,
                None => self.prefs.engine_enabled(*e).unwrap_or(true),
            })
            .collect();

        let server_declined: BTreeSet<EngineIdentifier> = info
            .declined
            .iter()
            .filter_map(|name| EngineIdentifier::from_str_opt(name))
            .collect();

        let mut config = EngineConfig::default();
        for engine in EngineIdentifier::ALL {
            let enabled = match changed.get(&engine) {
                Some(&local) => local,
                None if server_declined.contains(&engine) => false,
                None => self.prefs.engine_enabled(engine).unwrap_or(true),
            };
            self.prefs.store_negotiated_enabled(engine, enabled);
            if enabled {
                config.enabled.insert(engine);
            } else {
                config.declined.insert(engine);
            }
        }

        (config, previously_enabled)
    }
}
