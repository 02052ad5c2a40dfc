//! Per-engine sync functions.
//!
//! One function per engine, dispatched over the closed
//! [`EngineIdentifier`] enum. These are the only place engine-specific
//! remote I/O happens; they are safe to run concurrently with each other
//! (the backends serialize their own writes) and they never let a raw
//! error escape to the reducer: anything that fails before or during the
//! exchange maps to `NotStarted(Unknown)`.

use crate::auth::AuthProvider;
use crate::ready::ReadyContext;
use crate::storage::{EngineUnlockInfo, Stores};
use std::sync::Arc;
use sync_types::{EngineIdentifier, NotStartedReason, SyncReason, SyncStatus};

/// Scope for the logins engine's additional key material.
const SCOPE_LOGINS: &str = "app://services/sync#logins";

/// Everything an engine function needs for one round.
#[derive(Clone)]
pub struct EngineContext {
    /// The storage backends.
    pub stores: Stores,
    /// The account system, for engine-scoped token exchanges.
    pub auth: Arc<dyn AuthProvider>,
    /// This round's readiness bundle.
    pub ready: Arc<ReadyContext>,
    /// Why this round was requested.
    pub reason: SyncReason,
}

/// Run one engine's sync and produce its status.
pub async fn sync_engine(engine: EngineIdentifier, ctx: &EngineContext) -> SyncStatus {
    let unlock = match derive_unlock_info(engine, ctx).await {
        Ok(unlock) => unlock,
        Err(err) => {
            tracing::warn!("{engine}: could not derive unlock info: {err}");
            return SyncStatus::NotStarted(NotStartedReason::Unknown);
        }
    };

    let result = match engine {
        EngineIdentifier::Clients => ctx.stores.tabs.sync_clients(&unlock, ctx.reason).await,
        EngineIdentifier::Tabs => ctx.stores.tabs.sync_tabs(&unlock, ctx.reason).await,
        EngineIdentifier::Bookmarks => ctx.stores.bookmarks.sync(&unlock, ctx.reason).await,
        EngineIdentifier::History => ctx.stores.history.sync(&unlock, ctx.reason).await,
        EngineIdentifier::Logins => ctx.stores.logins.sync(&unlock, ctx.reason).await,
    };

    match result {
        Ok(stats) => {
            tracing::debug!(
                "{engine}: applied {} uploaded {} failed {}",
                stats.applied,
                stats.uploaded,
                stats.failed
            );
            SyncStatus::Completed(stats)
        }
        Err(err) => {
            tracing::warn!("{engine}: sync failed: {err}");
            SyncStatus::NotStarted(NotStartedReason::Unknown)
        }
    }
}

/// Derive the engine-scoped unlock info from the readiness bundle.
///
/// Logins carries its own key material and performs a fresh scoped token
/// exchange; the other engines unlock with the round's sync key.
async fn derive_unlock_info(
    engine: EngineIdentifier,
    ctx: &EngineContext,
) -> Result<EngineUnlockInfo, sync_types::SyncError> {
    let kid = match engine {
        EngineIdentifier::Logins => {
            let scoped = ctx.auth.get_access_token(SCOPE_LOGINS).await?;
            scoped
                .key
                .as_ref()
                .map(|k| k.kid.clone())
                .ok_or_else(|| sync_types::SyncError::MissingKey("logins".into()))?
        }
        _ => ctx.ready.key_bundle.kid.clone(),
    };

    Ok(EngineUnlockInfo {
        token: ctx.ready.token.token.clone(),
        kid,
        tokenserver_url: ctx.ready.tokenserver_url.clone(),
    })
}
