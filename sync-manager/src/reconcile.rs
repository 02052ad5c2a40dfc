//! Engine-state reconciliation.
//!
//! Runs once per round, after readiness and before any engine sync: derives
//! the enablement diff, performs the required local resets (best effort),
//! then discards queued remote commands that referenced now-stale state.
//! The coordinator awaits this to completion before appending engines to
//! the round, so no engine ever syncs against stale sync metadata.

use crate::ready::ReadyContext;
use crate::reset::LocalResetPolicy;
use crate::storage::Stores;
use sync_core::{EngineStateChanges, EngineStateInput};

/// Applies engine-state changes to local storage.
pub struct EngineStateReconciler {
    policy: LocalResetPolicy,
    stores: Stores,
}

impl EngineStateReconciler {
    /// Create a reconciler over the given backends.
    pub fn new(stores: Stores) -> Self {
        Self {
            policy: LocalResetPolicy::new(stores.clone()),
            stores,
        }
    }

    /// Derive this round's changes from the ready context.
    pub fn changes_for_round(&self, ready: &ReadyContext) -> EngineStateChanges {
        EngineStateChanges::derive(EngineStateInput {
            server_reset_collections: ready.collection_info.reset_collections.clone(),
            previously_enabled: ready.previously_enabled.clone(),
            now_enabled: ready.engine_config.enabled.clone(),
        })
    }

    /// Perform the side effects for a round's changes, then pass them back.
    ///
    /// Reset failures are logged and reported but never block sibling
    /// resets or the subsequent sync attempt.
    pub async fn take_actions_on_engine_state_changes(
        &self,
        changes: EngineStateChanges,
    ) -> EngineStateChanges {
        let collections = changes.collections_that_need_local_reset();
        if !collections.is_empty() {
            tracing::info!("locally resetting collections: {collections:?}");
            let failures = self.policy.locally_reset_collections(&collections).await;
            for (name, err) in &failures {
                tracing::warn!("local reset of {name} failed: {err}");
            }

            // Queued remote commands may reference the state we just
            // discarded.
            if let Err(err) = self.stores.tabs.clear_local_commands().await {
                tracing::warn!("failed to clear local commands: {err}");
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use sync_types::EngineIdentifier;

    fn changes(reset: &[&str]) -> EngineStateChanges {
        EngineStateChanges::derive(EngineStateInput {
            server_reset_collections: reset.iter().map(|s| s.to_string()).collect(),
            previously_enabled: BTreeSet::new(),
            now_enabled: BTreeSet::new(),
        })
    }

    #[tokio::test]
    async fn clients_reset_absorbs_tabs_no_duplicate_backend_calls() {
        let (stores, _history, _bookmarks, tabs, _logins) = Stores::mocks();
        let reconciler = EngineStateReconciler::new(stores);

        reconciler
            .take_actions_on_engine_state_changes(changes(&["clients", "tabs"]))
            .await;

        // One reset pass over the shared store, not two.
        assert_eq!(tabs.remote_tabs_resets(), 1);
        assert_eq!(tabs.clients_registry_resets(), 1);
    }

    #[tokio::test]
    async fn commands_cleared_after_resets() {
        let (stores, history, _bookmarks, tabs, _logins) = Stores::mocks();
        let reconciler = EngineStateReconciler::new(stores);

        reconciler
            .take_actions_on_engine_state_changes(changes(&["history"]))
            .await;

        assert_eq!(history.reset_calls(), 1);
        assert_eq!(tabs.clear_local_commands_calls(), 1);
    }

    #[tokio::test]
    async fn empty_changes_touch_nothing() {
        let (stores, history, bookmarks, tabs, logins) = Stores::mocks();
        let reconciler = EngineStateReconciler::new(stores);

        reconciler
            .take_actions_on_engine_state_changes(changes(&[]))
            .await;

        assert_eq!(history.reset_calls(), 0);
        assert_eq!(bookmarks.reset_calls(), 0);
        assert_eq!(tabs.remote_tabs_resets(), 0);
        assert_eq!(logins.reset_calls(), 0);
        assert_eq!(tabs.clear_local_commands_calls(), 0);
    }

    #[tokio::test]
    async fn reset_failure_does_not_block_sibling_or_commands() {
        let (stores, history, bookmarks, tabs, _logins) = Stores::mocks();
        history.fail_next_reset("disk full");
        let reconciler = EngineStateReconciler::new(stores);

        reconciler
            .take_actions_on_engine_state_changes(changes(&["history", "bookmarks"]))
            .await;

        assert_eq!(bookmarks.reset_calls(), 1);
        assert_eq!(tabs.clear_local_commands_calls(), 1);
    }

    #[tokio::test]
    async fn enablement_diff_drives_resets() {
        let (stores, _history, _bookmarks, _tabs, logins) = Stores::mocks();
        let reconciler = EngineStateReconciler::new(stores);

        let changes = EngineStateChanges::derive(EngineStateInput {
            server_reset_collections: vec![],
            previously_enabled: [EngineIdentifier::History].into_iter().collect(),
            now_enabled: [EngineIdentifier::History, EngineIdentifier::Logins]
                .into_iter()
                .collect(),
        });
        reconciler.take_actions_on_engine_state_changes(changes).await;

        assert_eq!(logins.reset_calls(), 1);
    }
}
