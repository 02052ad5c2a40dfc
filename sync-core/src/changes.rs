//! Engine enablement diffing.
//!
//! Once per round, the newly negotiated engine configuration is compared
//! against the previously persisted one. The diff decides which collections
//! need a local reset (discarding sync bookkeeping, not user data) before
//! any engine in the round is allowed to run.

use std::collections::BTreeSet;
use sync_types::EngineIdentifier;

/// Inputs to the per-round engine-state diff.
#[derive(Debug, Clone, Default)]
pub struct EngineStateInput {
    /// Collection names the server reports as reset since our last sync.
    /// Kept as strings: the server may name collections this client has no
    /// engine for, and those still flow through to the (no-op) reset policy.
    pub server_reset_collections: Vec<String>,
    /// Engines enabled at the end of the previous round.
    pub previously_enabled: BTreeSet<EngineIdentifier>,
    /// Engines enabled in the newly negotiated configuration.
    pub now_enabled: BTreeSet<EngineIdentifier>,
}

/// The computed diff. Derived once per round, consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStateChanges {
    reset: BTreeSet<String>,
    enabled: BTreeSet<EngineIdentifier>,
    disabled: BTreeSet<EngineIdentifier>,
}

impl EngineStateChanges {
    /// Derive the changes for one round.
    ///
    /// Collections needing reset come from three sources: collections the
    /// server reset, engines newly enabled (their stale local bookkeeping
    /// must go before a full resync), and engines newly disabled.
    pub fn derive(input: EngineStateInput) -> Self {
        let enabled: BTreeSet<_> = input
            .now_enabled
            .difference(&input.previously_enabled)
            .copied()
            .collect();
        let disabled: BTreeSet<_> = input
            .previously_enabled
            .difference(&input.now_enabled)
            .copied()
            .collect();

        let mut reset: BTreeSet<String> =
            input.server_reset_collections.into_iter().collect();
        for engine in enabled.iter().chain(disabled.iter()) {
            reset.insert(engine.as_str().to_string());
        }

        Self {
            reset,
            enabled,
            disabled,
        }
    }

    /// The collections to locally reset, with the dominance rule applied:
    /// resetting clients already implies resetting tabs (they historically
    /// shared a storage table), so tabs is dropped when clients is present.
    /// The rule is asymmetric; tabs never absorbs clients.
    pub fn collections_that_need_local_reset(&self) -> Vec<String> {
        let mut reset = self.reset.clone();
        if reset.contains(EngineIdentifier::Clients.as_str()) {
            reset.remove(EngineIdentifier::Tabs.as_str());
        }
        reset.into_iter().collect()
    }

    /// Engines newly enabled this round.
    pub fn engines_enabled(&self) -> &BTreeSet<EngineIdentifier> {
        &self.enabled
    }

    /// Engines newly disabled this round.
    pub fn engines_disabled(&self) -> &BTreeSet<EngineIdentifier> {
        &self.disabled
    }

    /// True if this round requires no resets and no enablement bookkeeping.
    pub fn is_empty(&self) -> bool {
        self.reset.is_empty() && self.enabled.is_empty() && self.disabled.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engines(list: &[EngineIdentifier]) -> BTreeSet<EngineIdentifier> {
        list.iter().copied().collect()
    }

    #[test]
    fn no_changes_yields_empty_diff() {
        let set = engines(&[EngineIdentifier::History, EngineIdentifier::Bookmarks]);
        let changes = EngineStateChanges::derive(EngineStateInput {
            server_reset_collections: vec![],
            previously_enabled: set.clone(),
            now_enabled: set,
        });
        assert!(changes.is_empty());
        assert!(changes.collections_that_need_local_reset().is_empty());
    }

    #[test]
    fn newly_enabled_engine_needs_reset() {
        let changes = EngineStateChanges::derive(EngineStateInput {
            server_reset_collections: vec![],
            previously_enabled: engines(&[EngineIdentifier::History]),
            now_enabled: engines(&[EngineIdentifier::History, EngineIdentifier::Logins]),
        });
        assert_eq!(
            changes.engines_enabled(),
            &engines(&[EngineIdentifier::Logins])
        );
        assert_eq!(
            changes.collections_that_need_local_reset(),
            vec!["logins".to_string()]
        );
    }

    #[test]
    fn newly_disabled_engine_needs_reset() {
        let changes = EngineStateChanges::derive(EngineStateInput {
            server_reset_collections: vec![],
            previously_enabled: engines(&[EngineIdentifier::History, EngineIdentifier::Bookmarks]),
            now_enabled: engines(&[EngineIdentifier::History]),
        });
        assert_eq!(
            changes.engines_disabled(),
            &engines(&[EngineIdentifier::Bookmarks])
        );
        assert_eq!(
            changes.collections_that_need_local_reset(),
            vec!["bookmarks".to_string()]
        );
    }

    #[test]
    fn clients_reset_absorbs_tabs() {
        let changes = EngineStateChanges::derive(EngineStateInput {
            server_reset_collections: vec!["clients".into(), "tabs".into()],
            previously_enabled: BTreeSet::new(),
            now_enabled: BTreeSet::new(),
        });
        assert_eq!(
            changes.collections_that_need_local_reset(),
            vec!["clients".to_string()]
        );
    }

    #[test]
    fn tabs_reset_alone_does_not_absorb_clients() {
        // The dominance rule is asymmetric: only clients absorbs tabs.
        let changes = EngineStateChanges::derive(EngineStateInput {
            server_reset_collections: vec!["tabs".into()],
            previously_enabled: BTreeSet::new(),
            now_enabled: BTreeSet::new(),
        });
        assert_eq!(
            changes.collections_that_need_local_reset(),
            vec!["tabs".to_string()]
        );
    }

    #[test]
    fn unknown_server_collections_flow_through() {
        let changes = EngineStateChanges::derive(EngineStateInput {
            server_reset_collections: vec!["forms".into()],
            previously_enabled: BTreeSet::new(),
            now_enabled: BTreeSet::new(),
        });
        assert_eq!(
            changes.collections_that_need_local_reset(),
            vec!["forms".to_string()]
        );
    }

    #[test]
    fn server_resets_merge_with_enablement_resets() {
        let changes = EngineStateChanges::derive(EngineStateInput {
            server_reset_collections: vec!["history".into()],
            previously_enabled: engines(&[EngineIdentifier::History]),
            now_enabled: engines(&[EngineIdentifier::History, EngineIdentifier::Bookmarks]),
        });
        assert_eq!(
            changes.collections_that_need_local_reset(),
            vec!["bookmarks".to_string(), "history".to_string()]
        );
    }
}
