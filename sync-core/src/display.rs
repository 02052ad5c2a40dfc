//! Display-state resolution.
//!
//! A finished round carries one status per engine; observers see a single
//! aggregate [`SyncDisplayState`]. The aggregate, not the per-engine list,
//! gates whether the last-sync timestamp advances.

use sync_types::{EngineIdentifier, NotStartedReason, SyncDisplayState, SyncStatus};

/// Resolve the aggregate display state for a finished round.
///
/// `Good` only if every engine completed. Otherwise the most significant
/// problem wins: an engine that failed mid-flight (`NotStarted(Unknown)`)
/// is `Bad`; an engine that could not start for an account or connectivity
/// reason is `Warning`.
pub fn resolve_display_state(results: &[(EngineIdentifier, SyncStatus)]) -> SyncDisplayState {
    let mut warning: Option<SyncDisplayState> = None;

    for (engine, status) in results {
        match status {
            SyncStatus::Completed(_) => {}
            SyncStatus::NotStarted(NotStartedReason::Unknown) => {
                return SyncDisplayState::Bad(format!("{engine} failed to sync"));
            }
            SyncStatus::NotStarted(NotStartedReason::NoAccount) => {
                warning.get_or_insert(SyncDisplayState::Warning(format!(
                    "{engine} did not sync: no account"
                )));
            }
            SyncStatus::NotStarted(NotStartedReason::Offline) => {
                warning.get_or_insert(SyncDisplayState::Warning(format!(
                    "{engine} did not sync: offline"
                )));
            }
        }
    }

    warning.unwrap_or(SyncDisplayState::Good)
}
