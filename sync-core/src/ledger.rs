//! Round ledger - the pure bookkeeping half of the task reducer.
//!
//! One `RoundLedger` tracks exactly one sync round: which engines have been
//! requested so far, which have produced a status, and when the round is
//! terminal. It performs no I/O and makes no scheduling decisions; the
//! async reducer in `sync-manager` owns a ledger and interprets its output.
//!
//! The dedup guarantee lives here: appending overlapping engine batches
//! (a user-triggered "sync history" arriving while a scheduled
//! "sync everything" is mid-flight) yields each engine in `to_run` at most
//! once per round. The later batch simply waits for the status the earlier
//! one produces.

use std::collections::{BTreeMap, BTreeSet};
use sync_types::{EngineIdentifier, SyncStatus};
use thiserror::Error;

/// Errors from ledger misuse.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// An engine batch was appended after the round reached its terminal
    /// state. Caller bug: the round owner must discard a terminal ledger.
    #[error("engine batch appended to a finished round")]
    RoundFinished,
}

/// Result of appending a batch to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Engines from the batch not yet requested this round. The caller must
    /// dispatch exactly these; the rest are already running or done.
    pub to_run: Vec<EngineIdentifier>,
}

/// Pure bookkeeping for one sync round.
#[derive(Debug, Default)]
pub struct RoundLedger {
    requested: BTreeSet<EngineIdentifier>,
    completed: BTreeMap<EngineIdentifier, SyncStatus>,
    terminal: bool,
}

impl RoundLedger {
    /// Create an empty ledger for a new round.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch of engines to the round.
    ///
    /// Returns the engines the caller must dispatch. Engines already
    /// requested this round are filtered out; duplicates within the batch
    /// are collapsed. Appending after the round is terminal is an error.
    pub fn append(&mut self, batch: &[EngineIdentifier]) -> Result<AppendOutcome, LedgerError> {
        if self.terminal {
            return Err(LedgerError::RoundFinished);
        }
        let mut to_run = Vec::new();
        for &engine in batch {
            if self.requested.insert(engine) {
                to_run.push(engine);
            }
        }
        Ok(AppendOutcome { to_run })
    }

    /// Record the status of one engine.
    ///
    /// Returns the round's full results exactly once, when every engine
    /// requested so far has a status. A duplicate record (or one for an
    /// engine never requested) is ignored; the first status wins.
    pub fn record(
        &mut self,
        engine: EngineIdentifier,
        status: SyncStatus,
    ) -> Option<Vec<(EngineIdentifier, SyncStatus)>> {
        if self.terminal || !self.requested.contains(&engine) {
            return None;
        }
        self.completed.entry(engine).or_insert(status);
        if self.completed.len() == self.requested.len() {
            self.terminal = true;
            return Some(self.results());
        }
        None
    }

    /// True once every requested engine has a status.
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// True if every engine in the batch already has a recorded status.
    pub fn is_satisfied(&self, batch: &[EngineIdentifier]) -> bool {
        batch.iter().all(|e| self.completed.contains_key(e))
    }

    /// True if no engine has been requested this round.
    pub fn is_empty(&self) -> bool {
        self.requested.is_empty()
    }

    /// Statuses recorded so far, in deterministic engine order.
    pub fn results(&self) -> Vec<(EngineIdentifier, SyncStatus)> {
        self.completed
            .iter()
            .map(|(e, s)| (*e, s.clone()))
            .collect()
    }
}
