//! Round and engine statistics for telemetry.

use crate::engine::EngineIdentifier;
use crate::status::{SyncReason, SyncStatus};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Record counters produced by one engine's remote exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Incoming records applied to local storage.
    pub applied: u64,
    /// Incoming records that failed to apply.
    pub failed: u64,
    /// Outgoing records accepted by the server.
    pub uploaded: u64,
}

/// Mutable accumulator for one sync round's telemetry.
///
/// Created when the round is requested, `start()`ed when the first engine
/// actually begins network I/O, and `end()`ed at round completion to produce
/// an immutable [`SyncOperationStats`].
#[derive(Debug, Clone)]
pub struct SyncOperationStatsSession {
    /// Why the round was requested.
    pub why: SyncReason,
    /// Account identifier, if signed in.
    pub uid: Option<Uuid>,
    /// Local device identifier, if known.
    pub device_id: Option<String>,
    started_at_millis: Option<u64>,
}

impl SyncOperationStatsSession {
    /// Create a session for a round requested for `why`.
    pub fn new(why: SyncReason, uid: Option<Uuid>, device_id: Option<String>) -> Self {
        Self {
            why,
            uid,
            device_id,
            started_at_millis: None,
        }
    }

    /// Mark the moment the first engine begins I/O. Idempotent.
    pub fn start(&mut self) {
        if self.started_at_millis.is_none() {
            self.started_at_millis = Some(now_millis());
        }
    }

    /// Finish the session, producing an immutable snapshot.
    pub fn end(self) -> SyncOperationStats {
        let started = self.started_at_millis;
        SyncOperationStats {
            why: self.why,
            uid: self.uid,
            device_id: self.device_id,
            took_millis: started.map(|s| now_millis().saturating_sub(s)),
            when_started_millis: started,
        }
    }
}

/// Immutable telemetry snapshot of one finished round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOperationStats {
    /// Why the round was requested.
    pub why: SyncReason,
    /// Account identifier, if signed in.
    pub uid: Option<Uuid>,
    /// Local device identifier, if known.
    pub device_id: Option<String>,
    /// Wall-clock duration from first engine I/O to round end, or `None`
    /// if no engine ever started.
    pub took_millis: Option<u64>,
    /// When the first engine began I/O.
    pub when_started_millis: Option<u64>,
}

/// Immutable terminal result of one sync round.
#[derive(Debug, Clone)]
pub struct SyncOperationResult {
    /// One status per engine requested this round.
    pub engine_results: Vec<(EngineIdentifier, SyncStatus)>,
    /// Telemetry for the round, if a stats session was running.
    pub stats: Option<SyncOperationStats>,
}

impl SyncOperationResult {
    /// Look up the status of a specific engine in this round.
    pub fn status_for(&self, engine: EngineIdentifier) -> Option<&SyncStatus> {
        self.engine_results
            .iter()
            .find(|(e, _)| *e == engine)
            .map(|(_, s)| s)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
