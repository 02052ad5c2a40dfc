//! Per-engine and per-round status types.

use crate::stats::EngineStats;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a sync round was requested.
///
/// Recorded for telemetry and logging only; the orchestrator behaves the
/// same regardless of reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncReason {
    /// First sync after app launch.
    Startup,
    /// Fired by the periodic sync timer.
    Scheduled,
    /// Explicitly requested by the user.
    User,
    /// First sync after signing in.
    DidLogin,
    /// Triggered on return from background.
    Backgrounded,
}

impl SyncReason {
    /// Stable name for telemetry payloads and log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncReason::Startup => "startup",
            SyncReason::Scheduled => "scheduled",
            SyncReason::User => "user",
            SyncReason::DidLogin => "didLogin",
            SyncReason::Backgrounded => "backgrounded",
        }
    }
}

impl fmt::Display for SyncReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an engine produced no result this round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotStartedReason {
    /// The engine failed before its remote exchange began (expired token,
    /// missing key material, transport failure while preparing).
    Unknown,
    /// No signed-in account.
    NoAccount,
    /// The network is known to be unavailable.
    Offline,
}

/// The outcome of one engine in one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// The engine did not run.
    NotStarted(NotStartedReason),
    /// The engine completed its remote exchange.
    Completed(EngineStats),
}

impl SyncStatus {
    /// True if the engine ran to completion.
    pub fn is_completed(&self) -> bool {
        matches!(self, SyncStatus::Completed(_))
    }
}

/// Aggregate state of the orchestrator, broadcast to observers.
///
/// Resolved from the per-engine statuses of a finished round; this, not the
/// individual engine statuses, is what the UI layer sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncDisplayState {
    /// A round is currently running.
    InProgress,
    /// The last round completed with every engine successful.
    Good,
    /// The last round completed but some engine could not start
    /// (no account, offline).
    Warning(String),
    /// The last round completed with at least one engine failure.
    Bad(String),
}
