//! # sync-core
//!
//! Pure orchestration logic for device-sync (no I/O, instant tests).
//!
//! This crate implements the bookkeeping and decision logic for sync rounds
//! without any network or disk I/O:
//! - [`RoundLedger`] - which engines a round has requested and completed
//! - [`EngineStateChanges`] - the per-round engine enablement diff
//! - [`schedule`] - periodic/foreground sync gating
//! - [`resolve_display_state`] - per-engine statuses → one aggregate state
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce
//! output without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about round state transitions
//!
//! The actual I/O (auth exchange, storage resets, engine syncs, timers) is
//! performed by `sync-manager`, which owns these values and acts on them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod changes;
pub mod display;
pub mod ledger;
pub mod schedule;

pub use changes::{EngineStateChanges, EngineStateInput};
pub use display::resolve_display_state;
pub use ledger::{AppendOutcome, LedgerError, RoundLedger};
pub use schedule::{
    should_sync_on_resume, FOREGROUND_MIN_DELAY, SYNC_SOON_DEBOUNCE, SYNC_TIMER_PERIOD,
};
