//! # sync-types
//!
//! Foundational types for the device-sync orchestrator.
//!
//! This crate provides the value types shared by all device-sync crates:
//! - [`EngineIdentifier`] - The closed set of syncable data domains
//! - [`SyncReason`], [`SyncStatus`], [`SyncDisplayState`] - Round bookkeeping
//! - [`SyncOperationStatsSession`], [`SyncOperationResult`] - Telemetry
//! - [`SyncError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod engine;
mod error;
mod stats;
mod status;

pub use engine::EngineIdentifier;
pub use error::SyncError;
pub use stats::{EngineStats, SyncOperationResult, SyncOperationStats, SyncOperationStatsSession};
pub use status::{NotStartedReason, SyncDisplayState, SyncReason, SyncStatus};
