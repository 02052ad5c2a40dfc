//! The task reducer - one serialized accumulator per sync round.
//!
//! The reducer is an actor: a spawned task owns the round's
//! [`RoundLedger`] and consumes commands from a single mpsc receiver, so
//! all "which engines are done" bookkeeping is single-threaded by
//! construction, not by incidental thread affinity. Engine functions are
//! spawned concurrently; their completions marshal back onto the actor's
//! queue as `Record` commands.
//!
//! Lifecycle: created when a round starts, accumulates batches while the
//! round runs, fires every waiter exactly once at the terminal state, then
//! exits. Appending to a finished reducer surfaces
//! [`SyncError::RoundFinished`]; that is a caller bug, reported loudly and
//! never propagated as a user-visible failure.

use crate::engines::{sync_engine, EngineContext};
use sync_core::RoundLedger;
use sync_types::{
    EngineIdentifier, SyncError, SyncOperationResult, SyncOperationStatsSession, SyncStatus,
};
use tokio::sync::{mpsc, oneshot};

enum ReducerCommand {
    Append {
        engines: Vec<EngineIdentifier>,
        done: oneshot::Sender<SyncOperationResult>,
    },
    Record {
        engine: EngineIdentifier,
        status: SyncStatus,
    },
}

/// Handle to one round's reducer actor.
pub struct TaskReducer {
    tx: mpsc::UnboundedSender<ReducerCommand>,
}

impl TaskReducer {
    /// Spawn the reducer actor for a new round.
    pub fn spawn(ctx: EngineContext, stats: SyncOperationStatsSession) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(reducer_loop(rx, tx.clone(), ctx, stats));
        Self { tx }
    }

    /// Append a batch of engines to the round.
    ///
    /// Engines already requested this round are not re-run: a batch whose
    /// engines all have statuses is answered immediately from the
    /// accumulated results, and one with engines still in flight resolves
    /// at the round's terminal state, so a later overlapping request
    /// observes the same statuses the earlier one produces. Fails with
    /// [`SyncError::RoundFinished`] if the round already completed.
    pub fn append(
        &self,
        engines: Vec<EngineIdentifier>,
    ) -> Result<oneshot::Receiver<SyncOperationResult>, SyncError> {
        let (done, done_rx) = oneshot::channel();
        self.tx
            .send(ReducerCommand::Append { engines, done })
            .map_err(|_| SyncError::RoundFinished)?;
        Ok(done_rx)
    }
}

async fn reducer_loop(
    mut rx: mpsc::UnboundedReceiver<ReducerCommand>,
    record_tx: mpsc::UnboundedSender<ReducerCommand>,
    ctx: EngineContext,
    stats: SyncOperationStatsSession,
) {
    let mut ledger = RoundLedger::new();
    let mut waiters: Vec<oneshot::Sender<SyncOperationResult>> = Vec::new();
    let mut stats = Some(stats);

    while let Some(cmd) = rx.recv().await {
        match cmd {
            ReducerCommand::Append { engines, done } => {
                let outcome = match ledger.append(&engines) {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        // Unreachable while the actor is alive; the loop
                        // exits at terminal before any further append.
                        tracing::error!("reducer invariant violated: {err}");
                        continue;
                    }
                };

                if outcome.to_run.is_empty() {
                    if ledger.is_empty() {
                        // Nothing was ever requested; short-circuit.
                        let result = SyncOperationResult {
                            engine_results: Vec::new(),
                            stats: None,
                        };
                        let _ = done.send(result.clone());
                        fulfill(&mut waiters, result);
                        break;
                    }
                    if ledger.is_satisfied(&engines) {
                        // Every requested engine already has a status;
                        // answer from the accumulated results without
                        // waiting for the rest of the round.
                        let _ = done.send(SyncOperationResult {
                            engine_results: ledger.results(),
                            stats: None,
                        });
                        continue;
                    }
                    // Batch fully covered by engines still in flight;
                    // this waiter resolves at terminal with their results.
                    waiters.push(done);
                    continue;
                }

                waiters.push(done);

                if let Some(session) = stats.as_mut() {
                    session.start();
                }
                for engine in outcome.to_run {
                    tracing::debug!("dispatching {engine} ({})", ctx.reason);
                    let ctx = ctx.clone();
                    let tx = record_tx.clone();
                    tokio::spawn(async move {
                        let status = sync_engine(engine, &ctx).await;
                        // Send fails only if the round already ended, which
                        // cannot happen before every engine reports.
                        let _ = tx.send(ReducerCommand::Record { engine, status });
                    });
                }
            }
            ReducerCommand::Record { engine, status } => {
                if let Some(results) = ledger.record(engine, status) {
                    let result = SyncOperationResult {
                        engine_results: results,
                        stats: stats.take().map(|s| s.end()),
                    };
                    fulfill(&mut waiters, result);
                    break;
                }
            }
        }
    }
}

fn fulfill(waiters: &mut Vec<oneshot::Sender<SyncOperationResult>>, result: SyncOperationResult) {
    for waiter in waiters.drain(..) {
        // A dropped waiter just means the caller stopped listening.
        let _ = waiter.send(result.clone());
    }
}
