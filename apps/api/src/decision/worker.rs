//! Background tasks around the engine.
//!
//! - `TrainingQueue`: single-writer actor. HTTP handlers send training commands
//!   over an mpsc channel and await a oneshot reply; the actor applies them one
//!   at a time, so Q-table writes from the API are strictly serialized.
//! - `SnapshotWriter`: debounced persistence. Training only flips the engine's
//!   dirty flag; the writer saves at most once per debounce interval and only
//!   logs failures.
//!
//! Both stop when the shared `watch` shutdown flag flips.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::decision::engine::{BatchOptions, DecisionEngine};
use crate::decision::models::{
    BatchOutcome, FeedbackStatus, FeedbackTarget, Outcome, TrainingSummary,
};
use crate::decision::persistence::SnapshotStore;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("training queue is closed")]
    Closed,
}

pub enum TrainingCommand {
    Record {
        target: FeedbackTarget,
        outcome: Outcome,
        reply: oneshot::Sender<FeedbackStatus>,
    },
    Batch {
        outcomes: Vec<BatchOutcome>,
        options: BatchOptions,
        reply: oneshot::Sender<TrainingSummary>,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// TrainingQueue (client side)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct TrainingQueue {
    tx: mpsc::Sender<TrainingCommand>,
}

impl TrainingQueue {
    pub async fn record(
        &self,
        target: FeedbackTarget,
        outcome: Outcome,
    ) -> Result<FeedbackStatus, WorkerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(TrainingCommand::Record {
                target,
                outcome,
                reply,
            })
            .await
            .map_err(|_| WorkerError::Closed)?;
        rx.await.map_err(|_| WorkerError::Closed)
    }

    pub async fn batch(
        &self,
        outcomes: Vec<BatchOutcome>,
        options: BatchOptions,
    ) -> Result<TrainingSummary, WorkerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(TrainingCommand::Batch {
                outcomes,
                options,
                reply,
            })
            .await
            .map_err(|_| WorkerError::Closed)?;
        rx.await.map_err(|_| WorkerError::Closed)
    }
}

async fn training_loop(
    engine: Arc<DecisionEngine>,
    mut rx: mpsc::Receiver<TrainingCommand>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!("Training worker started");
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let command = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            command = rx.recv() => command,
        };
        let Some(command) = command else {
            break;
        };

        match command {
            TrainingCommand::Record {
                target,
                outcome,
                reply,
            } => {
                let status = engine.record_outcome(&target, outcome);
                // the caller may have gone away; nothing to do then
                let _ = reply.send(status);
            }
            TrainingCommand::Batch {
                outcomes,
                mut options,
                reply,
            } => {
                if options.cancel.is_none() {
                    options.cancel = Some(shutdown_rx.clone());
                }
                let engine = Arc::clone(&engine);
                let result =
                    tokio::task::spawn_blocking(move || engine.batch_train(&outcomes, &options))
                        .await;
                match result {
                    Ok(summary) => {
                        let _ = reply.send(summary);
                    }
                    Err(e) => error!("Batch training task failed: {e}"),
                }
            }
        }
    }
    info!("Training worker stopped");
}

// ────────────────────────────────────────────────────────────────────────────
// SnapshotWriter
// ────────────────────────────────────────────────────────────────────────────

/// Saves the current engine state. Errors are logged and swallowed.
pub async fn flush_snapshot(engine: &DecisionEngine, store: &dyn SnapshotStore) -> bool {
    let snapshot = engine.export_state();
    let entries = snapshot.q_table.len();
    match store.save(&snapshot).await {
        Ok(()) => {
            debug!("Saved snapshot ({} backend, {entries} entries)", store.backend());
            true
        }
        Err(e) => {
            warn!("Snapshot save failed ({} backend): {e}", store.backend());
            false
        }
    }
}

/// Restores the store's latest snapshot into the engine. A missing, unreadable
/// or incompatible snapshot leaves the bootstrapped state in place.
pub async fn restore_snapshot(engine: &DecisionEngine, store: &dyn SnapshotStore) -> bool {
    match store.load().await {
        Ok(Some(snapshot)) => match engine.import_state(snapshot) {
            Ok(()) => {
                // freshly restored state is already persisted
                engine.take_dirty();
                true
            }
            Err(e) => {
                warn!("Ignoring stored snapshot ({} backend): {e}", store.backend());
                false
            }
        },
        Ok(None) => {
            info!("No stored snapshot ({} backend); keeping bootstrapped state", store.backend());
            false
        }
        Err(e) => {
            warn!("Snapshot load failed ({} backend): {e}", store.backend());
            false
        }
    }
}

/// Saves now unless nothing changed. The dirty flag is cleared before the
/// save so changes made during it are picked up by the next one.
pub async fn flush_if_dirty(engine: &DecisionEngine, store: &dyn SnapshotStore) {
    if engine.take_dirty() && !flush_snapshot(engine, store).await {
        // retry on the next tick
        engine.mark_dirty();
    }
}

async fn snapshot_loop(
    engine: Arc<DecisionEngine>,
    store: Arc<dyn SnapshotStore>,
    debounce: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!("Snapshot writer started (every {debounce:?}, {} backend)", store.backend());
    let mut ticker = tokio::time::interval(debounce);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        flush_if_dirty(&engine, store.as_ref()).await;
    }
    info!("Snapshot writer stopped");
}

// ────────────────────────────────────────────────────────────────────────────
// EngineWorkers
// ────────────────────────────────────────────────────────────────────────────

/// Handle over the training actor and the snapshot writer.
/// Dropping the handle stops both tasks without a final snapshot.
pub struct EngineWorkers {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
    engine: Arc<DecisionEngine>,
    store: Arc<dyn SnapshotStore>,
}

impl EngineWorkers {
    pub fn spawn(
        engine: Arc<DecisionEngine>,
        store: Arc<dyn SnapshotStore>,
        queue_capacity: usize,
        debounce: Duration,
    ) -> (Self, TrainingQueue) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));

        let joins = vec![
            tokio::spawn(training_loop(Arc::clone(&engine), rx, shutdown_rx.clone())),
            tokio::spawn(snapshot_loop(
                Arc::clone(&engine),
                Arc::clone(&store),
                debounce,
                shutdown_rx,
            )),
        ];

        let workers = Self {
            shutdown_tx,
            joins,
            engine,
            store,
        };
        (workers, TrainingQueue { tx })
    }

    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Stops both tasks, waits for them, then writes one final snapshot.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            let _ = join.await;
        }
        if flush_snapshot(&self.engine, self.store.as_ref()).await {
            info!("Final snapshot written ({} backend)", self.store.backend());
        }
    }
}
