use std::sync::Arc;

use crate::config::Config;
use crate::decision::engine::DecisionEngine;
use crate::decision::persistence::SnapshotStore;
use crate::decision::worker::TrainingQueue;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// The tenant's engine. Decisions read it directly.
    pub engine: Arc<DecisionEngine>,
    /// Single-writer path for all training requests.
    pub training: TrainingQueue,
    /// Pluggable snapshot store. Default: MemorySnapshotStore. Swap via SNAPSHOT_BACKEND.
    pub snapshots: Arc<dyn SnapshotStore>,
    pub config: Config,
}
