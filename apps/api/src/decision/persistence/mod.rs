//! Persistence — snapshot format and the pluggable store behind it.
//!
//! The engine only produces and consumes `EngineSnapshot` values; where they
//! live is decided at startup by `open_snapshot_store`.
//!
//! `AppState` holds an `Arc<dyn SnapshotStore>`, swapped via `SNAPSHOT_BACKEND`.

pub mod file;
pub mod memory;
pub mod postgres;
pub mod redis;
pub mod s3;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::SnapshotBackend;
use crate::decision::engine::EngineCounters;
use crate::decision::errors::PersistenceError;
use crate::decision::models::{ActionValue, DecisionRecord, TrainingFeedback};
use crate::decision::quantizer::StateKey;

pub use file::FileSnapshotStore;
pub use memory::MemorySnapshotStore;
pub use postgres::PostgresSnapshotStore;
pub use self::redis::RedisSnapshotStore;
pub use s3::S3SnapshotStore;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

// ────────────────────────────────────────────────────────────────────────────
// Snapshot format
// ────────────────────────────────────────────────────────────────────────────

/// Full engine state. `qTable` serialises as `[[stateKey, {hire, consider, reject}], ...]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub format_version: u32,
    pub config_version: String,
    pub exported_at: DateTime<Utc>,
    pub q_table: Vec<(StateKey, ActionValue)>,
    #[serde(default)]
    pub decision_history: Vec<DecisionRecord>,
    #[serde(default)]
    pub training_history: Vec<TrainingFeedback>,
    #[serde(default)]
    pub counters: EngineCounters,
}

// ────────────────────────────────────────────────────────────────────────────
// Store trait
// ────────────────────────────────────────────────────────────────────────────

/// Load/save port for engine snapshots. Implement this to add a backend
/// without touching the engine, workers or handlers.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Short name used in logs.
    fn backend(&self) -> &'static str;

    /// `Ok(None)` when nothing has been saved yet.
    async fn load(&self) -> Result<Option<EngineSnapshot>, PersistenceError>;

    async fn save(&self, snapshot: &EngineSnapshot) -> Result<(), PersistenceError>;
}

/// Builds the store selected by configuration. Connection failures are fatal
/// here; once running, store errors are only ever logged.
pub async fn open_snapshot_store(
    backend: &SnapshotBackend,
    tenant: &str,
) -> Result<Arc<dyn SnapshotStore>> {
    let store: Arc<dyn SnapshotStore> = match backend {
        SnapshotBackend::Memory => Arc::new(MemorySnapshotStore::new()),
        SnapshotBackend::File { path } => {
            let store = FileSnapshotStore::new(path.clone());
            info!("Snapshot file: {}", store.path().display());
            Arc::new(store)
        }
        SnapshotBackend::Postgres {
            database_url,
            retention,
        } => {
            let pool = crate::db::create_pool(database_url).await?;
            let store = PostgresSnapshotStore::connect(pool, tenant)
                .await?
                .with_retention(*retention);
            info!("Keeping the newest {} snapshots per tenant", store.retention());
            Arc::new(store)
        }
        SnapshotBackend::S3(s3) => Arc::new(S3SnapshotStore::connect(s3, tenant).await),
        SnapshotBackend::Redis { url } => Arc::new(RedisSnapshotStore::connect(url, tenant).await?),
    };
    info!("Snapshot store initialized (backend: {})", store.backend());
    Ok(store)
}
