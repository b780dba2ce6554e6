//! PostgreSQL store. Every save INSERTs a new row and the newest row for the
//! tenant wins on load. Rows are never UPDATEd; the same transaction prunes the
//! tenant down to its newest `retention` rows.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::DEFAULT_SNAPSHOT_RETENTION;
use crate::decision::errors::PersistenceError;
use crate::decision::persistence::{EngineSnapshot, SnapshotStore};
use crate::models::snapshot::EngineSnapshotRow;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS decision_engine_snapshots (
    id UUID PRIMARY KEY,
    tenant TEXT NOT NULL,
    format_version INTEGER NOT NULL,
    config_version TEXT NOT NULL,
    snapshot JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS decision_engine_snapshots_tenant_created
    ON decision_engine_snapshots (tenant, created_at DESC)
"#;

const INSERT_SNAPSHOT: &str = r#"
INSERT INTO decision_engine_snapshots
    (id, tenant, format_version, config_version, snapshot)
VALUES ($1, $2, $3, $4, $5)
"#;

const PRUNE_SNAPSHOTS: &str = r#"
DELETE FROM decision_engine_snapshots
WHERE tenant = $1
  AND id NOT IN (
      SELECT id FROM decision_engine_snapshots
      WHERE tenant = $1
      ORDER BY created_at DESC, id DESC
      LIMIT $2
  )
"#;


pub struct PostgresSnapshotStore {
    pool: PgPool,
    tenant: String,
    retention: u32,
}

impl PostgresSnapshotStore {
    /// Ensures the snapshot table exists before handing out the store.
    pub async fn connect(pool: PgPool, tenant: &str) -> Result<Self, PersistenceError> {
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        sqlx::query(CREATE_INDEX).execute(&pool).await?;
        info!("Snapshot table ready for tenant {tenant}");
        Ok(Self {
            pool,
            tenant: tenant.to_string(),
            retention: DEFAULT_SNAPSHOT_RETENTION,
        })
    }

    /// Keeps at least one row so `load` always has something to return.
    pub fn with_retention(mut self, retention: u32) -> Self {
        self.retention = retention.max(1);
        self
    }

    pub fn retention(&self) -> u32 {
        self.retention
    }
}

#[async_trait]
impl SnapshotStore for PostgresSnapshotStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn load(&self) -> Result<Option<EngineSnapshot>, PersistenceError> {
        let row = sqlx::query_as::<_, EngineSnapshotRow>(
            r#"
            SELECT id, tenant, format_version, config_version, snapshot, created_at
            FROM decision_engine_snapshots
            WHERE tenant = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(&self.tenant)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                debug!("Loaded snapshot {} ({})", row.id, row.created_at);
                Ok(Some(serde_json::from_value(row.snapshot)?))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, snapshot: &EngineSnapshot) -> Result<(), PersistenceError> {
        let body = serde_json::to_value(snapshot)?;
        let mut tx = self.pool.begin().await?;
        sqlx::query(INSERT_SNAPSHOT)
            .bind(Uuid::new_v4())
            .bind(&self.tenant)
            .bind(snapshot.format_version as i32)
            .bind(&snapshot.config_version)
            .bind(&body)
            .execute(&mut *tx)
            .await?;
        let pruned = sqlx::query(PRUNE_SNAPSHOTS)
            .bind(&self.tenant)
            .bind(i64::from(self.retention))
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        if pruned > 0 {
            debug!("Pruned {pruned} old snapshots for tenant {}", self.tenant);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::config::EngineConfig;
    use crate::decision::engine::DecisionEngine;
    use crate::decision::rng::seeded;

    /// Runs only when TEST_DATABASE_URL points at a scratch database.
    async fn scratch_pool() -> Option<PgPool> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        Some(PgPool::connect(&url).await.unwrap())
    }

    async fn row_count(pool: &PgPool, tenant: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM decision_engine_snapshots WHERE tenant = $1")
            .bind(tenant)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[test]
    fn test_retention_keeps_at_least_one_row() {
        assert!(DEFAULT_SNAPSHOT_RETENTION >= 1);
        assert!(PRUNE_SNAPSHOTS.contains("LIMIT $2"));
        assert!(PRUNE_SNAPSHOTS.contains("ORDER BY created_at DESC"));
    }

    #[tokio::test]
    async fn test_saves_are_pruned_to_retention() {
        let Some(pool) = scratch_pool().await else {
            return;
        };
        let tenant = format!("test-{}", Uuid::new_v4());
        let store = PostgresSnapshotStore::connect(pool.clone(), &tenant)
            .await
            .unwrap()
            .with_retention(2);
        assert_eq!(store.retention(), 2);

        let config = EngineConfig {
            bootstrap_corpus_size: 10,
            ..EngineConfig::default().deterministic()
        };
        let engine = DecisionEngine::init(config, seeded(42)).unwrap();
        for _ in 0..4 {
            store.save(&engine.export_state()).await.unwrap();
        }
        assert_eq!(row_count(&pool, &tenant).await, 2);
        assert!(store.load().await.unwrap().is_some());

        sqlx::query("DELETE FROM decision_engine_snapshots WHERE tenant = $1")
            .bind(&tenant)
            .execute(&pool)
            .await
            .unwrap();
    }
}
