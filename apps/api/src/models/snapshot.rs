use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EngineSnapshotRow {
    pub id: Uuid,
    pub tenant: String,
    pub format_version: i32,
    pub config_version: String,
    pub snapshot: Value,
    pub created_at: DateTime<Utc>,
}
