//! Redis store: the latest snapshot as a JSON string under a per-tenant key.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::decision::errors::PersistenceError;
use crate::decision::persistence::{EngineSnapshot, SnapshotStore};

pub struct RedisSnapshotStore {
    conn: MultiplexedConnection,
    key: String,
}

pub fn snapshot_key(tenant: &str) -> String {
    format!("decision-engine:{tenant}:snapshot")
}

impl RedisSnapshotStore {
    pub async fn connect(url: &str, tenant: &str) -> Result<Self, PersistenceError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn,
            key: snapshot_key(tenant),
        })
    }
}

#[async_trait]
impl SnapshotStore for RedisSnapshotStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn load(&self) -> Result<Option<EngineSnapshot>, PersistenceError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&self.key).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, snapshot: &EngineSnapshot) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(snapshot)?;
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(&self.key, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_namespaced_by_tenant() {
        assert_eq!(snapshot_key("acme"), "decision-engine:acme:snapshot");
    }
}
