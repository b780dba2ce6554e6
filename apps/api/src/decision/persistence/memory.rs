use async_trait::async_trait;
use parking_lot::Mutex;

use crate::decision::errors::PersistenceError;
use crate::decision::persistence::{EngineSnapshot, SnapshotStore};

/// Keeps the latest snapshot in process memory. Default backend; also the
/// stub used by tests.
#[derive(Default)]
pub struct MemorySnapshotStore {
    latest: Mutex<Option<EngineSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn load(&self) -> Result<Option<EngineSnapshot>, PersistenceError> {
        Ok(self.latest.lock().clone())
    }

    async fn save(&self, snapshot: &EngineSnapshot) -> Result<(), PersistenceError> {
        *self.latest.lock() = Some(snapshot.clone());
        Ok(())
    }
}
