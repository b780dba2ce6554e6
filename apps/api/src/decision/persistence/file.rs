//! JSON file store. Writes go to a temp file in the target directory which is
//! then renamed over the snapshot, so readers never see a half-written file.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::decision::errors::PersistenceError;
use crate::decision::persistence::{EngineSnapshot, SnapshotStore};

pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| PersistenceError::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn load(&self) -> Result<Option<EngineSnapshot>, PersistenceError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, snapshot: &EngineSnapshot) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec(snapshot)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| PersistenceError::Io(std::io::Error::new(ErrorKind::Other, e)))??;
        debug!("Wrote snapshot to {}", self.path.display());
        Ok(())
    }
}
