use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::future::BoxFuture;
use tokio::fs;

use crate::dao::{
    models::QueueStateEntity,
    snapshot_store::SnapshotStore,
    storage::{StorageError, StorageResult},
};

/// Snapshot store backed by a single local JSON file.
///
/// Saves go through a sibling temp file and an atomic rename so a crash
/// mid-write never leaves a truncated snapshot behind.
#[derive(Clone)]
pub struct JsonSnapshotStore {
    path: Arc<PathBuf>,
}

impl JsonSnapshotStore {
    /// Open the store, creating the parent directory if needed.
    pub async fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|source| {
                StorageError::unavailable(
                    format!("creating snapshot directory `{}`", parent.display()),
                    source,
                )
            })?;
        }
        Ok(Self {
            path: Arc::new(path),
        })
    }

    fn tmp_path(path: &Path) -> PathBuf {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn load(&self) -> BoxFuture<'static, StorageResult<Option<QueueStateEntity>>> {
        let path = self.path.clone();
        Box::pin(async move {
            let bytes = match fs::read(path.as_path()).await {
                Ok(bytes) => bytes,
                Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
                Err(err) => {
                    return Err(StorageError::unavailable(
                        format!("reading snapshot `{}`", path.display()),
                        err,
                    ));
                }
            };

            let entity = serde_json::from_slice(&bytes).map_err(|source| {
                StorageError::corrupt(
                    format!("decoding snapshot `{}`", path.display()),
                    source,
                )
            })?;
            Ok(Some(entity))
        })
    }

    fn save(&self, state: QueueStateEntity) -> BoxFuture<'static, StorageResult<()>> {
        let path = self.path.clone();
        Box::pin(async move {
            let bytes = serde_json::to_vec_pretty(&state).map_err(|source| {
                StorageError::corrupt("encoding snapshot".into(), source)
            })?;

            let tmp = Self::tmp_path(&path);
            fs::write(&tmp, &bytes).await.map_err(|source| {
                StorageError::unavailable(
                    format!("writing snapshot `{}`", tmp.display()),
                    source,
                )
            })?;
            fs::rename(&tmp, path.as_path()).await.map_err(|source| {
                StorageError::unavailable(
                    format!("replacing snapshot `{}`", path.display()),
                    source,
                )
            })?;
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let path = self.path.clone();
        Box::pin(async move {
            let parent = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            fs::metadata(&parent).await.map_err(|source| {
                StorageError::unavailable(
                    format!("snapshot directory `{}` unavailable", parent.display()),
                    source,
                )
            })?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dao::models::QueueStateEntity, state::queue::QueueStore};

    #[tokio::test]
    async fn load_without_snapshot_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSnapshotStore::open(dir.path().join("queue-state.json"))
            .await
            .unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_restores_the_queue() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSnapshotStore::open(dir.path().join("queue-state.json"))
            .await
            .unwrap();

        let mut queue = QueueStore::new();
        queue.create_ticket("general".into(), Some("Ada".into()));
        queue.create_ticket("financial".into(), None);
        queue.call_next(1).unwrap();

        store
            .save(QueueStateEntity::from(queue.snapshot()))
            .await
            .unwrap();

        // Timestamps round-trip at millisecond precision, so compare the
        // parts that must match exactly.
        let restored: QueueStore = store.load().await.unwrap().unwrap().into();
        let (restored, original) = (restored.snapshot(), queue.snapshot());
        assert_eq!(restored.last_ticket_number, original.last_ticket_number);
        assert_eq!(restored.counters, original.counters);
        assert_eq!(restored.tickets.len(), original.tickets.len());
        for (r, o) in restored.tickets.iter().zip(&original.tickets) {
            assert_eq!(r.id, o.id);
            assert_eq!(r.status, o.status);
            assert_eq!(r.service_type, o.service_type);
            assert_eq!(r.served_by, o.served_by);
            assert_eq!(r.customer_name, o.customer_name);
        }
    }

    #[tokio::test]
    async fn open_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("data/state/queue-state.json");
        let store = JsonSnapshotStore::open(&nested).await.unwrap();
        store.health_check().await.unwrap();
    }
}
