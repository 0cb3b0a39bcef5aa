pub mod json;

use futures::future::BoxFuture;

use crate::dao::{models::QueueStateEntity, storage::StorageResult};

pub use json::JsonSnapshotStore;

/// Abstraction over durable queue-state snapshots.
///
/// The live system never waits on this: writes are debounced by the
/// persistence supervisor, and a failing backend only widens the accepted
/// data-loss window.
pub trait SnapshotStore: Send + Sync {
    /// Read the last persisted snapshot, or `None` when none exists yet.
    fn load(&self) -> BoxFuture<'static, StorageResult<Option<QueueStateEntity>>>;
    /// Replace the persisted snapshot.
    fn save(&self, state: QueueStateEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Verify the backend can accept writes.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
