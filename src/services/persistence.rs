use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use crate::{
    dao::{models::QueueStateEntity, snapshot_store::SnapshotStore},
    state::SharedState,
};

/// Debounced dirty-flag buffer between in-memory mutations and durable
/// writes.
///
/// Mutations call [`WriteBuffer::mark_dirty`]; the persistence supervisor
/// polls [`WriteBuffer::flush_due`] and snapshots the queue when the window
/// has elapsed. The live system is allowed to run ahead of durable storage
/// within the window; on a crash at most one window of changes is lost.
#[derive(Debug)]
pub struct WriteBuffer {
    dirty: bool,
    dirty_since: Option<Instant>,
    debounce: Duration,
}

impl WriteBuffer {
    /// Create a clean buffer with the given debounce window.
    pub fn new(debounce: Duration) -> Self {
        Self {
            dirty: false,
            dirty_since: None,
            debounce,
        }
    }

    /// Record that the in-memory state has moved ahead of the stored one.
    ///
    /// The debounce clock starts at the first mark and is not pushed back by
    /// subsequent marks, so a steady stream of mutations still flushes.
    pub fn mark_dirty(&mut self) {
        if !self.dirty {
            self.dirty = true;
            self.dirty_since = Some(Instant::now());
        }
    }

    /// Whether a flush is owed at `now`.
    pub fn flush_due(&self, now: Instant) -> bool {
        match (self.dirty, self.dirty_since) {
            (true, Some(since)) => now.duration_since(since) >= self.debounce,
            _ => false,
        }
    }

    /// Clear the dirty flag, returning whether it was set.
    pub fn take(&mut self) -> bool {
        let was_dirty = self.dirty;
        self.dirty = false;
        self.dirty_since = None;
        was_dirty
    }
}

/// Load the persisted snapshot (if any) into the queue store, then install
/// the snapshot store so the supervisor can write through it.
pub async fn restore_and_install(state: &SharedState, store: Arc<dyn SnapshotStore>) {
    match store.load().await {
        Ok(Some(entity)) => {
            let tickets = entity.tickets.len();
            let counters = entity.counters.len();
            let mut queue = state.queue().lock().await;
            *queue = entity.into();
            info!(tickets, counters, "restored queue state from snapshot");
        }
        Ok(None) => info!("no persisted snapshot; starting with a fresh queue"),
        Err(err) => {
            // A corrupt or unreadable snapshot must not take the service
            // down; it keeps serving from an empty queue.
            warn!(error = %err, "failed to load snapshot; starting with a fresh queue");
        }
    }
    state.install_snapshot_store(store).await;
}

/// Drive the debounced write-back loop until the process shuts down.
pub async fn run(state: SharedState) {
    let poll = poll_period(state.config().persist_debounce);
    let mut tick = interval(poll);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tick.tick().await;
        flush(&state, false).await;
    }
}

/// Write the current snapshot if one is owed (or unconditionally when
/// `force` and dirty), re-marking the buffer on failure so the next cycle
/// retries.
pub async fn flush(state: &SharedState, force: bool) {
    let owed = {
        let mut buffer = state.write_buffer().lock().await;
        if force {
            buffer.take()
        } else if buffer.flush_due(Instant::now()) {
            buffer.take()
        } else {
            false
        }
    };
    if !owed {
        return;
    }

    let Some(store) = state.snapshot_store().await else {
        state.write_buffer().lock().await.mark_dirty();
        return;
    };

    let entity = QueueStateEntity::from(state.queue().lock().await.snapshot());
    match store.save(entity).await {
        Ok(()) => {
            if state.is_degraded() {
                info!("snapshot write succeeded; leaving degraded mode");
                state.update_degraded(false);
            }
        }
        Err(err) => {
            warn!(error = %err, "snapshot write failed; will retry next cycle");
            state.write_buffer().lock().await.mark_dirty();
            state.update_degraded(true);
        }
    }
}

/// Flush any outstanding state before process exit.
///
/// Called from the graceful-shutdown path so the accepted data-loss window
/// closes at zero on a clean stop.
pub async fn flush_all(state: &SharedState) {
    flush(state, true).await;
}

fn poll_period(debounce: Duration) -> Duration {
    (debounce / 4).max(Duration::from_millis(100))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::snapshot_store::JsonSnapshotStore,
        state::{AppState, queue::QueueStore},
    };

    #[test]
    fn buffer_waits_out_the_debounce_window() {
        let mut buffer = WriteBuffer::new(Duration::from_millis(500));
        let start = Instant::now();
        assert!(!buffer.flush_due(start));

        buffer.mark_dirty();
        assert!(!buffer.flush_due(start));
        assert!(buffer.flush_due(start + Duration::from_millis(500)));
    }

    #[test]
    fn remarking_does_not_push_the_window_back() {
        let mut buffer = WriteBuffer::new(Duration::from_millis(500));
        buffer.mark_dirty();
        let deadline = Instant::now() + Duration::from_millis(600);
        buffer.mark_dirty();
        buffer.mark_dirty();
        assert!(buffer.flush_due(deadline));
    }

    #[test]
    fn take_clears_and_reports_the_flag() {
        let mut buffer = WriteBuffer::new(Duration::ZERO);
        assert!(!buffer.take());
        buffer.mark_dirty();
        assert!(buffer.take());
        assert!(!buffer.take());
    }

    #[tokio::test]
    async fn forced_flush_persists_pending_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue-state.json");
        let store = Arc::new(JsonSnapshotStore::open(&path).await.unwrap());

        let (state, _announcements) = AppState::new(AppConfig::default());
        restore_and_install(&state, store.clone()).await;

        state.queue().lock().await.create_ticket("general".into(), None);
        state.mark_dirty().await;
        flush_all(&state).await;

        let restored: QueueStore = store.load().await.unwrap().unwrap().into();
        assert_eq!(restored.snapshot().last_ticket_number, 1);
    }

    #[tokio::test]
    async fn restore_resumes_ticket_numbering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue-state.json");
        let store = Arc::new(JsonSnapshotStore::open(&path).await.unwrap());

        let (state, _announcements) = AppState::new(AppConfig::default());
        restore_and_install(&state, store.clone()).await;
        state.queue().lock().await.create_ticket("general".into(), None);
        state.mark_dirty().await;
        flush_all(&state).await;

        let (fresh, _announcements) = AppState::new(AppConfig::default());
        restore_and_install(&fresh, store).await;
        let next = fresh.queue().lock().await.create_ticket("general".into(), None);
        assert_eq!(next.id, 2);
    }
}
