pub mod queue;
pub mod registry;
mod sse;

use std::{sync::Arc, time::Instant};

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tracing::warn;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::snapshot_store::SnapshotStore,
    error::ServiceError,
    services::{announcer::Announcement, persistence::WriteBuffer},
    state::{
        queue::{QueueStore, Ticket},
        registry::CounterRegistry,
    },
};

pub use self::sse::SseHub;

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

/// Screen roles a connection can register as.
///
/// Only [`Role::Employee`] has registration side effects (counter id
/// assignment); everything else is a read-mostly surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Ticket-dispensing kiosk.
    Customer,
    /// Public waiting-room display.
    Display,
    /// Counter desk screen.
    Employee,
    /// Management dashboard.
    Admin,
    /// Unrecognised role string; treated as a display-grade surface.
    Other,
}

impl Role {
    /// Map a wire role string onto a known role, tolerating unknown values.
    pub fn parse(value: &str) -> Self {
        match value {
            "customer" => Role::Customer,
            "display" => Role::Display,
            "employee" => Role::Employee,
            "admin" => Role::Admin,
            _ => Role::Other,
        }
    }
}

/// Handle used to push messages to one connected screen.
pub struct SessionHandle {
    /// Session identifier, assigned at upgrade time.
    pub id: Uuid,
    /// Role claimed via `registerScreen`, if any yet.
    pub role: Option<Role>,
    /// Writer channel feeding the socket's dedicated sender task.
    pub tx: mpsc::UnboundedSender<Message>,
    /// Last instant any frame arrived from this client.
    pub last_seen: Instant,
}

/// Central application state owning the queue, the identity registry, and
/// all connected sessions.
///
/// Everything mutable lives behind an explicit lock owned here; components
/// receive `&AppState` rather than reaching for globals, and teardown is
/// explicit (announcer channel close + final flush in `main`).
pub struct AppState {
    config: AppConfig,
    queue: Mutex<QueueStore>,
    registry: Mutex<CounterRegistry>,
    sessions: DashMap<Uuid, SessionHandle>,
    public_sse: SseHub,
    announcements: mpsc::UnboundedSender<Announcement>,
    write_buffer: Mutex<WriteBuffer>,
    snapshot_store: RwLock<Option<Arc<dyn SnapshotStore>>>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct the shared state plus the receiving half of the
    /// announcement queue, which the caller hands to the announcer task.
    ///
    /// The application starts in degraded mode until a snapshot store is
    /// installed.
    pub fn new(config: AppConfig) -> (SharedState, mpsc::UnboundedReceiver<Announcement>) {
        let (announce_tx, announce_rx) = mpsc::unbounded_channel();
        let (degraded_tx, _rx) = watch::channel(true);
        let write_buffer = WriteBuffer::new(config.persist_debounce);
        let state = Arc::new(Self {
            config,
            queue: Mutex::new(QueueStore::new()),
            registry: Mutex::new(CounterRegistry::new()),
            sessions: DashMap::new(),
            public_sse: SseHub::new(16),
            announcements: announce_tx,
            write_buffer: Mutex::new(write_buffer),
            snapshot_store: RwLock::new(None),
            degraded: degraded_tx,
        });
        (state, announce_rx)
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The queue state store; all ticket/counter mutations serialize here.
    pub fn queue(&self) -> &Mutex<QueueStore> {
        &self.queue
    }

    /// The counter identity registry.
    pub fn registry(&self) -> &Mutex<CounterRegistry> {
        &self.registry
    }

    /// Registry of connected sessions keyed by their identifier.
    pub fn sessions(&self) -> &DashMap<Uuid, SessionHandle> {
        &self.sessions
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        &self.public_sse
    }

    /// The debounced write buffer guarding snapshot persistence.
    pub fn write_buffer(&self) -> &Mutex<WriteBuffer> {
        &self.write_buffer
    }

    /// Flag the persisted snapshot as stale after a mutation.
    pub async fn mark_dirty(&self) {
        self.write_buffer.lock().await.mark_dirty();
    }

    /// Queue a public call-out for the announcer to pace.
    ///
    /// Fire-and-forget: the calling command has already succeeded and
    /// broadcast its state change by the time this runs.
    pub fn enqueue_announcement(&self, ticket: Ticket, counter_id: u32) {
        let entry = Announcement {
            ticket,
            counter_id,
            enqueued_at: Instant::now(),
        };
        if self.announcements.send(entry).is_err() {
            warn!(counter_id, "announcement scheduler stopped; dropping call-out");
        }
    }

    /// Obtain a handle to the snapshot store, if one is installed.
    pub async fn snapshot_store(&self) -> Option<Arc<dyn SnapshotStore>> {
        let guard = self.snapshot_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the snapshot store or fail with a degraded-mode error.
    pub async fn require_snapshot_store(&self) -> Result<Arc<dyn SnapshotStore>, ServiceError> {
        self.snapshot_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a snapshot store implementation and leave degraded mode.
    pub async fn install_snapshot_store(&self, store: Arc<dyn SnapshotStore>) {
        {
            let mut guard = self.snapshot_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        if self.is_degraded() == value {
            return;
        }
        let _ = self.degraded.send(value);
    }
}
