//! Liveness sweeping for connected screens.
//!
//! Kiosk hardware drops off networks without closing sockets. Any inbound
//! frame refreshes a session's `last_seen` mark; this sweeper disconnects
//! sessions that stay silent past the configured timeout so their counter
//! ids return to the pool.

use axum::extract::ws::Message;
use tokio::{
    sync::mpsc::UnboundedSender,
    time::{MissedTickBehavior, interval},
};
use tracing::warn;
use uuid::Uuid;

use crate::{services::session_service, state::SharedState};

/// Periodically disconnect sessions that have gone silent.
pub async fn run(state: SharedState) {
    let mut ticker = interval(state.config().heartbeat_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        sweep(&state).await;
    }
}

/// One sweep pass: collect expired sessions, push a close frame through each
/// writer so the socket actually winds down, then run full disconnect
/// cleanup.
///
/// The close frame matters: a silent client never produces an inbound frame,
/// so its reader loop would otherwise stay parked on the socket until TCP
/// gives up.
pub(crate) async fn sweep(state: &SharedState) {
    let timeout = state.config().heartbeat_timeout;
    let expired: Vec<(Uuid, UnboundedSender<Message>)> = state
        .sessions()
        .iter()
        .filter(|session| session.last_seen.elapsed() > timeout)
        .map(|session| (session.id, session.tx.clone()))
        .collect();

    for (session_id, tx) in expired {
        warn!(%session_id, "session heartbeat expired; disconnecting");
        let _ = tx.send(Message::Close(None));
        session_service::disconnect(state, session_id).await;
    }
}
