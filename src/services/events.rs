use std::time::SystemTime;

use axum::extract::ws::Message;
use tracing::warn;

use crate::{
    dto::{
        format_system_time,
        queue::{CounterStatusDto, QueueStateView, TicketView},
        sse::ServerEvent,
        ws::{
            CounterStatusChangedEvent, ServerMessage, TicketCalledEvent, TicketCompletedEvent,
        },
    },
    state::SharedState,
};

/// Push the current queue snapshot to every connected session.
///
/// Broadcast immediately after each successful mutation, before any queued
/// announcement plays out, so screens reflect `serving` state right away.
pub async fn broadcast_queue_state(state: &SharedState) {
    let view = queue_state_view(state).await;
    broadcast_all(state, &ServerMessage::QueueState(view));
}

/// Current queue state as a wire view.
pub async fn queue_state_view(state: &SharedState) -> QueueStateView {
    let snapshot = state.queue().lock().await.snapshot();
    snapshot.into()
}

/// Notify all sessions that a ticket joined the queue.
pub fn broadcast_ticket_added(state: &SharedState, ticket: TicketView) {
    broadcast_all(state, &ServerMessage::TicketAdded(ticket));
}

/// Emit the paced public call-out for a ticket.
pub fn broadcast_ticket_called(state: &SharedState, ticket: TicketView, counter_id: u32) {
    let event = TicketCalledEvent {
        ticket,
        counter_id,
        timestamp: format_system_time(SystemTime::now()),
    };
    broadcast_all(state, &ServerMessage::TicketCalled(event));
}

/// Notify all sessions that a counter finished serving a ticket.
pub fn broadcast_ticket_completed(state: &SharedState, ticket_id: u64, counter_id: u32) {
    let event = TicketCompletedEvent {
        ticket_id,
        counter_id,
    };
    broadcast_all(state, &ServerMessage::TicketCompleted(event));
}

/// Notify all sessions of a counter's new operational status.
pub fn broadcast_counter_status(state: &SharedState, counter_id: u32, status: CounterStatusDto) {
    let event = CounterStatusChangedEvent { counter_id, status };
    broadcast_all(state, &ServerMessage::CounterStatusChanged(event));
}

/// Serialize once, then fan out to every session plus the SSE mirror.
pub fn broadcast_all(state: &SharedState, message: &ServerMessage) {
    let Some((text, event, data)) = encode(message) else {
        return;
    };

    for session in state.sessions().iter() {
        let _ = session.tx.send(Message::Text(text.clone().into()));
    }
    state.public_sse().broadcast(ServerEvent::new(Some(event), data));
}

/// Serialize a payload and push it onto the provided writer channel.
///
/// Serialization failures are permanent (a bug in our payload types), so they
/// are logged and swallowed. A closed writer means the session is going away.
pub fn send_message(
    tx: &tokio::sync::mpsc::UnboundedSender<Message>,
    message: &ServerMessage,
) -> bool {
    match serde_json::to_string(message) {
        Ok(text) => tx.send(Message::Text(text.into())).is_ok(),
        Err(err) => {
            warn!(error = %err, "failed to serialize server message");
            true
        }
    }
}

fn encode(message: &ServerMessage) -> Option<(String, String, String)> {
    let value = match serde_json::to_value(message) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "failed to serialize broadcast payload");
            return None;
        }
    };
    let event = value
        .get("event")
        .and_then(|e| e.as_str())
        .unwrap_or("message")
        .to_string();
    let data = value
        .get("data")
        .map(|d| d.to_string())
        .unwrap_or_else(|| "null".to_string());
    Some((value.to_string(), event, data))
}
