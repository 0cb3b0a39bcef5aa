use std::{
    net::{IpAddr, UdpSocket},
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        validation::validate_counter_id,
        ws::{ClientMessage, CommandResult, NetworkInfo, PongPayload, ServerMessage},
    },
    services::events,
    state::{Role, SessionHandle, SharedState},
};

/// Handle the full lifecycle for one connected screen.
///
/// Every connection gets a dedicated writer task so broadcasts keep flowing
/// while we await inbound frames. The session joins the fan-out set
/// immediately and receives the current queue state before anything else.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // The writer owns the sink; it stops after a close frame goes out so a
    // force-disconnected session does not keep the task alive.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sender.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    let session_id = Uuid::new_v4();
    state.sessions().insert(
        session_id,
        SessionHandle {
            id: session_id,
            role: None,
            tx: outbound_tx.clone(),
            last_seen: Instant::now(),
        },
    );
    info!(%session_id, "screen connected");

    // Fresh connections (and reconnections) re-sync from this push instead
    // of trusting whatever they last saw.
    let view = events::queue_state_view(&state).await;
    events::send_message(&outbound_tx, &ServerMessage::QueueState(view));

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                touch(&state, session_id);
                match ClientMessage::from_json_str(&text) {
                    Ok(command) => {
                        handle_command(&state, session_id, &outbound_tx, command).await;
                    }
                    Err(err) => {
                        warn!(%session_id, error = %err, "rejecting client message");
                        events::send_message(
                            &outbound_tx,
                            &ServerMessage::CommandResult(CommandResult::err(
                                "unknown",
                                err.to_string(),
                            )),
                        );
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                touch(&state, session_id);
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Pong(_)) => touch(&state, session_id),
            Ok(Message::Close(frame)) => {
                info!(%session_id, "screen closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Err(err) => {
                warn!(%session_id, error = %err, "websocket error");
                break;
            }
        }

        // The liveness sweeper may have force-disconnected us mid-loop.
        if !state.sessions().contains_key(&session_id) {
            break;
        }
    }

    disconnect(&state, session_id).await;
    finalize(writer_task, outbound_tx).await;
}

/// Dispatch one validated inbound command.
pub(crate) async fn handle_command(
    state: &SharedState,
    session_id: Uuid,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    command: ClientMessage,
) {
    let request = command.event_name();
    match command {
        ClientMessage::RegisterScreen(role) => {
            register_screen(state, session_id, outbound_tx, &role).await;
        }
        ClientMessage::GetQueueState => {
            let view = events::queue_state_view(state).await;
            events::send_message(outbound_tx, &ServerMessage::QueueState(view));
        }
        ClientMessage::AddTicket(payload) => {
            let ticket = state
                .queue()
                .lock()
                .await
                .create_ticket(payload.service_type, payload.customer_name);
            state.mark_dirty().await;
            info!(%session_id, ticket_id = ticket.id, "ticket created");

            events::send_message(
                outbound_tx,
                &ServerMessage::CommandResult(CommandResult::ok_with_ticket(
                    request,
                    ticket.clone().into(),
                )),
            );
            events::broadcast_ticket_added(state, ticket.into());
            events::broadcast_queue_state(state).await;
        }
        ClientMessage::CallNextCustomer(arg) => {
            let counter_id = arg.value();
            if let Err(reason) = check_counter_claim(state, session_id, counter_id).await {
                events::send_message(
                    outbound_tx,
                    &ServerMessage::CommandResult(CommandResult::err(request, reason)),
                );
                return;
            }

            let outcome = state.queue().lock().await.call_next(counter_id);
            match outcome {
                Ok(ticket) => {
                    state.mark_dirty().await;
                    info!(%session_id, counter_id, ticket_id = ticket.id, "ticket called");
                    events::send_message(
                        outbound_tx,
                        &ServerMessage::CommandResult(CommandResult::ok_with_ticket(
                            request,
                            ticket.clone().into(),
                        )),
                    );
                    // Screens must show the serving state right away; the
                    // audible call-out is paced separately.
                    events::broadcast_queue_state(state).await;
                    state.enqueue_announcement(ticket, counter_id);
                }
                Err(err) => {
                    events::send_message(
                        outbound_tx,
                        &ServerMessage::CommandResult(CommandResult::err(
                            request,
                            err.to_string(),
                        )),
                    );
                }
            }
        }
        ClientMessage::CompleteService(arg) => {
            let counter_id = arg.value();
            if let Err(reason) = check_counter_claim(state, session_id, counter_id).await {
                events::send_message(
                    outbound_tx,
                    &ServerMessage::CommandResult(CommandResult::err(request, reason)),
                );
                return;
            }

            let outcome = state.queue().lock().await.complete_service(counter_id);
            match outcome {
                Ok(done) => {
                    state.mark_dirty().await;
                    info!(
                        %session_id,
                        counter_id,
                        ticket_id = done.ticket.id,
                        "service completed"
                    );
                    events::send_message(
                        outbound_tx,
                        &ServerMessage::CommandResult(CommandResult::ok(request)),
                    );
                    events::broadcast_ticket_completed(state, done.ticket.id, counter_id);
                    events::broadcast_queue_state(state).await;
                }
                Err(err) => {
                    // Ownership rejections are a client bug or a race worth
                    // seeing server-side.
                    warn!(%session_id, counter_id, error = %err, "completeService rejected");
                    events::send_message(
                        outbound_tx,
                        &ServerMessage::CommandResult(CommandResult::err(
                            request,
                            err.to_string(),
                        )),
                    );
                }
            }
        }
        ClientMessage::UpdateCounterStatus(payload) => {
            if let Err(reason) =
                check_counter_claim(state, session_id, payload.counter_id).await
            {
                events::send_message(
                    outbound_tx,
                    &ServerMessage::CommandResult(CommandResult::err(request, reason)),
                );
                return;
            }

            let outcome = state
                .queue()
                .lock()
                .await
                .update_counter_status(payload.counter_id, payload.status.into());
            match outcome {
                Ok(counter) => {
                    state.mark_dirty().await;
                    events::send_message(
                        outbound_tx,
                        &ServerMessage::CommandResult(CommandResult::ok(request)),
                    );
                    events::broadcast_counter_status(
                        state,
                        counter.id,
                        counter.status.into(),
                    );
                    events::broadcast_queue_state(state).await;
                }
                Err(err) => {
                    events::send_message(
                        outbound_tx,
                        &ServerMessage::CommandResult(CommandResult::err(
                            request,
                            err.to_string(),
                        )),
                    );
                }
            }
        }
        ClientMessage::Ping => {
            let timestamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0);
            events::send_message(outbound_tx, &ServerMessage::Pong(PongPayload { timestamp }));
        }
        ClientMessage::GetNetworkInfo => {
            let local_ip = discover_local_ip();
            let info = NetworkInfo {
                is_connected: local_ip.is_some(),
                local_ip: local_ip
                    .map(|ip| ip.to_string())
                    .unwrap_or_else(|| "127.0.0.1".to_string()),
                server_port: state.config().port,
            };
            events::send_message(outbound_tx, &ServerMessage::NetworkInfo(info));
        }
    }
}

/// Record the screen's role; employee screens get a counter id assigned and
/// pushed back to them alone.
async fn register_screen(
    state: &SharedState,
    session_id: Uuid,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    role_str: &str,
) {
    let role = Role::parse(role_str);
    if let Some(mut session) = state.sessions().get_mut(&session_id) {
        session.role = Some(role);
    }
    info!(%session_id, role = role_str, "screen registered");

    if role != Role::Employee {
        return;
    }

    let counter_id = state.registry().lock().await.assign(session_id);
    let created = state.queue().lock().await.ensure_counter(counter_id);
    info!(%session_id, counter_id, "counter id assigned");

    events::send_message(outbound_tx, &ServerMessage::AssignedCounterId(counter_id));
    // A brand-new counter entity changes the picture for everyone else.
    if created {
        state.mark_dirty().await;
        events::broadcast_queue_state(state).await;
    }
}

/// Validate a claimed counter id and check it against the session's
/// assignment. The returned message names the legitimate assignment so desk
/// staff can see what went wrong.
async fn check_counter_claim(
    state: &SharedState,
    session_id: Uuid,
    counter_id: u32,
) -> Result<(), String> {
    if let Err(err) = validate_counter_id(counter_id) {
        return Err(err
            .message
            .map(|m| m.to_string())
            .unwrap_or_else(|| "invalid counterId".to_string()));
    }

    let registry = state.registry().lock().await;
    if registry.authorize(session_id, counter_id) {
        return Ok(());
    }
    let assigned = registry.assignment(session_id);
    drop(registry);

    warn!(
        %session_id,
        claimed = counter_id,
        assigned = assigned.unwrap_or(0),
        "counter claim rejected"
    );
    Err(match assigned {
        Some(own) => format!(
            "this screen operates counter {own} and cannot act for counter {counter_id}"
        ),
        None => format!("this screen is not assigned counter {counter_id}"),
    })
}

/// Refresh the session's liveness mark on any inbound activity.
fn touch(state: &SharedState, session_id: Uuid) {
    if let Some(mut session) = state.sessions().get_mut(&session_id) {
        session.last_seen = Instant::now();
    }
}

/// Run full disconnect cleanup for a session: leave the fan-out set and
/// release any assigned counter id. Idempotent, shared with the liveness
/// sweeper.
pub async fn disconnect(state: &SharedState, session_id: Uuid) {
    state.sessions().remove(&session_id);
    if let Some(counter_id) = state.registry().lock().await.release(session_id) {
        info!(%session_id, counter_id, "released counter id");
    }
    info!(%session_id, "screen disconnected");
}

/// Best-effort LAN address discovery for kiosk provisioning.
///
/// Routes a UDP socket towards a public address to learn which local
/// interface would carry it; no packet is actually sent.
fn discover_local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).ok()?;
    socket.connect(("8.8.8.8", 80)).ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};
    use tokio::sync::mpsc::UnboundedReceiver;

    /// Register a fake session directly on the state, returning its id and
    /// the receiving half of its writer channel.
    fn attach_session(state: &SharedState) -> (Uuid, UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session_id = Uuid::new_v4();
        state.sessions().insert(
            session_id,
            SessionHandle {
                id: session_id,
                role: None,
                tx,
                last_seen: Instant::now(),
            },
        );
        (session_id, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<Message>) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let Message::Text(text) = message {
                out.push(serde_json::from_str(&text).unwrap());
            }
        }
        out
    }

    fn events_named<'a>(
        messages: &'a [serde_json::Value],
        event: &str,
    ) -> Vec<&'a serde_json::Value> {
        messages.iter().filter(|m| m["event"] == event).collect()
    }

    async fn send(
        state: &SharedState,
        session_id: Uuid,
        tx: &mpsc::UnboundedSender<Message>,
        raw: &str,
    ) {
        let command = ClientMessage::from_json_str(raw).unwrap();
        handle_command(state, session_id, tx, command).await;
    }

    fn state() -> SharedState {
        AppState::new(AppConfig::default()).0
    }

    #[tokio::test]
    async fn employee_registration_pushes_the_assigned_id_privately() {
        let state = state();
        let (employee, mut employee_rx) = attach_session(&state);
        let (display, mut display_rx) = attach_session(&state);
        let tx = state.sessions().get(&employee).unwrap().tx.clone();
        let display_tx = state.sessions().get(&display).unwrap().tx.clone();

        send(&state, display, &display_tx, r#"{"event":"registerScreen","data":"display"}"#)
            .await;
        send(&state, employee, &tx, r#"{"event":"registerScreen","data":"employee"}"#).await;

        let employee_msgs = drain(&mut employee_rx);
        let assigned = events_named(&employee_msgs, "assignedCounterId");
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0]["data"], 1);

        // The display never sees someone else's assignment.
        let display_msgs = drain(&mut display_rx);
        assert!(events_named(&display_msgs, "assignedCounterId").is_empty());
    }

    #[tokio::test]
    async fn add_ticket_acks_and_broadcasts() {
        let state = state();
        let (kiosk, mut kiosk_rx) = attach_session(&state);
        let (display, mut display_rx) = attach_session(&state);
        let tx = state.sessions().get(&kiosk).unwrap().tx.clone();

        send(
            &state,
            kiosk,
            &tx,
            r#"{"event":"add-ticket","data":{"serviceType":"general","customerName":"Ada"}}"#,
        )
        .await;

        let kiosk_msgs = drain(&mut kiosk_rx);
        let acks = events_named(&kiosk_msgs, "commandResult");
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0]["data"]["success"], true);
        assert_eq!(acks[0]["data"]["ticket"]["id"], 1);

        let display_msgs = drain(&mut display_rx);
        assert_eq!(events_named(&display_msgs, "ticketAdded").len(), 1);
        assert_eq!(events_named(&display_msgs, "queueState").len(), 1);
    }

    #[tokio::test]
    async fn call_next_broadcasts_state_before_any_announcement() {
        let state = state();
        let (desk, mut desk_rx) = attach_session(&state);
        let tx = state.sessions().get(&desk).unwrap().tx.clone();

        send(&state, desk, &tx, r#"{"event":"registerScreen","data":"employee"}"#).await;
        send(
            &state,
            desk,
            &tx,
            r#"{"event":"add-ticket","data":{"serviceType":"general"}}"#,
        )
        .await;
        drain(&mut desk_rx);

        send(&state, desk, &tx, r#"{"event":"callNextCustomer","data":1}"#).await;

        let msgs = drain(&mut desk_rx);
        let states = events_named(&msgs, "queueState");
        assert_eq!(states.len(), 1);
        assert_eq!(states[0]["data"]["tickets"][0]["status"], "serving");
        // The announcement is paced by its own scheduler, so no worker means
        // no ticketCalled here.
        assert!(events_named(&msgs, "ticketCalled").is_empty());
    }

    #[tokio::test]
    async fn spoofed_counter_claims_are_rejected_without_state_change() {
        let state = state();
        let (desk_a, _rx_a) = attach_session(&state);
        let (desk_b, mut rx_b) = attach_session(&state);
        let tx_a = state.sessions().get(&desk_a).unwrap().tx.clone();
        let tx_b = state.sessions().get(&desk_b).unwrap().tx.clone();

        send(&state, desk_a, &tx_a, r#"{"event":"registerScreen","data":"employee"}"#).await;
        send(&state, desk_b, &tx_b, r#"{"event":"registerScreen","data":"employee"}"#).await;
        send(
            &state,
            desk_a,
            &tx_a,
            r#"{"event":"add-ticket","data":{"serviceType":"general"}}"#,
        )
        .await;
        send(&state, desk_a, &tx_a, r#"{"event":"callNextCustomer","data":1}"#).await;
        drain(&mut rx_b);

        // Desk B holds counter 2 but tries to complete counter 1's ticket.
        send(&state, desk_b, &tx_b, r#"{"event":"completeService","data":1}"#).await;

        let msgs = drain(&mut rx_b);
        let acks = events_named(&msgs, "commandResult");
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0]["data"]["success"], false);
        let error = acks[0]["data"]["error"].as_str().unwrap();
        assert!(error.contains("counter 2"), "error names the real assignment: {error}");

        // No broadcast, no mutation.
        assert!(events_named(&msgs, "queueState").is_empty());
        let snapshot = state.queue().lock().await.snapshot();
        assert_eq!(snapshot.counters[0].current_ticket, Some(1));
    }

    #[tokio::test]
    async fn complete_service_names_the_owner_on_cross_counter_races() {
        let state = state();
        let (desk, mut rx) = attach_session(&state);
        let tx = state.sessions().get(&desk).unwrap().tx.clone();

        // Unregistered legacy session passes authorize but hits the store's
        // ownership/busy checks.
        send(&state, desk, &tx, r#"{"event":"completeService","data":7}"#).await;
        let msgs = drain(&mut rx);
        let acks = events_named(&msgs, "commandResult");
        assert_eq!(acks[0]["data"]["success"], false);
        assert!(
            acks[0]["data"]["error"]
                .as_str()
                .unwrap()
                .contains("not found")
        );
    }

    #[tokio::test]
    async fn zero_counter_id_is_rejected_before_authorization() {
        let state = state();
        let (desk, mut rx) = attach_session(&state);
        let tx = state.sessions().get(&desk).unwrap().tx.clone();

        send(&state, desk, &tx, r#"{"event":"callNextCustomer","data":0}"#).await;
        let msgs = drain(&mut rx);
        let acks = events_named(&msgs, "commandResult");
        assert_eq!(acks[0]["data"]["success"], false);
        assert!(
            acks[0]["data"]["error"]
                .as_str()
                .unwrap()
                .contains("positive")
        );
    }

    #[tokio::test]
    async fn disconnect_releases_the_counter_for_the_next_registration() {
        let state = state();
        let (first, _rx1) = attach_session(&state);
        let tx1 = state.sessions().get(&first).unwrap().tx.clone();
        send(&state, first, &tx1, r#"{"event":"registerScreen","data":"employee"}"#).await;

        disconnect(&state, first).await;

        let (second, mut rx2) = attach_session(&state);
        let tx2 = state.sessions().get(&second).unwrap().tx.clone();
        send(&state, second, &tx2, r#"{"event":"registerScreen","data":"employee"}"#).await;

        let msgs = drain(&mut rx2);
        let assigned = events_named(&msgs, "assignedCounterId");
        assert_eq!(assigned[0]["data"], 1);
    }

    #[tokio::test]
    async fn get_queue_state_is_idempotent_and_private() {
        let state = state();
        let (viewer, mut viewer_rx) = attach_session(&state);
        let (other, mut other_rx) = attach_session(&state);
        let tx = state.sessions().get(&viewer).unwrap().tx.clone();

        send(&state, viewer, &tx, r#"{"event":"getQueueState"}"#).await;
        send(&state, viewer, &tx, r#"{"event":"getQueueState"}"#).await;

        let msgs = drain(&mut viewer_rx);
        let states = events_named(&msgs, "queueState");
        assert_eq!(states.len(), 2);
        assert_eq!(states[0], states[1]);
        assert!(drain(&mut other_rx).is_empty());
    }
}
