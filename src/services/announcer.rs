use std::time::Instant;

use tokio::{sync::mpsc::UnboundedReceiver, time::sleep};
use tracing::{debug, info};

use crate::{services::events, state::SharedState, state::queue::Ticket};

/// A queued public call-out pairing a ticket with the counter now serving it.
///
/// The ticket is a snapshot copy taken at call time; later mutations do not
/// retroactively change what gets announced.
#[derive(Debug, Clone)]
pub struct Announcement {
    /// Snapshot of the called ticket.
    pub ticket: Ticket,
    /// Counter the customer is called to.
    pub counter_id: u32,
    /// Instant the entry joined the queue.
    pub enqueued_at: Instant,
}

/// Drain the announcement queue one entry at a time.
///
/// Each entry is broadcast and then held for the configured dwell before the
/// next one plays, so back-to-back calls from different counters never
/// overlap on shared audio or display surfaces. Entries always run to
/// completion once dequeued; the loop ends when the sending half closes at
/// shutdown, dropping whatever is still queued.
pub async fn run(state: SharedState, mut queue: UnboundedReceiver<Announcement>) {
    let dwell = state.config().announcement_dwell;

    while let Some(entry) = queue.recv().await {
        debug!(
            ticket_id = entry.ticket.id,
            counter_id = entry.counter_id,
            queued_ms = entry.enqueued_at.elapsed().as_millis() as u64,
            "announcing ticket"
        );
        events::broadcast_ticket_called(&state, entry.ticket.into(), entry.counter_id);
        sleep(dwell).await;
    }

    info!("announcement queue closed; scheduler stopping");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::{config::AppConfig, state::AppState};

    async fn recv_event(
        sub: &mut tokio::sync::broadcast::Receiver<crate::dto::sse::ServerEvent>,
    ) -> crate::dto::sse::ServerEvent {
        sub.recv().await.expect("hub closed")
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_back_calls_are_paced_by_the_dwell() {
        let config = AppConfig {
            announcement_dwell: Duration::from_secs(6),
            ..AppConfig::default()
        };
        let (state, queue) = AppState::new(config);
        let mut sub = state.public_sse().subscribe();
        tokio::spawn(run(state.clone(), queue));

        let first = state.queue().lock().await.create_ticket("general".into(), None);
        let second = state.queue().lock().await.create_ticket("general".into(), None);
        state.enqueue_announcement(first, 1);
        state.enqueue_announcement(second, 2);

        let event = recv_event(&mut sub).await;
        assert_eq!(event.event.as_deref(), Some("ticketCalled"));
        assert!(event.data.contains("\"counterId\":1"));

        // Nothing may arrive before the dwell elapses.
        assert!(
            timeout(Duration::from_millis(5_900), sub.recv())
                .await
                .is_err()
        );

        let event = timeout(Duration::from_millis(200), recv_event(&mut sub))
            .await
            .expect("second announcement due after the dwell");
        assert_eq!(event.event.as_deref(), Some("ticketCalled"));
        assert!(event.data.contains("\"counterId\":2"));
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_goes_idle_on_an_empty_queue() {
        let (state, queue) = AppState::new(AppConfig::default());
        let mut sub = state.public_sse().subscribe();
        tokio::spawn(run(state.clone(), queue));

        let ticket = state.queue().lock().await.create_ticket("general".into(), None);
        state.enqueue_announcement(ticket, 1);
        recv_event(&mut sub).await;

        // Queue drained: no further events, even well past the dwell.
        assert!(timeout(Duration::from_secs(60), sub.recv()).await.is_err());
    }
}
