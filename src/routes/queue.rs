use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get},
};

use crate::{
    dto::queue::{QueueStateView, TicketView},
    error::{AppError, ServiceError},
    services::events,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/queue",
    tag = "queue",
    responses((status = 200, description = "Current queue snapshot", body = QueueStateView))
)]
/// Return the current queue state for clients that cannot hold a socket open.
pub async fn queue_state(State(state): State<SharedState>) -> Json<QueueStateView> {
    Json(events::queue_state_view(&state).await)
}

#[utoipa::path(
    delete,
    path = "/queue/tickets/{id}",
    tag = "queue",
    params(("id" = u64, Path, description = "Number of the ticket to withdraw")),
    responses(
        (status = 200, description = "Ticket cancelled", body = TicketView),
        (status = 404, description = "No such ticket"),
        (status = 409, description = "Ticket already called or finished")
    )
)]
/// Withdraw a waiting ticket, e.g. when a customer leaves before being called.
pub async fn cancel_ticket(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
) -> Result<Json<TicketView>, AppError> {
    let ticket = state
        .queue()
        .lock()
        .await
        .cancel_ticket(id)
        .map_err(ServiceError::from)?;
    state.mark_dirty().await;
    events::broadcast_queue_state(&state).await;
    Ok(Json(ticket.into()))
}

/// Configure the queue routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/queue", get(queue_state))
        .route("/queue/tickets/{id}", delete(cancel_ticket))
}
