use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the queue dispatch backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::queue::queue_state,
        crate::routes::queue::cancel_ticket,
        crate::routes::sse::public_stream,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::queue::QueueStateView,
            crate::dto::queue::TicketView,
            crate::dto::queue::CounterView,
            crate::dto::queue::TicketStatusDto,
            crate::dto::queue::CounterStatusDto,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::dto::ws::AddTicketRequest,
            crate::dto::ws::CommandResult,
            crate::dto::sse::Handshake,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "queue", description = "Queue state snapshots"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "screens", description = "WebSocket operations for connected screens"),
    )
)]
pub struct ApiDoc;
