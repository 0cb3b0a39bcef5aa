/// Paced public announcement scheduler.
pub mod announcer;
/// OpenAPI documentation generation.
pub mod documentation;
/// Fan-out helpers for queue events.
pub mod events;
/// Session liveness sweeping.
pub mod heartbeat;
/// Health check service.
pub mod health_service;
/// Debounced snapshot persistence coordinator.
pub mod persistence;
/// WebSocket connection and command handling.
pub mod session_service;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
