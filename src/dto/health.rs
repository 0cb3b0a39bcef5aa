use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by `/healthcheck`.
///
/// `degraded` means the in-memory queue keeps serving but nothing is being
/// persisted, so a restart would lose state.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall status ("ok" or "degraded").
    pub status: String,
    /// Whether the snapshot store is currently accepting writes.
    pub snapshot_store_ok: bool,
}

impl HealthResponse {
    /// Queue serving and snapshot writes flowing.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            snapshot_store_ok: true,
        }
    }

    /// Queue serving from memory only.
    pub fn degraded(snapshot_store_ok: bool) -> Self {
        Self {
            status: "degraded".to_string(),
            snapshot_store_ok,
        }
    }
}
