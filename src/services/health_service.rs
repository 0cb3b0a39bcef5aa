use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping the snapshot store and fold the result into a health payload.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let store_ok = match state.require_snapshot_store().await {
        Ok(store) => match store.health_check().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "snapshot store health check failed");
                false
            }
        },
        Err(_) => {
            warn!("snapshot store unavailable (degraded mode)");
            false
        }
    };

    if state.is_degraded() || !store_ok {
        HealthResponse::degraded(store_ok)
    } else {
        HealthResponse::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::{
        config::AppConfig, dao::snapshot_store::JsonSnapshotStore, state::AppState,
    };

    #[tokio::test]
    async fn reports_degraded_until_a_store_is_installed() {
        let (state, _announcements) = AppState::new(AppConfig::default());
        let health = health_status(&state).await;
        assert_eq!(health.status, "degraded");
        assert!(!health.snapshot_store_ok);

        let dir = tempfile::tempdir().unwrap();
        let store = JsonSnapshotStore::open(dir.path().join("queue-state.json"))
            .await
            .unwrap();
        state.install_snapshot_store(Arc::new(store)).await;
        let health = health_status(&state).await;
        assert_eq!(health.status, "ok");
        assert!(health.snapshot_store_ok);
    }
}
