//! Queue dispatch backend entrypoint wiring REST, WebSocket, SSE, and snapshot persistence.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use calldesk_back::{
    config::AppConfig,
    dao::snapshot_store::JsonSnapshotStore,
    routes,
    services::{announcer, heartbeat, persistence},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let port = config.port;
    let snapshot_path = config.snapshot_path.clone();
    let (state, announcements) = AppState::new(config);

    // Restore persisted queue state before accepting any connection, so the
    // first snapshot a screen sees is already the restored one.
    match JsonSnapshotStore::open(&snapshot_path).await {
        Ok(store) => {
            persistence::restore_and_install(&state, Arc::new(store)).await;
        }
        Err(err) => {
            // Degraded mode: serve from memory, nothing survives a restart.
            warn!(error = %err, path = %snapshot_path.display(), "snapshot store unavailable");
        }
    }

    tokio::spawn(announcer::run(state.clone(), announcements));
    tokio::spawn(heartbeat::run(state.clone()));
    tokio::spawn(persistence::run(state.clone()));

    let app = build_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    // Close the window between the last debounced write and process exit.
    persistence::flush_all(&state).await;

    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
