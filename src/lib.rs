//! Real-time direct-message chat backend.
//!
//! Users register and log in over REST; the session token travels in a
//! `token` cookie. Each browser tab opens a WebSocket which is authenticated
//! from that cookie on connect. The server keeps every open socket in an
//! in-memory [`presence::Hub`], broadcasts `{"online": [...]}` whenever the
//! set of sockets changes, and pushes stored messages to every socket owned
//! by the recipient.
//!
//! # Liveness
//! Each socket is pinged every `HEARTBEAT_INTERVAL_MS`. A socket that does
//! not answer with a pong within `HEARTBEAT_TIMEOUT_MS` is terminated and
//! dropped from presence. See [`heartbeat`].
//!
//! # Attachments
//! A chat frame may carry `{"file": {"name", "data"}}` where `data` is a
//! base64 data URL. The file is written to `UPLOADS_DIR` as
//! `<unix-millis>.<ext>` and served back under `/uploads/`.

use std::net::SocketAddr;

use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod heartbeat;
pub mod models;
pub mod presence;
pub mod routes;
pub mod state;
pub mod uploads;
pub mod ws;

use config::Config;
use error::AppError;
use state::AppState;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}

pub async fn run(config: Config) -> Result<(), AppError> {
    info!("Initializing state...");
    tokio::fs::create_dir_all(&config.uploads_dir)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to create uploads dir: {e}")))?;

    let port = config.port;
    let state = AppState::new(config).await?;
    let routes = routes::routes(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let (bound, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(addr, shutdown_signal())
        .map_err(|e| AppError::InternalError(format!("Failed to bind {addr}: {e}")))?;

    info!("Chat server running on http://{bound}");
    info!("WebSocket endpoint: ws://{bound}/");
    server.await;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
