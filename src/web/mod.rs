//! HTTP surface: router, server loop and background session cleanup.

pub mod error;
pub mod handlers;
pub mod session;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, signal, task::JoinHandle};
use tower_http::trace::TraceLayer;

use crate::utils::error::Result;
use handlers::{account, admin, booking};
pub use state::AppState;

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/services", get(booking::list_services))
        .route("/api/staff", get(booking::list_staff))
        .route("/auth/session", post(account::login))
        .route("/auth/logout", post(account::logout))
        .route("/booking/selection", get(booking::current_selection))
        .route("/booking/services", post(booking::select_services))
        .route("/booking/staff", post(booking::select_staff))
        .route("/api/availability", get(booking::availability))
        .route("/booking/confirm", post(booking::confirm))
        .route("/api/appointments", get(account::appointments))
        .route(
            "/api/appointments/{id}/cancel",
            post(account::cancel_appointment),
        )
        .route("/admin/appointments", get(admin::appointments))
        .route("/admin/pages/preview", post(admin::page_preview))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 定期清除過期的 session
pub fn spawn_session_purger(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            let purged = state.sessions.purge_expired().await;
            if purged > 0 {
                tracing::debug!("Purged {} expired sessions", purged);
            }
        }
    })
}

/// Bind the configured address and serve until ctrl-c or SIGTERM.
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let address = state.config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    tracing::info!("🚀 Listening on {}", listener.local_addr()?);

    serve_on(listener, state).await
}

pub async fn serve_on(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    let purger = spawn_session_purger(state.clone());

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    purger.abort();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received ctrl-c, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
