//! Status endpoint for the bot.
//!
//! `GET /status` reports state, cached version and degraded mode.
//! `GET /health` answers 200 once a configuration is cached and the loop
//! is running (degraded included), 503 otherwise.

use crate::bot::process::{Bot, BotStatus};
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

async fn handle_status(State(bot): State<Arc<Bot>>) -> Json<BotStatus> {
    Json(bot.status())
}

async fn handle_health(State(bot): State<Arc<Bot>>) -> (StatusCode, Json<BotStatus>) {
    let status = bot.status();
    let code = if status.state.is_operational() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

/// Build the status router
pub fn router(bot: Arc<Bot>) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/health", get(handle_health))
        .with_state(bot)
}

/// Serve the status endpoint until `shutdown` resolves
pub async fn serve<F>(bot: Arc<Bot>, addr: SocketAddr, shutdown: F) -> crate::error::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Bot status endpoint listening");

    axum::serve(listener, router(bot))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
