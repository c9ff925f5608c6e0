//! HTTP API for the config provider.
//!
//! `GET /config` serves the current configuration, `POST /config` publishes a
//! new one (credential required), `GET /config/versions[/:version]` exposes
//! retained history and `GET /health` is an unauthenticated liveness probe.

use crate::config::Configuration;
use crate::error::TetherError;
use crate::provider::auth::AccessGuard;
use crate::provider::store::ConfigStore;
use axum::{
    extract::{Path, State},
    http::{header::WWW_AUTHENTICATE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Shared state for the config API
#[derive(Clone)]
pub struct ServerState {
    pub store: Arc<ConfigStore>,
    pub guard: Arc<AccessGuard>,
    /// Require a credential on reads as well as writes
    pub protect_reads: bool,
}

/// Errors surfaced by handlers
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    NotFound(String),
    Rejected(TetherError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                [(WWW_AUTHENTICATE, AccessGuard::challenge())],
                Json(json!({"kind": "unauthorized", "error": "Authentication required"})),
            )
                .into_response(),
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                Json(json!({"kind": "not_found", "error": msg})),
            )
                .into_response(),
            ApiError::Rejected(err) => {
                let status = match &err {
                    TetherError::Validation(_) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (
                    status,
                    Json(json!({"kind": err.kind(), "error": err.to_string()})),
                )
                    .into_response()
            }
        }
    }
}

/// Body of `GET /config/versions`
#[derive(Debug, Serialize)]
pub struct VersionsResponse {
    pub current: u64,
    pub versions: Vec<u64>,
}

/// Body of `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: u64,
}

impl ServerState {
    fn check_read(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        if self.protect_reads {
            self.check_write(headers)
        } else {
            Ok(())
        }
    }

    fn check_write(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        if self.guard.authorize(headers) {
            Ok(())
        } else {
            Err(ApiError::Unauthorized)
        }
    }
}

async fn handle_get_config(
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> Result<Json<Configuration>, ApiError> {
    state.check_read(&headers)?;
    Ok(Json(state.store.get_config().as_ref().clone()))
}

async fn handle_set_config(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Configuration>, ApiError> {
    if let Err(e) = state.check_write(&headers) {
        warn!("Rejected unauthenticated configuration update");
        return Err(e);
    }

    let value: serde_json::Value = serde_json::from_slice(&body).map_err(|e| {
        ApiError::Rejected(crate::error::ValidationError::Malformed(e.to_string()).into())
    })?;

    match state.store.set_config(value) {
        Ok(published) => {
            info!(version = published.version, "Configuration updated");
            Ok(Json(published.as_ref().clone()))
        }
        Err(e) => {
            warn!(kind = e.kind(), error = %e, "Configuration update rejected");
            Err(ApiError::Rejected(e))
        }
    }
}

async fn handle_versions(
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> Result<Json<VersionsResponse>, ApiError> {
    state.check_read(&headers)?;
    Ok(Json(VersionsResponse {
        current: state.store.get_config().version,
        versions: state.store.versions(),
    }))
}

async fn handle_get_version(
    State(state): State<ServerState>,
    Path(version): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<Configuration>, ApiError> {
    state.check_read(&headers)?;
    state
        .store
        .get_version(version)
        .map(|c| Json(c.as_ref().clone()))
        .ok_or_else(|| ApiError::NotFound(format!("version {} is not retained", version)))
}

async fn handle_health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: state.store.get_config().version,
    })
}

/// Build the config API router
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/config", get(handle_get_config).post(handle_set_config))
        .route("/config/versions", get(handle_versions))
        .route("/config/versions/:version", get(handle_get_version))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Serve the config API on `addr` until `shutdown` resolves.
///
/// In-flight requests complete before this returns.
pub async fn serve<F>(state: ServerState, addr: SocketAddr, shutdown: F) -> crate::error::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Config server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Config server stopped");
    Ok(())
}
