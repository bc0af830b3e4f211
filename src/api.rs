use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::engine::Monitor;
use crate::error::MonitorError;
use crate::models::HostStatusView;
use crate::store::NewHost;

/// Runs a fresh cycle over the stored hosts.
pub async fn get_status(State(monitor): State<Arc<Monitor>>) -> Result<Json<Vec<HostStatusView>>, ApiError> {
    let batch = monitor.run_configured_cycle().await?;
    Ok(Json(batch.iter().map(HostStatusView::from).collect()))
}

/// Last batch from the scheduler, without probing anything.
pub async fn get_stats(State(monitor): State<Arc<Monitor>>) -> Json<Vec<HostStatusView>> {
    let state = monitor.state.lock().await;
    Json(state.last_batch.iter().map(HostStatusView::from).collect())
}

pub async fn add_server(
    State(monitor): State<Arc<Monitor>>,
    payload: Result<Json<NewHost>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(new) = payload?;
    let host = monitor.store().add(new).await?;
    Ok(Json(json!({ "success": true, "id": host.id })))
}

pub async fn delete_server(
    State(monitor): State<Arc<Monitor>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    monitor.store().delete(id).await?;
    Ok(Json(json!({ "success": true })))
}

/// Every failure a handler can produce, rendered as `{ "error": ... }`.
pub enum ApiError {
    Monitor(MonitorError),
    /// Body or path the extractors could not decode.
    Rejected(StatusCode, String),
}

impl From<MonitorError> for ApiError {
    fn from(e: MonitorError) -> Self {
        ApiError::Monitor(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Rejected(status, message) => (status, message),
            ApiError::Monitor(MonitorError::InvalidHost(msg)) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Monitor(MonitorError::HostNotFound(_)) => (StatusCode::NOT_FOUND, "Server not found".to_string()),
            ApiError::Monitor(e @ MonitorError::DuplicateHost { .. }) => (StatusCode::CONFLICT, e.to_string()),
            ApiError::Monitor(other) => {
                error!(error = %other, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn create_router(monitor: Arc<Monitor>, public_dir: &std::path::Path) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/stats", get(get_stats))
        .route("/api/add", post(add_server))
        .route("/api/server/{id}", delete(delete_server))
        .fallback_service(ServeDir::new(public_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(monitor)
}

pub async fn start_server(bind_address: &str, port: u16, app: Router) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind((bind_address, port)).await?;
    info!("Dashboard: http://localhost:{}", listener.local_addr()?.port());
    axum::serve(listener, app).await
}
