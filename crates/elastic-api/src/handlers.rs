//! Route handlers.

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use tracing::debug;

use elastic_worker::WorkerError;

use crate::ApiState;

#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(err: &WorkerError) -> impl IntoResponse {
    let status = match err {
        WorkerError::NoWorkers | WorkerError::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
        WorkerError::QueueClosed | WorkerError::Abandoned => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
}

/// GET /hello
pub async fn hello(State(state): State<ApiState>) -> impl IntoResponse {
    match state.pool.submit().await {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            debug!(error = %e, "request rejected");
            error_response(&e).into_response()
        }
    }
}

/// GET /status
pub async fn status(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshot = state.status.borrow().clone();
    Json(snapshot)
}

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshot = state.status.borrow().clone();
    let body = crate::prometheus::render_prometheus(&snapshot, state.pool.worker_count());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}
