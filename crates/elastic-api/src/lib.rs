//! elastic-api — HTTP front end of the worker service.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/hello` | Run one unit of synthetic work on a pool worker |
//! | GET | `/status` | Autoscaler status snapshot |
//! | GET | `/metrics` | Prometheus exposition |

pub mod handlers;
pub mod prometheus;

use axum::Router;
use axum::routing::get;
use tokio::sync::watch;

use elastic_autoscale::AutoscalerStatus;
use elastic_worker::WorkerPool;

pub use prometheus::render_prometheus;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub pool: WorkerPool,
    pub status: watch::Receiver<AutoscalerStatus>,
}

/// Build the complete API router.
pub fn build_router(pool: WorkerPool, status: watch::Receiver<AutoscalerStatus>) -> Router {
    let state = ApiState { pool, status };

    Router::new()
        .route("/hello", get(handlers::hello))
        .route("/status", get(handlers::status))
        .route("/metrics", get(handlers::prometheus_metrics))
        .with_state(state)
}
