//! Route configuration for the metrics listener.

use crate::metrics::metrics_handler;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use valdash_store::RollupStore;

/// Create the router serving `/metrics` and `/health`.
pub fn create_router(store: Arc<dyn RollupStore>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

/// GET /health - Checks rollup database connectivity.
///
/// Unauthenticated, for liveness checks. Returns only status, backend and version.
pub async fn health_check(State(store): State<Arc<dyn RollupStore>>) -> (StatusCode, Json<Value>) {
    match store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "backend": store.backend(),
                "version": env!("CARGO_PKG_VERSION"),
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Rollup database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unavailable",
                    "backend": store.backend(),
                    "version": env!("CARGO_PKG_VERSION"),
                })),
            )
        }
    }
}
