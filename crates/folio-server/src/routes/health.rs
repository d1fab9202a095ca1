use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::state::AppState;

/// `GET /`: banner with version and environment.
pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "message": "Portfolio API is running",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment.as_str()
    }))
}

/// `GET /health`: liveness check.
///
/// Returns `200 OK` when DuckDB is reachable and `503 Service Unavailable`
/// when it is not (file locked, disk full).
///
/// Response shape:
/// ```json
/// { "status": "ok", "version": "0.1.0" }
/// ```
#[tracing::instrument(skip(state))]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION")
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Health check: DuckDB unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "version": env!("CARGO_PKG_VERSION")
                })),
            )
                .into_response()
        }
    }
}

/// `GET /api/health`: detailed health for load balancers and monitoring.
#[tracing::instrument(skip(state))]
pub async fn api_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store_ok = state.store.ping().await.is_ok();
    let status = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if store_ok { "healthy" } else { "degraded" },
            "service": "portfolio-api",
            "version": env!("CARGO_PKG_VERSION"),
            "environment": state.config.environment.as_str(),
            "components": {
                "store": if store_ok { "ok" } else { "unreachable" },
                "geoip": if state.geoip.is_some() { "loaded" } else { "not_configured" },
                "metrics": if state.metrics.is_some() { "enabled" } else { "disabled" },
                "logging": if state.config.request_logging { "enabled" } else { "disabled" }
            }
        })),
    )
}
