use std::sync::Arc;

use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{metrics, routes, state::AppState};

/// CORS for the site origins in `FOLIO_CORS_ORIGINS`; `*` (or an empty
/// list) allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(values)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Construct the Axum [`Router`] with all routes and middleware attached.
///
/// Middleware is applied in outer-to-inner order (outermost runs first on
/// request, last on response):
///
/// 1. `CorsLayer`: the static site calls the API cross-origin.
/// 2. `TraceLayer`: structured request/response logging via `tracing`,
///    unless `FOLIO_REQUEST_LOGGING=false`.
/// 3. `track_requests`: Prometheus counters per matched route, a no-op
///    when `FOLIO_ENABLE_METRICS=false`.
pub fn build_app(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route("/", get(routes::health::root))
        .route("/health", get(routes::health::health))
        .route("/api/health", get(routes::health::api_health))
        .route("/api/stats/track", post(routes::stats::track_visit))
        .route("/api/stats/event", post(routes::stats::track_event))
        .route("/api/stats/summary", get(routes::stats::get_summary))
        .route("/api/stats/daily", get(routes::stats::get_daily_visits))
        .route("/api/stats/pages", get(routes::stats::get_popular_pages))
        .route("/api/stats/sources", get(routes::stats::get_traffic_sources))
        .route("/api/stats/health", get(routes::stats::stats_health))
        .route("/api/contact/submit", post(routes::contact::submit_contact))
        .route("/api/contact/health", get(routes::contact::contact_health))
        .route("/metrics", get(metrics::metrics_handler))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            metrics::track_requests,
        ));

    let router = if state.config.request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };

    router
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
