//! Prometheus request metrics, scraped from `GET /metrics`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{MatchedPath, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

use crate::state::AppState;

/// Request counter and latency histogram, registered on a private registry.
pub struct HttpMetrics {
    registry: Registry,
    requests_total: IntCounterVec,
    request_duration: HistogramVec,
}

impl HttpMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let requests_total = IntCounterVec::new(
            Opts::new("portfolio_http_requests_total", "Total HTTP requests"),
            &["method", "endpoint", "status"],
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "portfolio_http_request_duration_seconds",
                "HTTP request duration in seconds",
            ),
            &["method", "endpoint"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        Ok(Self {
            registry,
            requests_total,
            request_duration,
        })
    }

    pub fn observe(&self, method: &str, endpoint: &str, status: StatusCode, elapsed: Duration) {
        self.requests_total
            .with_label_values(&[method, endpoint, status.as_str()])
            .inc();
        self.request_duration
            .with_label_values(&[method, endpoint])
            .observe(elapsed.as_secs_f64());
    }

    /// Current values in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Count and time every routed request.
///
/// The endpoint label is the route template (`/api/stats/track`), never the
/// raw request path.
pub async fn track_requests(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(metrics) = state.metrics.as_ref() else {
        return next.run(request).await;
    };
    let method = request.method().as_str().to_owned();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    let start = Instant::now();
    let response = next.run(request).await;
    metrics.observe(&method, &endpoint, response.status(), start.elapsed());
    response
}

/// `GET /metrics`: Prometheus scrape endpoint. `404` when metrics are off.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    let Some(metrics) = state.metrics.as_ref() else {
        return (StatusCode::NOT_FOUND, "Metrics disabled").into_response();
    };
    match metrics.encode() {
        Ok(body) => {
            let content_type = HeaderValue::from_str(TextEncoder::new().format_type())
                .unwrap_or_else(|_| HeaderValue::from_static("text/plain; version=0.0.4"));
            ([(header::CONTENT_TYPE, content_type)], body).into_response()
        }
        Err(err) => {
            error!(error = %err, "Failed to encode prometheus metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metric encode error").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_renders_counter_and_histogram() {
        let metrics = HttpMetrics::new().expect("registry");
        metrics.observe(
            "POST",
            "/api/stats/track",
            StatusCode::OK,
            Duration::from_millis(12),
        );
        metrics.observe(
            "POST",
            "/api/stats/track",
            StatusCode::OK,
            Duration::from_millis(30),
        );

        let text = metrics.encode().expect("encode");
        let sample = |name: &str| {
            text.lines()
                .find(|l| l.starts_with(&format!("{name}{{")) && l.contains(r#"endpoint="/api/stats/track""#))
                .map(str::to_owned)
        };
        let counter = sample("portfolio_http_requests_total").expect("counter sample");
        assert!(counter.contains(r#"status="200""#));
        assert!(counter.ends_with(" 2"));
        let count = sample("portfolio_http_request_duration_seconds_count").expect("histogram sample");
        assert!(count.ends_with(" 2"));
    }

    #[test]
    fn registries_are_independent() {
        let first = HttpMetrics::new().expect("registry");
        let second = HttpMetrics::new().expect("registry");
        first.observe("GET", "/health", StatusCode::OK, Duration::ZERO);
        assert!(!second.encode().expect("encode").contains("/health"));
    }
}
