use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use folio_core::{
    event::{Event, EventPayload, TrackPayload, TrackResponse, Visit},
    privacy::{hash_ip, short_session},
    store::{SUMMARY_MAX_DAYS, SUMMARY_MIN_DAYS},
};

use crate::{
    enrich::{extract_client_ip, parse_user_agent, resolve_geo, MaybeConnectInfo},
    error::AppError,
    state::AppState,
};

fn track_response(message: &str, tracked: bool) -> Json<TrackResponse> {
    Json(TrackResponse {
        message: message.to_string(),
        tracked,
    })
}

/// `POST /api/stats/track`: record a page view or an engagement flush.
///
/// ## Enrichment
/// - `ip_hash`: `sha256(ip)[0..8]` → 16 hex chars; the raw IP is discarded.
/// - `country`, `city`: CDN headers, then GeoIP via `maxminddb` if loaded.
/// - `browser`, `browser_version`, `os`, `os_version`, `device_type`: UA
///   parsing via `woothee`.
///
/// ## Response
/// `200 OK` with `{ "message", "tracked" }`. Bot traffic and store failures
/// answer `tracked: false`; the client never retries.
#[tracing::instrument(skip_all)]
pub async fn track_visit(
    State(state): State<Arc<AppState>>,
    maybe_connect_info: MaybeConnectInfo,
    headers: HeaderMap,
    payload: Result<Json<TrackPayload>, JsonRejection>,
) -> Result<Json<TrackResponse>, AppError> {
    let client_ip = extract_client_ip(&headers, maybe_connect_info.0);
    if !state.check_rate_limit(&client_ip).await {
        return Err(AppError::RateLimited);
    }

    let Json(payload) = payload?;

    payload.validate()?;

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let ua_info = parse_user_agent(&user_agent);

    if ua_info.is_bot() {
        info!(
            bot_type = ua_info.browser.as_deref().unwrap_or("unknown"),
            page = %payload.page_url,
            "Bot visit skipped"
        );
        return Ok(track_response("Bot visit logged", false));
    }

    let geo = resolve_geo(&headers, state.geoip.as_deref(), &client_ip);

    let visit = Visit {
        id: uuid::Uuid::new_v4().to_string(),
        session_id: payload.session_id,
        ip_hash: hash_ip(&client_ip),
        country: geo.country,
        city: geo.city,
        user_agent: (!user_agent.is_empty()).then_some(user_agent),
        device_type: ua_info.device_type,
        browser: ua_info.browser,
        browser_version: ua_info.browser_version,
        os: ua_info.os,
        os_version: ua_info.os_version,
        screen_width: payload.screen_width,
        screen_height: payload.screen_height,
        page_url: payload.page_url,
        page_title: payload.page_title,
        referrer: payload.referrer.filter(|r| !r.is_empty()),
        time_on_page: payload.time_on_page,
        scroll_depth: payload.scroll_depth,
        created_at: Utc::now(),
    };

    match state.store.insert_visit(&visit).await {
        Ok(()) => {
            info!(
                page = %visit.page_url,
                device = %visit.device_type,
                browser = visit.browser.as_deref().unwrap_or("unknown"),
                country = visit.country.as_deref().unwrap_or("unknown"),
                session = short_session(&visit.session_id),
                "Visit tracked"
            );
            Ok(track_response("Visit tracked successfully", true))
        }
        Err(e) => {
            error!(error = %e, page = %visit.page_url, "Visit tracking failed");
            Ok(track_response("Visit tracking failed", false))
        }
    }
}

/// `POST /api/stats/event`: record a custom interaction.
#[tracing::instrument(skip_all)]
pub async fn track_event(
    State(state): State<Arc<AppState>>,
    maybe_connect_info: MaybeConnectInfo,
    headers: HeaderMap,
    payload: Result<Json<EventPayload>, JsonRejection>,
) -> Result<Json<TrackResponse>, AppError> {
    let client_ip = extract_client_ip(&headers, maybe_connect_info.0);
    if !state.check_rate_limit(&client_ip).await {
        return Err(AppError::RateLimited);
    }

    let Json(payload) = payload?;

    let event = Event::from_payload(payload, Utc::now())?;

    match state.store.insert_event(&event).await {
        Ok(()) => {
            info!(
                event_type = %event.event_type,
                page = %event.page_url,
                session = short_session(&event.session_id),
                "Event tracked"
            );
            Ok(track_response("Event tracked successfully", true))
        }
        Err(e) => {
            error!(error = %e, event_type = %event.event_type, "Event tracking failed");
            Ok(track_response("Event tracking failed", false))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub days: Option<u32>,
}

/// `GET /api/stats/summary?days=N`: aggregates over the trailing window.
///
/// `days` defaults to 30 and must lie in `1..=365`.
#[tracing::instrument(skip(state))]
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SummaryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let days = query.days.unwrap_or(30);
    if !(SUMMARY_MIN_DAYS..=SUMMARY_MAX_DAYS).contains(&days) {
        return Err(AppError::BadRequest(format!(
            "days must be between {SUMMARY_MIN_DAYS} and {SUMMARY_MAX_DAYS}"
        )));
    }

    let summary = state.store.get_summary(days).await?;
    info!(days, total_visits = summary.total_visits, "Summary generated");
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    pub limit: Option<usize>,
}

impl ViewQuery {
    fn limit_or(&self, default: usize) -> usize {
        self.limit.unwrap_or(default).clamp(1, 365)
    }
}

/// `GET /api/stats/daily`: rows of the `daily_visits` view, newest first.
pub async fn get_daily_visits(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ViewQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rows = state.store.daily_visits(query.limit_or(30)).await?;
    Ok(Json(json!({ "data": rows })))
}

/// `GET /api/stats/pages`: rows of the `popular_pages` view.
pub async fn get_popular_pages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ViewQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rows = state.store.popular_pages(query.limit_or(20)).await?;
    Ok(Json(json!({ "data": rows })))
}

/// `GET /api/stats/sources`: rows of the `traffic_sources` view.
pub async fn get_traffic_sources(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ViewQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rows = state.store.traffic_sources(query.limit_or(20)).await?;
    Ok(Json(json!({ "data": rows })))
}

/// `GET /api/stats/health`: stats service health.
pub async fn stats_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store_ok = state.store.ping().await.is_ok();
    Json(json!({
        "status": if store_ok { "healthy" } else { "degraded" },
        "service": "stats",
        "store": if store_ok { "ok" } else { "unreachable" }
    }))
}
