use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use folio_core::contact::{ContactMessage, ContactPayload, ContactResponse};

use crate::{
    enrich::{extract_client_ip, MaybeConnectInfo},
    error::AppError,
    state::AppState,
};

pub const CONTACT_SUCCESS_MESSAGE: &str = "Thank you for your message! I'll get back to you soon.";

/// `POST /api/contact/submit`: store a contact-form message.
///
/// Validation mirrors the form client: name 1–100, a plausible email,
/// subject up to 200 and message 10–5000 characters. A store failure is a
/// 500 with the generic error body; the cause is only logged.
#[tracing::instrument(skip_all)]
pub async fn submit_contact(
    State(state): State<Arc<AppState>>,
    maybe_connect_info: MaybeConnectInfo,
    headers: HeaderMap,
    payload: Result<Json<ContactPayload>, JsonRejection>,
) -> Result<Json<ContactResponse>, AppError> {
    let client_ip = extract_client_ip(&headers, maybe_connect_info.0);
    if !state.check_rate_limit(&client_ip).await {
        return Err(AppError::RateLimited);
    }

    let Json(payload) = payload?;

    payload.validate()?;

    let has_subject = payload
        .subject
        .as_deref()
        .is_some_and(|s| !s.trim().is_empty());
    let message = ContactMessage::from_payload(payload, client_ip, Utc::now());
    let id = state.store.insert_contact_message(&message).await?;

    info!(
        id = %id,
        has_subject,
        message_length = message.message.chars().count(),
        "Contact message received"
    );

    Ok(Json(ContactResponse {
        success: true,
        message: CONTACT_SUCCESS_MESSAGE.to_string(),
        id: Some(id),
    }))
}

/// `GET /api/contact/health`: contact service health.
pub async fn contact_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store_ok = state.store.ping().await.is_ok();
    Json(json!({
        "status": if store_ok { "healthy" } else { "degraded" },
        "service": "contact",
        "store": if store_ok { "ok" } else { "unreachable" }
    }))
}
