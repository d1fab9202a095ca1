//! Fire-and-forget delivery of page views and events.
//!
//! Tracking never fails its caller: every send issues at most one request,
//! and any error is logged at `warn` and dropped. There is no retry, queue
//! or batching here.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use folio_core::{
    event::{EventPayload, TrackPayload},
    privacy::short_session,
};

use crate::{
    config::TrackerConfig,
    page::PageContext,
    session::{get_or_create_session_id, is_tracking_available},
};

pub const TRACK_PATH: &str = "/api/stats/track";
pub const EVENT_PATH: &str = "/api/stats/event";
pub const CONTACT_PATH: &str = "/api/contact/submit";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("server responded with status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One JSON POST to the API. Returns the response body, or `Value::Null`
/// when the body is not JSON.
#[async_trait]
pub trait Delivery: Send + Sync + 'static {
    async fn post_json(&self, path: &str, body: Value) -> Result<Value, TransportError>;
}

/// [`Delivery`] over HTTP with `reqwest`.
pub struct HttpDelivery {
    client: reqwest::Client,
    config: TrackerConfig,
}

impl HttpDelivery {
    pub fn new(config: &TrackerConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Network(format!("client build failed: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl Delivery for HttpDelivery {
    async fn post_json(&self, path: &str, body: Value) -> Result<Value, TransportError> {
        let url = self
            .config
            .endpoint(path)
            .map_err(|e| TransportError::Network(format!("invalid path {path}: {e}")))?;
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        Ok(response.json::<Value>().await.unwrap_or(Value::Null))
    }
}

/// Caller overrides merged over the page's base payload. Set fields win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitFields {
    pub page_url: Option<String>,
    pub page_title: Option<String>,
    pub referrer: Option<String>,
    pub time_on_page: Option<u32>,
    pub scroll_depth: Option<u32>,
}

/// Sends tracking payloads for one page.
///
/// Without a [`PageContext`] (server-side rendering) or with the sentinel
/// session id every operation is a no-op that issues zero requests.
#[derive(Clone)]
pub struct Transport {
    delivery: Arc<dyn Delivery>,
    context: Option<Arc<PageContext>>,
}

impl Transport {
    pub fn new(delivery: Arc<dyn Delivery>, context: Option<PageContext>) -> Self {
        Self {
            delivery,
            context: context.map(Arc::new),
        }
    }

    pub fn context(&self) -> Option<&PageContext> {
        self.context.as_deref()
    }

    pub(crate) fn delivery(&self) -> Arc<dyn Delivery> {
        Arc::clone(&self.delivery)
    }

    /// The tab's session id, or `None` when tracking is unavailable.
    pub fn session_id(&self) -> Option<String> {
        let storage = self.context.as_ref().map(|c| c.storage.as_ref());
        let id = get_or_create_session_id(storage);
        is_tracking_available(&id).then_some(id)
    }

    /// The payload `send_page_view` would post, after overrides.
    pub fn page_view_payload(&self, extra: VisitFields) -> Option<TrackPayload> {
        let context = self.context.as_ref()?;
        let session_id = self.session_id()?;
        let page = &context.page;

        let mut payload = TrackPayload {
            session_id,
            page_url: page.path.clone(),
            page_title: Some(page.title.clone()).filter(|t| !t.is_empty()),
            referrer: Some(page.referrer.clone()).filter(|r| !r.is_empty()),
            screen_width: Some(page.screen_width).filter(|w| *w > 0),
            screen_height: Some(page.screen_height).filter(|h| *h > 0),
            ..TrackPayload::default()
        };
        if let Some(url) = extra.page_url {
            payload.page_url = url;
        }
        if extra.page_title.is_some() {
            payload.page_title = extra.page_title;
        }
        if extra.referrer.is_some() {
            payload.referrer = extra.referrer;
        }
        if extra.time_on_page.is_some() {
            payload.time_on_page = extra.time_on_page;
        }
        if extra.scroll_depth.is_some() {
            payload.scroll_depth = extra.scroll_depth;
        }
        Some(payload)
    }

    pub async fn send_page_view(&self, extra: VisitFields) {
        let Some(payload) = self.page_view_payload(extra) else {
            return;
        };
        let session = payload.session_id.clone();
        self.post_swallowing(TRACK_PATH, &payload, &session).await;
    }

    pub async fn send_event(&self, event_type: &str, event_data: Map<String, Value>) {
        let Some(context) = self.context.as_ref() else {
            return;
        };
        let Some(session_id) = self.session_id() else {
            return;
        };
        let payload = EventPayload {
            session_id,
            event_type: event_type.to_string(),
            event_data,
            page_url: context.page.path.clone(),
        };
        let session = payload.session_id.clone();
        self.post_swallowing(EVENT_PATH, &payload, &session).await;
    }

    /// Spawn [`Self::send_page_view`] and return immediately.
    pub fn track_page_view(&self, extra: VisitFields) -> Option<JoinHandle<()>> {
        self.session_id()?;
        let this = self.clone();
        spawn_detached(async move { this.send_page_view(extra).await })
    }

    /// Spawn [`Self::send_event`] and return immediately.
    pub fn track_event(
        &self,
        event_type: &str,
        event_data: Map<String, Value>,
    ) -> Option<JoinHandle<()>> {
        self.session_id()?;
        let this = self.clone();
        let event_type = event_type.to_string();
        spawn_detached(async move { this.send_event(&event_type, event_data).await })
    }

    async fn post_swallowing<T: Serialize>(&self, path: &str, payload: &T, session: &str) {
        let result = match serde_json::to_value(payload) {
            Ok(body) => self.delivery.post_json(path, body).await.map(|_| ()),
            Err(e) => Err(TransportError::from(e)),
        };
        match result {
            Ok(()) => debug!(path, session = short_session(session), "Tracking payload sent"),
            Err(e) => warn!(path, session = short_session(session), error = %e, "Tracking failed"),
        }
    }
}

/// `tokio::spawn` when a runtime is available; tracking is skipped otherwise.
pub(crate) fn spawn_detached<F>(future: F) -> Option<JoinHandle<()>>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => Some(handle.spawn(future)),
        Err(_) => {
            warn!("No async runtime; tracking call skipped");
            None
        }
    }
}
