//! How an engagement payload leaves the page.
//!
//! Two strategies exist. [`BeaconFlush`] hands the payload to a
//! [`BeaconQueue`], whose worker is detached from the page session and keeps
//! delivering after the page is gone. [`AsyncFlush`] issues an ordinary
//! page-view request owned by the page session; dropping the session aborts
//! whatever is still in flight, and that loss is accepted.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

use folio_core::privacy::short_session;

use crate::{
    page::Capabilities,
    transport::{spawn_detached, Delivery, Transport, VisitFields, TRACK_PATH},
};

/// Body of an engagement flush, posted to `/api/stats/track`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngagementPayload {
    pub session_id: String,
    pub page_url: String,
    /// Whole seconds since the page session started.
    pub time_on_page: u32,
    /// Scroll high-water mark, percent.
    pub scroll_depth: u32,
}

pub trait FlushStrategy: Send + Sync {
    /// Fire and forget. Must not block and must not fail the caller.
    fn flush(&self, payload: EngagementPayload);
}

/// Detached delivery worker for teardown-safe sends.
///
/// Cloned handles share one worker. The worker exits once every handle is
/// dropped and the queue is drained.
#[derive(Clone)]
pub struct BeaconQueue {
    tx: mpsc::UnboundedSender<EngagementPayload>,
}

impl BeaconQueue {
    /// Spawns the worker on the current runtime; `None` without one.
    pub fn spawn(delivery: Arc<dyn Delivery>) -> Option<(Self, JoinHandle<()>)> {
        let (tx, mut rx) = mpsc::unbounded_channel::<EngagementPayload>();
        let worker = spawn_detached(async move {
            while let Some(payload) = rx.recv().await {
                let session = payload.session_id.clone();
                let body = match serde_json::to_value(&payload) {
                    Ok(body) => body,
                    Err(e) => {
                        warn!(error = %e, "Beacon payload could not be encoded");
                        continue;
                    }
                };
                match delivery.post_json(TRACK_PATH, body).await {
                    Ok(_) => debug!(session = short_session(&session), "Beacon delivered"),
                    Err(e) => warn!(
                        session = short_session(&session),
                        error = %e,
                        "Beacon delivery failed"
                    ),
                }
            }
        })?;
        Some((Self { tx }, worker))
    }

    /// `false` only when the worker is gone.
    pub fn enqueue(&self, payload: EngagementPayload) -> bool {
        self.tx.send(payload).is_ok()
    }
}

pub struct BeaconFlush {
    queue: BeaconQueue,
}

impl BeaconFlush {
    pub fn new(queue: BeaconQueue) -> Self {
        Self { queue }
    }
}

impl FlushStrategy for BeaconFlush {
    fn flush(&self, payload: EngagementPayload) {
        if !self.queue.enqueue(payload) {
            warn!("Beacon worker stopped; engagement payload dropped");
        }
    }
}

/// Ordinary async page-view request, aborted if still pending when the
/// strategy is dropped.
pub struct AsyncFlush {
    transport: Transport,
    in_flight: Mutex<JoinSet<()>>,
}

impl AsyncFlush {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            in_flight: Mutex::new(JoinSet::new()),
        }
    }

    /// Requests spawned and not yet finished.
    pub fn pending(&self) -> usize {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        while set.try_join_next().is_some() {}
        set.len()
    }
}

impl FlushStrategy for AsyncFlush {
    fn flush(&self, payload: EngagementPayload) {
        if tokio::runtime::Handle::try_current().is_err() {
            warn!("No async runtime; engagement payload dropped");
            return;
        }
        let transport = self.transport.clone();
        let fields = VisitFields {
            page_url: Some(payload.page_url),
            time_on_page: Some(payload.time_on_page),
            scroll_depth: Some(payload.scroll_depth),
            ..VisitFields::default()
        };
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        while set.try_join_next().is_some() {}
        set.spawn(async move { transport.send_page_view(fields).await });
    }
}

/// Beacon when the page supports it and a queue is running, async otherwise.
pub fn select_flush_strategy(
    capabilities: Capabilities,
    beacon: Option<&BeaconQueue>,
    transport: &Transport,
) -> Box<dyn FlushStrategy> {
    match beacon {
        Some(queue) if capabilities.beacon => Box::new(BeaconFlush::new(queue.clone())),
        _ => Box::new(AsyncFlush::new(transport.clone())),
    }
}
