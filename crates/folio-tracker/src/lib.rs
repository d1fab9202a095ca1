//! Client side of the folio stats pipeline.
//!
//! A [`Tracker`] is created per page. It assigns the tab a session id, sends
//! the page view and custom events, measures engagement until the page goes
//! away, and submits the contact form. Tracking calls never surface errors
//! to the caller; the contact form does.

pub mod config;
pub mod contact;
pub mod engagement;
pub mod flush;
pub mod page;
pub mod session;
pub mod transport;

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::task::JoinHandle;

use crate::{
    config::TrackerConfig,
    contact::ContactClient,
    engagement::EngagementSession,
    flush::{select_flush_strategy, BeaconQueue},
    page::PageContext,
    transport::{Delivery, HttpDelivery, Transport, TransportError, VisitFields},
};

pub struct Tracker {
    transport: Transport,
    beacon: Option<BeaconQueue>,
}

impl Tracker {
    /// `context` is `None` when rendering server-side; every call is then a
    /// no-op. The beacon worker is started when the page supports beacons.
    pub fn new(delivery: Arc<dyn Delivery>, context: Option<PageContext>) -> Self {
        let beacon_capable = context
            .as_ref()
            .is_some_and(|c| c.capabilities.beacon);
        let beacon = if beacon_capable {
            BeaconQueue::spawn(Arc::clone(&delivery)).map(|(queue, _worker)| queue)
        } else {
            None
        };
        Self {
            transport: Transport::new(delivery, context),
            beacon,
        }
    }

    /// HTTP-backed tracker for `config.api_url`.
    pub fn http(config: &TrackerConfig, context: Option<PageContext>) -> Result<Self, TransportError> {
        let delivery = HttpDelivery::new(config)?;
        Ok(Self::new(Arc::new(delivery), context))
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn session_id(&self) -> Option<String> {
        self.transport.session_id()
    }

    pub fn track_page_view(&self, extra: VisitFields) -> Option<JoinHandle<()>> {
        self.transport.track_page_view(extra)
    }

    pub fn track_event(
        &self,
        event_type: &str,
        event_data: Map<String, Value>,
    ) -> Option<JoinHandle<()>> {
        self.transport.track_event(event_type, event_data)
    }

    /// Start measuring engagement for the current page.
    ///
    /// `None` without a browser context or a usable session id.
    pub fn setup_page_engagement(&self) -> Option<EngagementSession> {
        let context = self.transport.context()?;
        let session_id = self.transport.session_id()?;
        let flush =
            select_flush_strategy(context.capabilities, self.beacon.as_ref(), &self.transport);
        Some(EngagementSession::start(
            session_id,
            context.page.path.clone(),
            flush,
        ))
    }

    /// Contact client that records a `contact_form_submit` event on success.
    pub fn contact_client(&self) -> ContactClient {
        ContactClient::new(self.transport.delivery()).with_tracker(self.transport.clone())
    }
}
