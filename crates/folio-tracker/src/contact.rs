use std::sync::Arc;

use serde_json::Map;
use tracing::{info, warn};

use folio_core::{
    contact::{ContactPayload, ContactResponse},
    event::event_types,
};

use crate::transport::{Delivery, Transport, CONTACT_PATH};

/// Shown when the request fails for any reason other than local validation.
pub const GENERIC_FAILURE: &str =
    "Sorry, there was an error sending your message. Please try again later.";

/// Field values as typed into the form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl ContactForm {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn to_payload(&self) -> ContactPayload {
        ContactPayload {
            name: self.name.clone(),
            email: self.email.clone(),
            subject: Some(self.subject.clone()).filter(|s| !s.trim().is_empty()),
            message: self.message.clone(),
        }
    }
}

/// Toast-style outcome of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Success(String),
    Error(String),
}

pub struct ContactClient {
    delivery: Arc<dyn Delivery>,
    tracker: Option<Transport>,
}

impl ContactClient {
    pub fn new(delivery: Arc<dyn Delivery>) -> Self {
        Self {
            delivery,
            tracker: None,
        }
    }

    /// Record a `contact_form_submit` event after each successful submit.
    pub fn with_tracker(mut self, tracker: Transport) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Validate locally, then post. A failed validation issues no request.
    ///
    /// On success the form is cleared; on failure it is left as typed.
    pub async fn submit(&self, form: &mut ContactForm) -> Notification {
        let payload = form.to_payload();
        if let Err(e) = payload.validate() {
            return Notification::Error(e.message);
        }

        let body = match serde_json::to_value(&payload) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Contact payload could not be encoded");
                return Notification::Error(GENERIC_FAILURE.to_string());
            }
        };

        let response = match self.delivery.post_json(CONTACT_PATH, body).await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Contact submission failed");
                return Notification::Error(GENERIC_FAILURE.to_string());
            }
        };

        let parsed: Option<ContactResponse> = serde_json::from_value(response).ok();
        match parsed {
            Some(ContactResponse {
                success: true,
                message,
                ..
            }) => {
                info!("Contact message sent");
                form.clear();
                if let Some(tracker) = &self.tracker {
                    tracker.track_event(event_types::CONTACT_FORM_SUBMIT, Map::new());
                }
                Notification::Success(message)
            }
            _ => {
                warn!("Contact submission returned an unexpected response");
                Notification::Error(GENERIC_FAILURE.to_string())
            }
        }
    }
}
