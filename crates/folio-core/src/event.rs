use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, ValidationError};

/// Well-known custom event types. The set is open: any non-empty string is
/// accepted by the ingestion endpoint.
pub mod event_types {
    pub const PROJECT_CLICK: &str = "project_click";
    pub const RESUME_DOWNLOAD: &str = "resume_download";
    pub const CONTACT_FORM_SUBMIT: &str = "contact_form_submit";
    pub const BLOG_POST_VIEW: &str = "blog_post_view";
    pub const EXTERNAL_LINK_CLICK: &str = "external_link_click";
    pub const SOCIAL_CLICK: &str = "social_click";
}

/// Upper bound of the scroll-depth percentage.
pub const MAX_SCROLL_DEPTH: u32 = 100;

/// The payload the client sends to `POST /api/stats/track`.
///
/// Used both for the initial page view and for engagement flushes; a flush
/// carries only `session_id`, `page_url`, `time_on_page` and `scroll_depth`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackPayload {
    pub session_id: String,
    pub page_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_height: Option<u32>,
    /// Seconds spent on the page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_on_page: Option<u32>,
    /// High-water mark of the scroll position, percent of document height.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_depth: Option<u32>,
}

impl TrackPayload {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.session_id.trim().is_empty() {
            return Err(ValidationError::new("session_id", "session_id is required"));
        }
        if self.page_url.trim().is_empty() {
            return Err(ValidationError::new("page_url", "page_url is required"));
        }
        if let Some(depth) = self.scroll_depth {
            if depth > MAX_SCROLL_DEPTH {
                return Err(ValidationError::new(
                    "scroll_depth",
                    format!("scroll_depth must be between 0 and {MAX_SCROLL_DEPTH}"),
                ));
            }
        }
        Ok(())
    }
}

/// The payload the client sends to `POST /api/stats/event`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    pub session_id: String,
    pub event_type: String,
    #[serde(default)]
    pub event_data: serde_json::Map<String, serde_json::Value>,
    pub page_url: String,
}

impl EventPayload {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.session_id.trim().is_empty() {
            return Err(ValidationError::new("session_id", "session_id is required"));
        }
        if self.event_type.trim().is_empty() {
            return Err(ValidationError::new("event_type", "event_type is required"));
        }
        if self.page_url.trim().is_empty() {
            return Err(ValidationError::new("page_url", "page_url is required"));
        }
        Ok(())
    }
}

/// Response body of both stats ingest routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackResponse {
    pub message: String,
    pub tracked: bool,
}

/// Device classification derived from the User-Agent at ingest time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
    Bot,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Desktop => "desktop",
            DeviceType::Bot => "bot",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mobile" => Ok(DeviceType::Mobile),
            "tablet" => Ok(DeviceType::Tablet),
            "desktop" => Ok(DeviceType::Desktop),
            "bot" => Ok(DeviceType::Bot),
            other => Err(ValidationError::new(
                "device_type",
                format!("unknown device type '{other}'"),
            )),
        }
    }
}

/// One page-load observation, mirrors the `visits` table columns.
///
/// Never updated after creation: an engagement flush for the same page load
/// is stored as another row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub id: String,
    pub session_id: String,
    /// Truncated sha256 of the client IP, see [`crate::privacy::hash_ip`].
    pub ip_hash: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub user_agent: Option<String>,
    pub device_type: DeviceType,
    pub browser: Option<String>,
    pub browser_version: Option<String>,
    pub os: Option<String>,
    pub os_version: Option<String>,
    pub screen_width: Option<u32>,
    pub screen_height: Option<u32>,
    pub page_url: String,
    pub page_title: Option<String>,
    pub referrer: Option<String>,
    pub time_on_page: Option<u32>,
    pub scroll_depth: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// One discrete interaction, mirrors the `events` table columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub session_id: String,
    pub event_type: String,
    /// Serialized JSON object. The client sends a map; it is stringified
    /// before storage.
    pub event_data: String,
    pub page_url: String,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn from_payload(payload: EventPayload, created_at: DateTime<Utc>) -> Result<Self, CoreError> {
        payload.validate()?;
        let event_data = serde_json::to_string(&payload.event_data)?;
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: payload.session_id,
            event_type: payload.event_type,
            event_data,
            page_url: payload.page_url,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn track_payload_rejects_scroll_depth_over_100() {
        let payload = TrackPayload {
            session_id: "s1".to_string(),
            page_url: "/".to_string(),
            scroll_depth: Some(150),
            ..Default::default()
        };
        let err = payload.validate().unwrap_err();
        assert_eq!(err.field, "scroll_depth");
    }

    #[test]
    fn track_payload_accepts_boundary_scroll_depth() {
        let payload = TrackPayload {
            session_id: "s1".to_string(),
            page_url: "/".to_string(),
            scroll_depth: Some(100),
            ..Default::default()
        };
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn track_payload_requires_session_id() {
        let payload = TrackPayload {
            session_id: "  ".to_string(),
            page_url: "/".to_string(),
            ..Default::default()
        };
        assert_eq!(payload.validate().unwrap_err().field, "session_id");
    }

    #[test]
    fn engagement_flush_serializes_only_present_fields() {
        let payload = TrackPayload {
            session_id: "s1".to_string(),
            page_url: "/blog".to_string(),
            time_on_page: Some(12),
            scroll_depth: Some(40),
            ..Default::default()
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({
                "session_id": "s1",
                "page_url": "/blog",
                "time_on_page": 12,
                "scroll_depth": 40
            })
        );
    }

    #[test]
    fn event_payload_defaults_event_data_to_empty_object() {
        let payload: EventPayload = serde_json::from_value(json!({
            "session_id": "s1",
            "event_type": "project_click",
            "page_url": "/projects"
        }))
        .unwrap();
        assert!(payload.event_data.is_empty());

        let event = Event::from_payload(payload, Utc::now()).unwrap();
        assert_eq!(event.event_data, "{}");
    }

    #[test]
    fn event_from_payload_rejects_missing_type() {
        let payload = EventPayload {
            session_id: "s1".to_string(),
            page_url: "/".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            Event::from_payload(payload, Utc::now()),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn device_type_parses_known_values_only() {
        assert_eq!("tablet".parse::<DeviceType>().unwrap(), DeviceType::Tablet);
        assert!("watch".parse::<DeviceType>().is_err());
        assert_eq!(DeviceType::Bot.to_string(), "bot");
    }
}
