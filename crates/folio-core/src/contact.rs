use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const NAME_MAX_CHARS: usize = 100;
pub const SUBJECT_MAX_CHARS: usize = 200;
pub const MESSAGE_MIN_CHARS: usize = 10;
pub const MESSAGE_MAX_CHARS: usize = 5000;

/// Stored in place of a missing subject.
pub const DEFAULT_SUBJECT: &str = "No subject";

/// The payload the contact form sends to `POST /api/contact/submit`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactPayload {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
}

impl ContactPayload {
    /// Validate lengths and email shape. Lengths count characters, not bytes.
    ///
    /// Shared by the form client (before any request is issued) and the
    /// ingestion endpoint.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name_len = self.name.trim().chars().count();
        if name_len == 0 {
            return Err(ValidationError::new("name", "Please enter your name"));
        }
        if name_len > NAME_MAX_CHARS {
            return Err(ValidationError::new(
                "name",
                format!("Name must be at most {NAME_MAX_CHARS} characters"),
            ));
        }
        if self.email.trim().is_empty() {
            return Err(ValidationError::new("email", "Please enter your email"));
        }
        if !is_valid_email(&self.email) {
            return Err(ValidationError::new(
                "email",
                "Please enter a valid email address",
            ));
        }
        if let Some(subject) = &self.subject {
            if subject.chars().count() > SUBJECT_MAX_CHARS {
                return Err(ValidationError::new(
                    "subject",
                    format!("Subject must be at most {SUBJECT_MAX_CHARS} characters"),
                ));
            }
        }
        let message_len = self.message.chars().count();
        if message_len < MESSAGE_MIN_CHARS {
            return Err(ValidationError::new(
                "message",
                format!("Message must be at least {MESSAGE_MIN_CHARS} characters"),
            ));
        }
        if message_len > MESSAGE_MAX_CHARS {
            return Err(ValidationError::new(
                "message",
                format!("Message must be at most {MESSAGE_MAX_CHARS} characters"),
            ));
        }
        Ok(())
    }
}

pub fn is_valid_email(target: &str) -> bool {
    let trimmed = target.trim();
    let Some((local, domain)) = trimmed.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Response body of `POST /api/contact/submit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactResponse {
    pub success: bool,
    pub message: String,
    pub id: Option<String>,
}

/// Lifecycle of a contact message. Only `New` is written by ingestion; the
/// other states are set by an administrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    #[default]
    New,
    Read,
    Replied,
    Archived,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::New => "new",
            ContactStatus::Read => "read",
            ContactStatus::Replied => "replied",
            ContactStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mirrors the `contact_messages` table columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactMessage {
    pub id: String,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    /// Raw submitter IP, kept for spam prevention.
    pub ip_address: String,
    pub status: ContactStatus,
    pub created_at: DateTime<Utc>,
}

impl ContactMessage {
    pub fn from_payload(
        payload: ContactPayload,
        ip_address: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        let subject = payload
            .subject
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: payload.name.trim().to_string(),
            email: payload.email.trim().to_string(),
            subject,
            message: payload.message,
            ip_address,
            status: ContactStatus::New,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(message: &str) -> ContactPayload {
        ContactPayload {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            subject: None,
            message: message.to_string(),
        }
    }

    #[test]
    fn message_of_nine_chars_is_rejected() {
        let err = payload("123456789").validate().unwrap_err();
        assert_eq!(err.field, "message");
    }

    #[test]
    fn message_of_ten_chars_is_accepted() {
        assert!(payload("1234567890").validate().is_ok());
    }

    #[test]
    fn message_length_counts_characters() {
        // 10 characters, 20 bytes.
        assert!(payload("éééééééééé").validate().is_ok());
        assert!(payload(&"x".repeat(MESSAGE_MAX_CHARS + 1)).validate().is_err());
    }

    #[test]
    fn missing_email_is_rejected() {
        let mut p = payload("hello there, world");
        p.email = String::new();
        assert_eq!(p.validate().unwrap_err().field, "email");
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("a@b.io"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.io"));
        assert!(!is_valid_email("a@.io"));
        assert!(!is_valid_email("a@b@c.io"));
    }

    #[test]
    fn blank_subject_falls_back_to_default() {
        let mut p = payload("hello there, world");
        p.subject = Some("   ".to_string());
        let msg = ContactMessage::from_payload(p, "1.2.3.4".to_string(), Utc::now());
        assert_eq!(msg.subject, DEFAULT_SUBJECT);
        assert_eq!(msg.status, ContactStatus::New);
    }
}
