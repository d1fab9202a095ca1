use thiserror::Error;

/// A payload failed boundary validation.
///
/// `field` names the offending wire field so callers can surface it next to
/// the right form input (client side) or in the `error.field` slot of the
/// JSON error body (server side).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
