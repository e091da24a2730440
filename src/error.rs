//! Error types for gke-notify

use thiserror::Error;

/// Errors that can occur while relaying a notification
#[derive(Debug, Error)]
pub enum NotifyError {
    /// A required attribute or payload field is absent
    #[error("Missing required field '{0}'")]
    MissingField(String),

    /// A field is present but cannot be decoded
    #[error("Malformed field '{field}': {reason}")]
    MalformedField {
        field: String,
        reason: String,
    },

    /// Secret store lookup failed
    #[error("Secret '{name}' unavailable: {reason}")]
    SecretUnavailable {
        name: String,
        reason: String,
    },

    /// Webhook answered with anything other than 200
    #[error("Webhook returned HTTP {status}: {body}")]
    Delivery {
        status: u16,
        body: String,
    },

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl NotifyError {
    /// Shorthand for a malformed field error
    pub fn malformed(field: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedField {
            field: field.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors caused by the inbound event itself
    pub fn is_malformed_event(&self) -> bool {
        matches!(self, Self::MissingField(_) | Self::MalformedField { .. })
    }
}

impl From<envy::Error> for NotifyError {
    fn from(e: envy::Error) -> Self {
        NotifyError::Config(e.to_string())
    }
}

/// Result type alias for notifier operations
pub type Result<T> = std::result::Result<T, NotifyError>;
