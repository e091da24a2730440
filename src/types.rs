//! Inbound event types
//!
//! Mirrors the Pub/Sub message shape GKE cluster notifications arrive in.
//! Envelope fields use camelCase on the wire, attribute keys are snake_case
//! as GKE publishes them.

use crate::error::{NotifyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribute holding the GKE cluster name
pub const ATTR_CLUSTER_NAME: &str = "cluster_name";
/// Attribute holding the cluster zone or region
pub const ATTR_CLUSTER_LOCATION: &str = "cluster_location";
/// Attribute holding the numeric project id
pub const ATTR_PROJECT_ID: &str = "project_id";
/// Attribute holding the notification type URL
pub const ATTR_TYPE_URL: &str = "type_url";
/// Attribute holding the JSON-encoded notification payload
pub const ATTR_PAYLOAD: &str = "payload";

/// A cluster notification as delivered by Pub/Sub
///
/// Push envelopes spell the id and publish time both ways
/// (`messageId` and `message_id`); background-function payloads only use
/// the snake_case form. Either is accepted, camelCase wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawNotificationEvent")]
pub struct NotificationEvent {
    /// Protobuf type marker (`type.googleapis.com/google.pubsub.v1.PubsubMessage`)
    #[serde(rename = "@type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,

    /// Base64-encoded human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    /// String attributes set by GKE
    #[serde(default)]
    pub attributes: HashMap<String, String>,

    /// Pub/Sub message id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    /// RFC 3339 publish timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNotificationEvent {
    #[serde(rename = "@type", default)]
    type_name: Option<String>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    attributes: HashMap<String, String>,
    #[serde(default)]
    message_id: Option<String>,
    #[serde(rename = "message_id", default)]
    message_id_snake: Option<String>,
    #[serde(default)]
    publish_time: Option<String>,
    #[serde(rename = "publish_time", default)]
    publish_time_snake: Option<String>,
}

impl From<RawNotificationEvent> for NotificationEvent {
    fn from(raw: RawNotificationEvent) -> Self {
        Self {
            type_name: raw.type_name,
            data: raw.data,
            attributes: raw.attributes,
            message_id: raw.message_id.or(raw.message_id_snake),
            publish_time: raw.publish_time.or(raw.publish_time_snake),
        }
    }
}

impl NotificationEvent {
    /// Look up a required attribute
    pub fn attribute(&self, key: &str) -> Result<&str> {
        self.attributes
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| NotifyError::MissingField(format!("attributes.{}", key)))
    }

    /// Parse the `payload` attribute as a JSON object
    pub fn payload(&self) -> Result<NotificationPayload> {
        let raw = self.attribute(ATTR_PAYLOAD)?;
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| NotifyError::malformed("attributes.payload", e))?;
        match value {
            serde_json::Value::Object(fields) => Ok(NotificationPayload { fields }),
            other => Err(NotifyError::malformed(
                "attributes.payload",
                format!("expected a JSON object, got {}", other),
            )),
        }
    }

    /// Add an attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the base64 `data` field
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }
}

/// Decoded `payload` attribute
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    fields: serde_json::Map<String, serde_json::Value>,
}

impl NotificationPayload {
    /// Read a required payload field as display text
    ///
    /// Strings are returned verbatim, other scalars as their JSON text.
    pub fn field(&self, key: &str) -> Result<String> {
        match self.fields.get(key) {
            None | Some(serde_json::Value::Null) => {
                Err(NotifyError::MissingField(format!("payload.{}", key)))
            }
            Some(serde_json::Value::String(s)) => Ok(s.clone()),
            Some(other) => Ok(other.to_string()),
        }
    }
}

/// Metadata about one handler invocation, used for logging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext {
    /// Triggering message id
    pub event_id: String,

    /// Publish timestamp of the triggering message
    pub timestamp: String,
}

impl InvocationContext {
    /// Create a context with explicit values
    pub fn new(event_id: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Derive a context from the envelope fields of an event
    ///
    /// Falls back to `"unknown"` and the current time when the event
    /// carries no id or publish time.
    pub fn from_event(event: &NotificationEvent) -> Self {
        Self {
            event_id: event
                .message_id
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            timestamp: event
                .publish_time
                .clone()
                .unwrap_or_else(|| chrono::Utc::now().to_rfc3339()),
        }
    }
}
