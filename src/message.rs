//! Outbound chat message
//!
//! Slack incoming-webhook payload using the legacy `attachments` layout:
//! one colored attachment holding a list of title/value fields.

use serde::{Deserialize, Serialize};

/// Display name the message is posted under
pub const SENDER_NAME: &str = "GKE Notifications";

/// Emoji shortcode used as the sender avatar
pub const SENDER_ICON: &str = ":kubernetes:";

/// A rendered notification ready to be posted to a webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// Sender display name
    pub username: String,

    /// Sender avatar emoji
    pub icon_emoji: String,

    /// Destination channel (e.g. `#gke-notifications`)
    pub channel: String,

    /// Colored field groups
    pub attachments: Vec<Attachment>,
}

impl NotificationMessage {
    /// Create a message with the fixed sender identity and one attachment
    pub fn new(channel: impl Into<String>, attachment: Attachment) -> Self {
        Self {
            username: SENDER_NAME.to_string(),
            icon_emoji: SENDER_ICON.to_string(),
            channel: channel.into(),
            attachments: vec![attachment],
        }
    }

    /// Fields of the first attachment
    pub fn fields(&self) -> &[Field] {
        self.attachments
            .first()
            .map(|a| a.fields.as_slice())
            .unwrap_or_default()
    }

    /// Value of the first field with the given title
    pub fn field_value(&self, title: &str) -> Option<&str> {
        self.fields()
            .iter()
            .find(|f| f.title == title)
            .and_then(|f| f.value.as_deref())
    }

    /// Serialize to the JSON body posted to the webhook
    pub fn to_body(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// A colored block of fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Hex accent color, e.g. `#9733EE`
    pub color: String,

    pub fields: Vec<Field>,
}

impl Attachment {
    pub fn new(color: impl Into<String>) -> Self {
        Self {
            color: color.into(),
            fields: Vec::new(),
        }
    }

    /// Append a heading field (title only)
    pub fn heading(mut self, title: impl Into<String>) -> Self {
        self.fields.push(Field {
            title: title.into(),
            value: None,
            short: false,
        });
        self
    }

    /// Append a full-width title/value field
    pub fn field(mut self, title: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(Field {
            title: title.into(),
            value: Some(value.into()),
            short: false,
        });
        self
    }
}

/// One labeled entry of an attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Side-by-side rendering hint; always full width here
    #[serde(default)]
    pub short: bool,
}
