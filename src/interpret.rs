//! Event interpretation
//!
//! Turns a GKE cluster notification into a chat message. Pure apart from
//! an info log on skipped events; no I/O.

use crate::error::{NotifyError, Result};
use crate::message::{Attachment, NotificationMessage};
use crate::types::{
    NotificationEvent, ATTR_CLUSTER_LOCATION, ATTR_CLUSTER_NAME, ATTR_PROJECT_ID, ATTR_TYPE_URL,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::fmt;

/// Emoji appended to every message heading
const HEADING_EMOJI: &str = ":zap:";

/// GKE notification variants this relay understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// An upgrade operation has started
    Upgrade,
    /// A new version is available for the cluster
    UpgradeAvailable,
}

impl NotificationKind {
    /// Match a `type_url` such as
    /// `type.googleapis.com/google.container.v1beta1.UpgradeEvent`
    pub fn from_type_url(type_url: &str) -> Option<Self> {
        if type_url.contains("UpgradeEvent") {
            Some(Self::Upgrade)
        } else if type_url.contains("UpgradeAvailableEvent") {
            Some(Self::UpgradeAvailable)
        } else {
            None
        }
    }

    /// Heading shown as the first field
    pub fn heading(&self) -> &'static str {
        match self {
            Self::Upgrade => "GKE Cluster Upgrade Notification",
            Self::UpgradeAvailable => "GKE Cluster Upgrade Available Notification",
        }
    }

    /// Attachment accent color
    pub fn color(&self) -> &'static str {
        match self {
            Self::Upgrade => "#9733EE",
            Self::UpgradeAvailable => "#4F7942",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upgrade => write!(f, "UpgradeEvent"),
            Self::UpgradeAvailable => write!(f, "UpgradeAvailableEvent"),
        }
    }
}

/// Why an event produced no message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The event has no `data` field
    NoData,
    /// `type_url` names a notification this relay does not handle
    UnrecognizedType(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoData => write!(f, "event carries no data payload"),
            Self::UnrecognizedType(type_url) => write!(
                f,
                "type_url '{}' is neither UpgradeEvent nor UpgradeAvailableEvent",
                type_url
            ),
        }
    }
}

/// Result of interpreting one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpretation {
    /// A message should be delivered
    Message(NotificationMessage),
    /// Nothing to deliver
    Skip(SkipReason),
}

/// Render a notification event into a chat message for `channel`
///
/// Returns `Skip` for events without data or with an unknown type. Any
/// missing or undecodable field for the matched variant is an error.
pub fn interpret(event: &NotificationEvent, channel: &str) -> Result<Interpretation> {
    let Some(data) = event.data.as_deref() else {
        tracing::info!("No data in event, skipping");
        return Ok(Interpretation::Skip(SkipReason::NoData));
    };

    let cluster = event.attribute(ATTR_CLUSTER_NAME)?;
    let location = event.attribute(ATTR_CLUSTER_LOCATION)?;
    let project = event.attribute(ATTR_PROJECT_ID)?;
    let payload = event.payload()?;
    let resource_type = payload.field("resourceType")?;
    let details = decode_details(data)?;

    let type_url = event.attribute(ATTR_TYPE_URL)?;
    let Some(kind) = NotificationKind::from_type_url(type_url) else {
        tracing::info!(type_url = %type_url, "Event is neither UpgradeEvent nor UpgradeAvailableEvent, skipping");
        return Ok(Interpretation::Skip(SkipReason::UnrecognizedType(
            type_url.to_string(),
        )));
    };

    let attachment = Attachment::new(kind.color())
        .heading(format!("{} {}", kind.heading(), HEADING_EMOJI))
        .field("Project", project)
        .field("Cluster", cluster)
        .field("Location", location);

    let attachment = match kind {
        NotificationKind::Upgrade => {
            let current_version = payload.field("currentVersion")?;
            let target_version = payload.field("targetVersion")?;
            let start_time = payload.field("operationStartTime")?;
            attachment
                .field("Update Type", resource_type)
                .field("Current Version", current_version)
                .field("Target Version", target_version)
                .field("Start Time", start_time)
        }
        NotificationKind::UpgradeAvailable => {
            let version = payload.field("version")?;
            // Required but not rendered.
            let _release_channel = payload.field("releaseChannel")?;
            attachment
                .field("Eligible Resource", resource_type)
                .field("Eligible Version", version)
        }
    }
    .field("Details", details);

    Ok(Interpretation::Message(NotificationMessage::new(
        channel, attachment,
    )))
}

/// Decode the base64 `data` field into UTF-8 text
fn decode_details(data: &str) -> Result<String> {
    let bytes = BASE64
        .decode(data.trim())
        .map_err(|e| NotifyError::malformed("data", e))?;
    String::from_utf8(bytes).map_err(|e| NotifyError::malformed("data", e))
}
