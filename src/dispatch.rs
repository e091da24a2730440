//! Delivery dispatcher
//!
//! Runs one invocation end to end: fetch the webhook secret, interpret the
//! event, post the message and classify the response. Failures never
//! escape as errors; each invocation ends in an `Outcome`.

use crate::config::NotifierConfig;
use crate::error::{NotifyError, Result};
use crate::interpret::{interpret, Interpretation, SkipReason};
use crate::secrets::{SecretManagerClient, SecretRef, SecretStore};
use crate::types::{InvocationContext, NotificationEvent};
use crate::webhook::{HttpWebhookSender, WebhookResponse, WebhookSender};
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;

/// Category of a failed invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Required field absent or undecodable
    MalformedEvent,
    /// Webhook secret could not be read
    SecretUnavailable,
    /// Webhook unreachable or answered with a non-200 status
    DeliveryFailure,
}

impl From<&NotifyError> for FailureKind {
    fn from(err: &NotifyError) -> Self {
        match err {
            e if e.is_malformed_event() => Self::MalformedEvent,
            NotifyError::SecretUnavailable { .. } => Self::SecretUnavailable,
            _ => Self::DeliveryFailure,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedEvent => write!(f, "malformed_event"),
            Self::SecretUnavailable => write!(f, "secret_unavailable"),
            Self::DeliveryFailure => write!(f, "delivery_failure"),
        }
    }
}

/// How an invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The webhook accepted the message
    Delivered(WebhookResponse),
    /// Nothing was sent
    Skipped(SkipReason),
    /// The invocation failed; details were logged
    Failed { kind: FailureKind, detail: String },
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Relays notification events to the configured webhook
pub struct Dispatcher {
    config: NotifierConfig,
    secrets: Arc<dyn SecretStore>,
    sender: Arc<dyn WebhookSender>,
}

impl Dispatcher {
    /// Create a dispatcher from explicit collaborators
    pub fn new(
        config: NotifierConfig,
        secrets: Arc<dyn SecretStore>,
        sender: Arc<dyn WebhookSender>,
    ) -> Self {
        Self {
            config,
            secrets,
            sender,
        }
    }

    /// Create a dispatcher backed by Secret Manager and a real HTTP client
    pub fn from_config(config: NotifierConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;
        let secrets = Arc::new(SecretManagerClient::new(client.clone()));
        let sender = Arc::new(HttpWebhookSender::new(client));
        Ok(Self::new(config, secrets, sender))
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    /// Handle one event
    pub async fn handle(&self, event: &NotificationEvent, ctx: &InvocationContext) -> Outcome {
        let span = tracing::info_span!("invocation", event_id = %ctx.event_id);
        async {
            tracing::info!(
                event_id = %ctx.event_id,
                timestamp = %ctx.timestamp,
                "Invocation triggered"
            );

            match self.try_handle(event).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let kind = FailureKind::from(&e);
                    tracing::error!(
                        event = %raw_event(event),
                        kind = %kind,
                        error = %e,
                        "Failed to process the GKE upgrade event"
                    );
                    Outcome::Failed {
                        kind,
                        detail: e.to_string(),
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn try_handle(&self, event: &NotificationEvent) -> Result<Outcome> {
        let secret = SecretRef::new(
            &self.config.project_id,
            &self.config.slack_secret_name,
            &self.config.secret_version,
        );
        let webhook_url = self.secrets.access(&secret).await?;
        tracing::info!(
            store = %self.secrets.name(),
            secret = %secret.resource_name(),
            "Webhook secret resolved"
        );

        tracing::info!(event = %raw_event(event), "Event received, processing");

        let message = match interpret(event, &self.config.slack_notification_channel)? {
            Interpretation::Message(message) => message,
            Interpretation::Skip(reason) => {
                tracing::info!(reason = %reason, "Event skipped, nothing delivered");
                return Ok(Outcome::Skipped(reason));
            }
        };

        let response = self.sender.post(&webhook_url, &message).await?;
        if !response.is_delivered() {
            tracing::error!(
                status = response.status,
                body = %response.body,
                "Failed to send the notification to Slack"
            );
            return Err(NotifyError::Delivery {
                status: response.status,
                body: response.body,
            });
        }

        tracing::info!(
            channel = %message.channel,
            "GKE upgrade notification delivered"
        );
        Ok(Outcome::Delivered(response))
    }
}

fn raw_event(event: &NotificationEvent) -> String {
    serde_json::to_string(event).unwrap_or_else(|_| format!("{:?}", event))
}
