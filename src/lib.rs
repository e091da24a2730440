//! # gke-notify
//!
//! Relays GKE cluster upgrade notifications from Pub/Sub to a Slack
//! incoming webhook.
//!
//! ## Overview
//!
//! GKE publishes cluster notifications (an upgrade has started, a new
//! version is available) to a Pub/Sub topic. `gke-notify` turns each one
//! into a Slack attachment message and posts it to a webhook whose URL is
//! kept in Secret Manager.
//!
//! ## Quick Start
//!
//! ```rust
//! use gke_notify::{interpret, Interpretation, NotificationEvent};
//!
//! let event = NotificationEvent::default()
//!     .with_attribute("cluster_name", "sandbox-gke-cluster")
//!     .with_attribute("cluster_location", "europe-west2")
//!     .with_attribute("project_id", "4325342324")
//!     .with_attribute("type_url", "type.googleapis.com/google.container.v1beta1.UpgradeAvailableEvent")
//!     .with_attribute("payload", r#"{"resourceType":"MASTER","version":"1.22.6-gke.300","releaseChannel":"REGULAR"}"#)
//!     .with_data("TmV3IHZlcnNpb24gYXZhaWxhYmxl");
//!
//! match interpret(&event, "#gke-notifications")? {
//!     Interpretation::Message(message) => assert_eq!(message.attachments[0].color, "#4F7942"),
//!     Interpretation::Skip(reason) => println!("skipped: {}", reason),
//! }
//! # Ok::<(), gke_notify::NotifyError>(())
//! ```
//!
//! ## Architecture
//!
//! - **interpret** — pure event → message mapping
//! - **Dispatcher** — secret lookup, delivery, outcome classification
//! - **SecretStore** / **WebhookSender** — seams for Secret Manager and HTTP
//! - **server** — Pub/Sub push endpoint

pub mod config;
pub mod dispatch;
pub mod error;
pub mod interpret;
pub mod logging;
pub mod message;
pub mod secrets;
pub mod server;
pub mod types;
pub mod webhook;

pub use config::NotifierConfig;
pub use dispatch::{Dispatcher, FailureKind, Outcome};
pub use error::{NotifyError, Result};
pub use interpret::{interpret, Interpretation, NotificationKind, SkipReason};
pub use message::{Attachment, Field, NotificationMessage};
pub use secrets::{MemorySecretStore, SecretManagerClient, SecretRef, SecretStore};
pub use types::{InvocationContext, NotificationEvent};
pub use webhook::{HttpWebhookSender, MemoryWebhookSender, WebhookResponse, WebhookSender};
