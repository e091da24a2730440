//! Runtime configuration loaded from the environment

use crate::error::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Fallbacks for runs that post to an explicit webhook URL
///
/// The project and secret name only key the in-memory secret then, so
/// they need not name real resources.
pub const LOCAL_DEFAULTS: &[(&str, &str)] = &[
    ("PROJECT_ID", "local"),
    ("SLACK_SECRET_NAME", "webhook-url"),
    ("SLACK_NOTIFICATION_CHANNEL", "#gke-notifications"),
];

/// Settings for one notifier process
///
/// Loaded once at startup from environment variables with matching
/// upper-case names (`PROJECT_ID`, `SLACK_SECRET_NAME`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    /// Project that owns the webhook secret
    pub project_id: String,

    /// Secret Manager secret holding the webhook URL
    pub slack_secret_name: String,

    /// Channel messages are posted to
    pub slack_notification_channel: String,

    /// Secret version to read
    #[serde(default = "default_secret_version")]
    pub secret_version: String,

    /// Emit JSON logs for Cloud Logging instead of plain text
    #[serde(default)]
    pub cloud_logging_enabled: bool,

    /// Timeout for outbound HTTP calls, in seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Report failed invocations to the push host so it redelivers
    #[serde(default)]
    pub redeliver_on_failure: bool,
}

fn default_secret_version() -> String {
    "latest".to_string()
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl NotifierConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Ok(envy::from_env::<Self>()?)
    }

    /// Load from an explicit set of variables
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::from_iter::<_, Self>(vars)?)
    }

    /// Load from the process environment, filling unset variables from `defaults`
    pub fn from_env_with_defaults(defaults: &[(&str, &str)]) -> Result<Self> {
        Self::from_vars_with_defaults(std::env::vars(), defaults)
    }

    /// Load from `vars`, filling unset variables from `defaults`
    pub fn from_vars_with_defaults<I>(vars: I, defaults: &[(&str, &str)]) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut merged: HashMap<String, String> = defaults
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        merged.extend(vars);
        Self::from_vars(merged)
    }

    /// Build a config with defaults for the optional settings
    pub fn new(
        project_id: impl Into<String>,
        slack_secret_name: impl Into<String>,
        slack_notification_channel: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            slack_secret_name: slack_secret_name.into(),
            slack_notification_channel: slack_notification_channel.into(),
            secret_version: default_secret_version(),
            cloud_logging_enabled: false,
            http_timeout_secs: default_http_timeout_secs(),
            redeliver_on_failure: false,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
