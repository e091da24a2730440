//! Webhook secret lookup
//!
//! `SecretStore` abstracts where the webhook URL comes from. The Secret
//! Manager client is used in production; the memory store backs local runs
//! and tests.

use crate::error::{NotifyError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::RwLock;

/// Default Secret Manager REST endpoint
pub const SECRET_MANAGER_API: &str = "https://secretmanager.googleapis.com";

/// Default GCE metadata server
pub const METADATA_SERVER: &str = "http://metadata.google.internal";

/// Fully-qualified reference to one secret version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretRef {
    pub project_id: String,
    pub secret_name: String,
    pub version: String,
}

impl SecretRef {
    pub fn new(
        project_id: impl Into<String>,
        secret_name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            secret_name: secret_name.into(),
            version: version.into(),
        }
    }

    /// Resource name, `projects/{p}/secrets/{s}/versions/{v}`
    pub fn resource_name(&self) -> String {
        format!(
            "projects/{}/secrets/{}/versions/{}",
            self.project_id, self.secret_name, self.version
        )
    }

    fn unavailable(&self, reason: impl ToString) -> NotifyError {
        NotifyError::SecretUnavailable {
            name: self.resource_name(),
            reason: reason.to_string(),
        }
    }
}

/// Read-only secret lookup
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the UTF-8 value of a secret version
    async fn access(&self, secret: &SecretRef) -> Result<String>;

    /// Store name for logging (e.g. "secret-manager", "memory")
    fn name(&self) -> &str;
}

/// Google Secret Manager over REST, authenticated via the metadata server
pub struct SecretManagerClient {
    client: reqwest::Client,
    api_base: String,
    metadata_base: String,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    data: String,
}

impl SecretManagerClient {
    /// Create a client against the public API and the GCE metadata server
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_endpoints(client, SECRET_MANAGER_API, METADATA_SERVER)
    }

    /// Create a client against custom endpoints
    pub fn with_endpoints(
        client: reqwest::Client,
        api_base: impl Into<String>,
        metadata_base: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            metadata_base: metadata_base.into().trim_end_matches('/').to_string(),
        }
    }

    async fn access_token(&self, secret: &SecretRef) -> Result<String> {
        let url = format!(
            "{}/computeMetadata/v1/instance/service-accounts/default/token",
            self.metadata_base
        );

        let response = self
            .client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| secret.unavailable(format!("metadata server unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(secret.unavailable(format!(
                "metadata server returned {}: {}",
                status, body
            )));
        }

        let token: AccessTokenResponse = response
            .json()
            .await
            .map_err(|e| secret.unavailable(format!("invalid token response: {}", e)))?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl SecretStore for SecretManagerClient {
    async fn access(&self, secret: &SecretRef) -> Result<String> {
        let token = self.access_token(secret).await?;
        let url = format!("{}/v1/{}:access", self.api_base, secret.resource_name());

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| secret.unavailable(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(secret.unavailable(format!(
                "Secret Manager returned {}: {}",
                status, body
            )));
        }

        let version: AccessSecretVersionResponse = response
            .json()
            .await
            .map_err(|e| secret.unavailable(format!("invalid response: {}", e)))?;

        let bytes = BASE64
            .decode(version.payload.data)
            .map_err(|e| secret.unavailable(format!("payload is not base64: {}", e)))?;
        let value = String::from_utf8(bytes)
            .map_err(|e| secret.unavailable(format!("payload is not UTF-8: {}", e)))?;

        tracing::debug!(secret = %secret.resource_name(), "Secret accessed");
        Ok(value)
    }

    fn name(&self) -> &str {
        "secret-manager"
    }
}

/// In-memory secret store for local runs and tests
///
/// Secrets are matched by project and name; the version is ignored.
#[derive(Default)]
pub struct MemorySecretStore {
    secrets: RwLock<HashMap<(String, String), String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a secret value
    pub fn insert(
        &self,
        project_id: impl Into<String>,
        secret_name: impl Into<String>,
        value: impl Into<String>,
    ) {
        let mut secrets = self.secrets.write().unwrap_or_else(|e| e.into_inner());
        secrets.insert((project_id.into(), secret_name.into()), value.into());
    }

    /// Builder-style `insert`
    pub fn with_secret(
        self,
        project_id: impl Into<String>,
        secret_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.insert(project_id, secret_name, value);
        self
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn access(&self, secret: &SecretRef) -> Result<String> {
        let secrets = self.secrets.read().unwrap_or_else(|e| e.into_inner());
        secrets
            .get(&(secret.project_id.clone(), secret.secret_name.clone()))
            .cloned()
            .ok_or_else(|| secret.unavailable("not found"))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
