use base64::{Engine, prelude::BASE64_STANDARD};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::provider::base::{ConfigKey, ConfigProvider, ConfigProviderError};

const SECRET_MANAGER_BASE_URL: &str = "https://secretmanager.googleapis.com";

/// Metadata server endpoint returning an access token for the attached service account.
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

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

/// Provider reading the latest version of each key from Google Secret Manager.
///
/// The secret id equals [`ConfigKey::name`]. [`ConfigKey::GcpProjectId`] is answered from the
/// provider's own project without a request. Secrets that do not exist resolve to `None`.
#[derive(Debug)]
pub struct SecretManagerProvider {
    project_id: String,
    base_url: String,
    token_url: String,
    http: reqwest::Client,
    access_token: Mutex<Option<String>>,
}

impl SecretManagerProvider {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self::with_endpoints(project_id, SECRET_MANAGER_BASE_URL, METADATA_TOKEN_URL)
    }

    /// Creates a provider talking to custom endpoints, such as a local emulator.
    pub fn with_endpoints(
        project_id: impl Into<String>,
        base_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            base_url: base_url.into(),
            token_url: token_url.into(),
            http: reqwest::Client::new(),
            access_token: Mutex::new(None),
        }
    }

    fn secret_version_url(&self, key: ConfigKey) -> String {
        format!(
            "{}/v1/projects/{}/secrets/{}/versions/latest:access",
            self.base_url.trim_end_matches('/'),
            self.project_id,
            key.name()
        )
    }

    async fn access_token(&self) -> Result<String, ConfigProviderError> {
        let mut cached = self.access_token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let response = self
            .http
            .get(&self.token_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(ConfigProviderError::Token)?;
        let token: AccessTokenResponse =
            response.json().await.map_err(ConfigProviderError::Token)?;

        *cached = Some(token.access_token.clone());

        Ok(token.access_token)
    }
}

impl ConfigProvider for SecretManagerProvider {
    async fn get_secret(&self, key: ConfigKey) -> Result<Option<String>, ConfigProviderError> {
        if key == ConfigKey::GcpProjectId {
            return Ok(Some(self.project_id.clone()));
        }

        let token = self.access_token().await?;
        let response = self
            .http
            .get(self.secret_version_url(key))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|source| ConfigProviderError::Request { key, source })?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(%key, "secret not found, falling back to default");
            return Ok(None);
        }

        let body: AccessSecretVersionResponse = response
            .error_for_status()
            .map_err(|source| ConfigProviderError::Request { key, source })?
            .json()
            .await
            .map_err(|source| ConfigProviderError::Request { key, source })?;

        decode_payload(key, &body.payload.data).map(Some)
    }
}

/// Decodes the base64 payload of a secret version into a UTF-8 string.
fn decode_payload(key: ConfigKey, data: &str) -> Result<String, ConfigProviderError> {
    let bytes =
        BASE64_STANDARD
            .decode(data)
            .map_err(|err| ConfigProviderError::MalformedPayload {
                key,
                reason: err.to_string(),
            })?;

    String::from_utf8(bytes).map_err(|err| ConfigProviderError::MalformedPayload {
        key,
        reason: err.to_string(),
    })
}
