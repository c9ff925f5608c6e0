//! HTTP Config Client
//!
//! Talks to the config provider's HTTP API with a bounded per-request timeout.

use crate::config::{BotSettings, Configuration, Credential};
use crate::error::{Result, TetherError, ValidationError};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;

/// HTTP client for the config provider
pub struct HttpConfigClient {
    /// Inner reqwest client
    client: Client,

    /// Absolute URL of `/config`
    config_url: Url,

    /// Credential attached to every request
    credential: Option<Credential>,
}

impl HttpConfigClient {
    /// Create a client for the provider at `base_url`
    pub fn new(base_url: &str, credential: Option<Credential>, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| TetherError::Config(format!("Invalid provider URL '{}': {}", base_url, e)))?;
        let config_url = base
            .join("config")
            .map_err(|e| TetherError::Config(format!("Invalid provider URL '{}': {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .pool_max_idle_per_host(2)
            .build()
            .map_err(|e| TetherError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config_url,
            credential,
        })
    }

    /// Create a client from the bot's bootstrap settings
    pub fn from_settings(settings: &BotSettings) -> Result<Self> {
        Self::new(
            &settings.provider_url,
            settings.credential.clone(),
            settings.fetch_timeout,
        )
    }

    /// URL this client fetches from
    pub fn config_url(&self) -> &Url {
        &self.config_url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credential {
            Some(Credential::Basic { username, password }) => {
                request.basic_auth(username, Some(password))
            }
            Some(Credential::Bearer(token)) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Fetch the current configuration
    pub async fn get_config(&self) -> Result<Configuration> {
        let response = self
            .authorize(self.client.get(self.config_url.clone()))
            .send()
            .await?;

        Self::read_configuration(response).await
    }

    /// Publish a new payload; returns the configuration the provider assigned
    pub async fn set_config(&self, payload: &Value) -> Result<Configuration> {
        let response = self
            .authorize(self.client.post(self.config_url.clone()))
            .json(payload)
            .send()
            .await?;

        Self::read_configuration(response).await
    }

    async fn read_configuration(response: reqwest::Response) -> Result<Configuration> {
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            return serde_json::from_str(&body).map_err(|e| {
                TetherError::Response(format!(
                    "Failed to parse configuration: {}. Body: {}",
                    e,
                    body.chars().take(500).collect::<String>()
                ))
            });
        }

        let response_body = response.text().await.unwrap_or_default();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TetherError::Auth(format!(
                "Provider refused credential ({})",
                status
            )));
        }

        if status == StatusCode::BAD_REQUEST {
            let message = serde_json::from_str::<Value>(&response_body)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(response_body);
            return Err(ValidationError::Remote(message).into());
        }

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(TetherError::Unavailable(format!(
                "Provider returned {}: {}",
                status, response_body
            )));
        }

        Err(TetherError::Response(format!(
            "Unexpected status {}: {}",
            status, response_body
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_url_joins_base() {
        let client =
            HttpConfigClient::new("http://config:8080", None, Duration::from_secs(5)).unwrap();
        assert_eq!(client.config_url().as_str(), "http://config:8080/config");

        let client =
            HttpConfigClient::new("http://config:8080/api/", None, Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.config_url().as_str(), "http://config:8080/api/config");
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let err = HttpConfigClient::new("not a url", None, Duration::from_secs(5))
            .err()
            .unwrap();
        assert!(matches!(err, TetherError::Config(_)));
    }
}
