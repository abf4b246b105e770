//! Vault HTTP transport.

use crate::config::{MountInfo, TransportConfig};
use crate::error::TransportError;
use crate::http::{HttpConfig, build_http_client};
use crate::provider::Transport;
use crate::responses::{LeasedResponse, SecretResponse, parse_mounts};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument, warn};

/// [`Transport`] speaking the Vault HTTP API (`<addr>/v1/<path>`).
#[derive(Debug, Clone)]
pub struct VaultTransport {
    base_url: String,
    http: Client,
}

impl VaultTransport {
    /// Create a transport for the configured Vault server.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let http = build_http_client(&HttpConfig::from(config))?;
        Ok(Self::with_client(&config.addr, http))
    }

    /// Use an already configured HTTP client.
    #[must_use]
    pub fn with_client(addr: &str, http: Client) -> Self {
        Self {
            base_url: addr.trim_end_matches('/').to_string(),
            http,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Option<Value>, TransportError> {
        let mut request = self.http.request(method.clone(), self.url(path));
        if let Some(b) = body {
            request = request.json(&b);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        let status = response.status();
        debug!(%method, path, status = status.as_u16(), "Vault responded");

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(TransportError::PermissionDenied(path.to_string()));
            }
            StatusCode::NOT_FOUND => return Err(TransportError::NotFound(path.to_string())),
            StatusCode::TOO_MANY_REQUESTS => return Err(TransportError::RateLimited),
            StatusCode::NO_CONTENT => return Ok(None),
            s if s.is_server_error() => {
                let text = response.text().await.unwrap_or_default();
                warn!(path, status = s.as_u16(), "Vault server error");
                return Err(TransportError::Unavailable(format!("Status {s}: {text}")));
            }
            s if !s.is_success() => {
                let text = response.text().await.unwrap_or_default();
                return Err(TransportError::Status {
                    status: s.as_u16(),
                    body: text,
                });
            }
            _ => {}
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;
        if bytes.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl Transport for VaultTransport {
    #[instrument(skip(self))]
    async fn read(&self, path: &str) -> Result<SecretResponse, TransportError> {
        let body = self
            .send(Method::GET, path, None)
            .await?
            .ok_or_else(|| TransportError::MalformedResponse("empty response body".to_string()))?;

        let response: LeasedResponse = serde_json::from_value(body)
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;
        SecretResponse::try_from(response)
    }

    #[instrument(skip(self, body))]
    async fn put(&self, path: &str, body: Value) -> Result<Value, TransportError> {
        Ok(self
            .send(Method::PUT, path, Some(body))
            .await?
            .unwrap_or(Value::Null))
    }

    #[instrument(skip(self))]
    async fn delete(&self, path: &str) -> Result<(), TransportError> {
        self.send(Method::DELETE, path, None).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_mounts(&self) -> Result<Vec<MountInfo>, TransportError> {
        let body = self
            .send(Method::GET, "/sys/mounts", None)
            .await?
            .ok_or_else(|| TransportError::MalformedResponse("empty mount table".to_string()))?;
        parse_mounts(body)
    }
}
