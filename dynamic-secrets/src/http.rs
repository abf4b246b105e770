//! HTTP client construction for the Vault transport.
//!
//! Authentication headers are installed as client defaults so every request
//! carries them without the transport handling the token per call.

use crate::config::TransportConfig;
use crate::error::TransportError;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// Header carrying the Vault client token.
pub const TOKEN_HEADER: &str = "x-vault-token";

/// Header carrying the Vault enterprise namespace.
pub const NAMESPACE_HEADER: &str = "x-vault-namespace";

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout (default: 30s)
    pub timeout: Duration,
    /// Connection timeout (default: 10s)
    pub connect_timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Vault token
    pub token: SecretString,
    /// Vault namespace
    pub namespace: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("dynamic-secrets/", env!("CARGO_PKG_VERSION")).to_string(),
            token: SecretString::from(String::new()),
            namespace: None,
        }
    }
}

impl From<&TransportConfig> for HttpConfig {
    fn from(config: &TransportConfig) -> Self {
        Self {
            timeout: config.timeout,
            connect_timeout: config.connect_timeout,
            token: config.token.clone(),
            namespace: config.namespace.clone(),
            ..Default::default()
        }
    }
}

/// Build a configured HTTP client.
///
/// Creates a reqwest client with rustls TLS, bounded timeouts, and the Vault
/// authentication headers installed as defaults.
///
/// # Errors
///
/// Returns an error if a header value is not valid ASCII or the client
/// cannot be built.
pub fn build_http_client(config: &HttpConfig) -> Result<Client, TransportError> {
    let mut headers = HeaderMap::new();

    let token = config.token.expose_secret();
    if !token.is_empty() {
        let mut value = HeaderValue::from_str(token)
            .map_err(|_| TransportError::InvalidHeader(TOKEN_HEADER))?;
        value.set_sensitive(true);
        headers.insert(TOKEN_HEADER, value);
    }

    if let Some(namespace) = &config.namespace {
        let value = HeaderValue::from_str(namespace)
            .map_err(|_| TransportError::InvalidHeader(NAMESPACE_HEADER))?;
        headers.insert(NAMESPACE_HEADER, value);
    }

    ClientBuilder::new()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .user_agent(&config.user_agent)
        .default_headers(headers)
        .use_rustls_tls()
        .build()
        .map_err(TransportError::Client)
}
