//! Transport and provider configuration.

use crate::error::{LeaseError, LeaseResult};
use regex::Regex;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::LazyLock;
use std::time::Duration;

/// Characters accepted in a mount or secret path.
static SECRET_PATH_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._\-/]*$"));

/// Vault transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Vault server address
    pub addr: String,
    /// Client token sent as `X-Vault-Token`
    pub token: SecretString,
    /// Enterprise namespace sent as `X-Vault-Namespace`
    pub namespace: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Maximum retry attempts for transient failures (0 disables retries)
    pub max_retries: u32,
    /// Base retry delay
    pub retry_delay: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            addr: "http://127.0.0.1:8200".to_string(),
            token: SecretString::from(String::new()),
            namespace: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_retries: 0,
            retry_delay: Duration::from_millis(100),
        }
    }
}

impl TransportConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(addr: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            token: SecretString::from(token.into()),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads `VAULT_ADDR`, `VAULT_TOKEN`, `VAULT_NAMESPACE`,
    /// `VAULT_TIMEOUT_SECS` and `VAULT_MAX_RETRIES`, after loading a `.env`
    /// file if one is present.
    ///
    /// # Errors
    ///
    /// Returns an error if `VAULT_TOKEN` is missing or empty, or a numeric variable
    /// does not parse.
    pub fn from_env() -> LeaseResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from variables resolved by `lookup`.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> LeaseResult<Self> {
        let defaults = Self::default();
        let addr = lookup("VAULT_ADDR").unwrap_or(defaults.addr);
        let token = lookup("VAULT_TOKEN")
            .filter(|token| !token.is_empty())
            .ok_or_else(|| LeaseError::config("VAULT_TOKEN is not set"))?;
        let namespace = lookup("VAULT_NAMESPACE").filter(|ns| !ns.is_empty());
        let timeout = Duration::from_secs(parse_env(
            &lookup,
            "VAULT_TIMEOUT_SECS",
            defaults.timeout.as_secs(),
        )?);
        let max_retries = parse_env(&lookup, "VAULT_MAX_RETRIES", defaults.max_retries)?;

        Ok(Self {
            addr,
            token: SecretString::from(token),
            namespace,
            timeout,
            max_retries,
            ..defaults
        })
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set Vault namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set retry attempts and base delay.
    #[must_use]
    pub const fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }
}

/// Parse environment variable with default value.
fn parse_env<T: std::str::FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> LeaseResult<T>
where
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(val) => val
            .trim()
            .parse()
            .map_err(|e| LeaseError::config(format!("Invalid {name}: {e}"))),
        None => Ok(default),
    }
}

/// Where a dynamic secret is issued from: secret-engine mount plus role path.
///
/// Both fields are validated on construction and cannot be mutated; use
/// [`LeaseManager::reconfigure`](crate::LeaseManager::reconfigure) to swap
/// a configuration while no lease is held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    secret_engine_mount: String,
    secret_path: String,
}

impl ProviderConfig {
    /// Create a validated provider configuration.
    ///
    /// A mount without a trailing `/` has one appended.
    ///
    /// # Errors
    ///
    /// Returns [`LeaseError::InvalidArgument`] if the mount is empty or starts
    /// with `/`, or if the mount or secret path contains characters outside
    /// `[a-zA-Z0-9._-/]`.
    pub fn new(
        secret_engine_mount: impl Into<String>,
        secret_path: impl Into<String>,
    ) -> LeaseResult<Self> {
        let mut mount = secret_engine_mount.into();
        let secret_path = secret_path.into();

        if mount.trim_matches('/').is_empty() {
            return Err(LeaseError::invalid_argument("secret engine mount is empty"));
        }
        if mount.starts_with('/') {
            return Err(LeaseError::invalid_argument(format!(
                "secret engine mount {mount:?} must not start with '/'"
            )));
        }
        validate_path("secret engine mount", &mount)?;
        if !mount.ends_with('/') {
            mount.push('/');
        }
        validate_path("secret path", &secret_path)?;

        Ok(Self {
            secret_engine_mount: mount,
            secret_path,
        })
    }

    /// Mount path, always with a trailing `/`.
    #[must_use]
    pub fn secret_engine_mount(&self) -> &str {
        &self.secret_engine_mount
    }

    /// Role path under the mount.
    #[must_use]
    pub fn secret_path(&self) -> &str {
        &self.secret_path
    }

    /// Check the mount against the secrets manager's enabled mounts.
    ///
    /// # Errors
    ///
    /// Returns [`LeaseError::InvalidArgument`] if the mount is not enabled or
    /// is backed by a different secret engine.
    pub fn ensure_mounted(&self, mounts: &[MountInfo], engine_type: &str) -> LeaseResult<()> {
        match mounts.iter().find(|m| m.path == self.secret_engine_mount) {
            Some(m) if m.engine_type == engine_type => Ok(()),
            Some(m) => Err(LeaseError::invalid_argument(format!(
                "mount {} is a {} engine, expected {engine_type}",
                m.path, m.engine_type
            ))),
            None => Err(LeaseError::invalid_argument(format!(
                "mount {} is not enabled",
                self.secret_engine_mount
            ))),
        }
    }
}

fn validate_path(what: &str, path: &str) -> LeaseResult<()> {
    let pattern = SECRET_PATH_PATTERN
        .as_ref()
        .map_err(|e| LeaseError::config(e.to_string()))?;
    if pattern.is_match(path) {
        Ok(())
    } else {
        Err(LeaseError::invalid_argument(format!(
            "{what} {path:?} may only contain letters, digits, '.', '_', '-' and '/'"
        )))
    }
}

/// An enabled secret-engine mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountInfo {
    /// Mount path with trailing `/`
    pub path: String,
    /// Secret engine type (`aws`, `database`, `kv`, ...)
    pub engine_type: String,
}

impl MountInfo {
    /// Keep only mounts of the given engine type.
    #[must_use]
    pub fn of_type<'a>(mounts: &'a [Self], engine_type: &str) -> Vec<&'a Self> {
        mounts.iter().filter(|m| m.engine_type == engine_type).collect()
    }
}
