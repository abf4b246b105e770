//! Collaborator traits for dynamic secret retrieval.

use crate::config::{MountInfo, ProviderConfig};
use crate::error::TransportError;
use crate::responses::SecretResponse;
use async_trait::async_trait;
use serde_json::Value;

/// Authenticated access to a secrets-manager HTTP API.
///
/// Implementations bound every call with a timeout and surface it as
/// [`TransportError::Timeout`]. Retries are not this layer's concern.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Read a leased secret at `path`.
    async fn read(&self, path: &str) -> Result<SecretResponse, TransportError>;

    /// Write `body` to `path`, returning the decoded response body
    /// (`Value::Null` when the server answers `204 No Content`).
    async fn put(&self, path: &str, body: Value) -> Result<Value, TransportError>;

    /// Delete the resource at `path`.
    async fn delete(&self, path: &str) -> Result<(), TransportError>;

    /// List enabled secret-engine mounts.
    async fn list_mounts(&self) -> Result<Vec<MountInfo>, TransportError>;
}

/// Key-provider surface exposed to host applications.
///
/// None of these calls fail: fetch failures yield an empty value and are
/// logged, revoke failures are logged, and writes are discarded.
#[async_trait]
pub trait DynamicSecretProvider: Send + Sync {
    /// Current credential for `identity`, fetching a new lease if needed.
    async fn get_value(&self, identity: &str, config: &ProviderConfig) -> String;

    /// Accepted and discarded; leased credentials are read-only.
    async fn set_value(&self, identity: &str, value: &str);

    /// Revoke the lease held for `identity` and forget it locally.
    async fn delete_value(&self, identity: &str, config: &ProviderConfig);
}
