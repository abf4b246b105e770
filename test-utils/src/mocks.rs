//! Mock implementations for testing.

use async_trait::async_trait;
use dynamic_secrets::{MountInfo, SecretResponse, Transport, TransportError};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// A recorded transport call.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    /// `read(path)`
    Read(String),
    /// `put(path, body)`
    Put(String, Value),
    /// `delete(path)`
    Delete(String),
    /// `list_mounts()`
    ListMounts,
}

/// Scriptable transport that records every call.
///
/// Reads pop scripted results in order; once the script is empty every read
/// issues a fresh numbered lease. Puts succeed unless failures are enabled.
#[derive(Debug, Default)]
pub struct MockTransport {
    calls: Arc<RwLock<Vec<TransportCall>>>,
    reads: Arc<RwLock<VecDeque<Result<SecretResponse, TransportError>>>>,
    mounts: Arc<RwLock<Vec<MountInfo>>>,
    fail_puts: Arc<RwLock<bool>>,
    read_delay: Arc<RwLock<Option<Duration>>>,
    issued: Arc<RwLock<u64>>,
}

impl MockTransport {
    /// Create a new mock transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next read.
    pub async fn push_read(&self, result: Result<SecretResponse, TransportError>) {
        self.reads.write().await.push_back(result);
    }

    /// Make every revoke/put fail with a permission error.
    pub async fn fail_puts(&self) {
        *self.fail_puts.write().await = true;
    }

    /// Delay every read, to widen race windows.
    pub async fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.write().await = Some(delay);
    }

    /// Set the mount table.
    pub async fn set_mounts(&self, mounts: Vec<MountInfo>) {
        *self.mounts.write().await = mounts;
    }

    /// All calls so far.
    pub async fn calls(&self) -> Vec<TransportCall> {
        self.calls.read().await.clone()
    }

    /// Number of reads so far.
    pub async fn read_count(&self) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| matches!(c, TransportCall::Read(_)))
            .count()
    }

    /// Number of puts so far.
    pub async fn put_count(&self) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| matches!(c, TransportCall::Put(..)))
            .count()
    }

    async fn next_lease(&self) -> SecretResponse {
        let mut issued = self.issued.write().await;
        *issued += 1;
        let mut lease = crate::fixtures::aws_lease(&format!("aws/creds/deploy/{issued}"), 3600);
        lease.data.insert("access_key".to_string(), Value::String(format!("AKIA{issued}")));
        lease
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn read(&self, path: &str) -> Result<SecretResponse, TransportError> {
        self.calls.write().await.push(TransportCall::Read(path.to_string()));
        let delay = *self.read_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.reads.write().await.pop_front();
        match scripted {
            Some(result) => result,
            None => Ok(self.next_lease().await),
        }
    }

    async fn put(&self, path: &str, body: Value) -> Result<Value, TransportError> {
        self.calls.write().await.push(TransportCall::Put(path.to_string(), body));
        if *self.fail_puts.read().await {
            return Err(TransportError::PermissionDenied(path.to_string()));
        }
        Ok(Value::Null)
    }

    async fn delete(&self, path: &str) -> Result<(), TransportError> {
        self.calls.write().await.push(TransportCall::Delete(path.to_string()));
        Ok(())
    }

    async fn list_mounts(&self) -> Result<Vec<MountInfo>, TransportError> {
        self.calls.write().await.push(TransportCall::ListMounts);
        Ok(self.mounts.read().await.clone())
    }
}
