//! Lease manager: cache-or-fetch for dynamic credentials.
//!
//! Expiry is evaluated lazily on each read; there is no renewal task. A
//! per-identity mutex serializes refreshes and revocations so a single
//! expired lease is never replaced twice concurrently.

use crate::clock::{Clock, SystemClock};
use crate::codec::{self, ObscureOptions};
use crate::config::{MountInfo, ProviderConfig, TransportConfig};
use crate::error::{LeaseError, LeaseResult};
use crate::path::{LeaseAction, build_path};
use crate::provider::{DynamicSecretProvider, Transport};
use crate::retry::{RetryConfig, RetryPolicy};
use crate::store::{DEFAULT_NAMESPACE, LeaseRecord, LeaseStore, lease_key};
use crate::transport::VaultTransport;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, instrument};

/// Result of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    /// No lease was stored; nothing was sent to the secrets manager
    NoLease,
    /// Lease revoked remotely and removed locally
    Revoked,
    /// Revocation failed; the lease was still removed locally
    RevokeFailed,
}

/// Caches dynamic credentials until their lease expires.
pub struct LeaseManager {
    store: Arc<dyn LeaseStore>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    namespace: String,
    locks: LockTable,
}

type LockTable = std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>;

/// Exclusive hold on one store key. The table entry is dropped with the last
/// holder, so the table only contains keys that are in use.
struct IdentityGuard<'a> {
    key: String,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a LockTable,
}

impl Drop for IdentityGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Table entry plus ours: nobody else holds or waits on it.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.key);
        }
    }
}

impl LeaseManager {
    /// Create a manager using the system clock and no retries.
    #[must_use]
    pub fn new(store: Arc<dyn LeaseStore>, transport: Arc<dyn Transport>) -> Self {
        Self {
            store,
            transport,
            clock: Arc::new(SystemClock),
            retry: RetryPolicy::none(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Create a manager talking to Vault as described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &TransportConfig, store: Arc<dyn LeaseStore>) -> LeaseResult<Self> {
        let transport = VaultTransport::new(config)?;
        Ok(Self::new(store, Arc::new(transport))
            .with_retry_policy(RetryPolicy::new(RetryConfig::from(config))))
    }

    /// Use `clock` for expiry checks.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Retry transient transport failures according to `retry`.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Prefix store keys with `namespace` instead of the default.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Current credential for `identity`, fetching a new lease on miss or
    /// expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails, the secrets manager rejects the
    /// request, or the payload cannot be encoded.
    #[instrument(skip(self, config))]
    pub async fn try_get_value(&self, identity: &str, config: &ProviderConfig) -> LeaseResult<String> {
        let key = self.key(identity);
        let _guard = self.lock_identity(&key).await;

        if let Some(record) = self.store.get(&key).await? {
            if record.is_valid_at(self.clock.now()) {
                debug!(lease_id = %record.lease_id, "Lease cache hit");
                return Ok(record.data);
            }
            debug!(lease_id = %record.lease_id, expired_at = %record.lease_expiry, "Lease expired");
        }

        let path = build_path(LeaseAction::Get, config, None)?;
        let path = path.as_str();
        let response = self
            .retry
            .execute(move || self.transport.read(path))
            .await?;

        let record = LeaseRecord::issue(
            codec::encode(&response.data)?,
            response.lease_id,
            response.lease_duration,
            self.clock.now(),
        );
        info!(
            lease_id = %record.lease_id,
            lease_duration = record.lease_duration,
            expires_at = %record.lease_expiry,
            "Leased new credentials"
        );

        let data = record.data.clone();
        self.store.set(&key, record).await?;
        Ok(data)
    }

    /// Revoke the lease held for `identity` and remove it from the store.
    ///
    /// The revoke is attempted before the local delete; a failed revoke is
    /// logged and does not prevent the delete.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    #[instrument(skip(self, config))]
    pub async fn try_delete_value(
        &self,
        identity: &str,
        config: &ProviderConfig,
    ) -> LeaseResult<RevokeOutcome> {
        let key = self.key(identity);
        let _guard = self.lock_identity(&key).await;

        let Some(record) = self.store.get(&key).await? else {
            debug!("No lease held, nothing to revoke");
            return Ok(RevokeOutcome::NoLease);
        };

        let outcome = match self.revoke(config, &record.lease_id).await {
            Ok(()) => {
                info!(lease_id = %record.lease_id, "Lease revoked");
                RevokeOutcome::Revoked
            }
            Err(e) => {
                error!(lease_id = %record.lease_id, error = %e, "Lease revocation failed");
                RevokeOutcome::RevokeFailed
            }
        };

        self.store.delete(&key).await?;
        Ok(outcome)
    }

    async fn revoke(&self, config: &ProviderConfig, lease_id: &str) -> LeaseResult<()> {
        let path = build_path(LeaseAction::Revoke, config, Some(lease_id))?;
        let path = path.as_str();
        let body = serde_json::json!({ "lease_id": lease_id });
        let body = &body;
        self.retry
            .execute(move || self.transport.put(path, body.clone()))
            .await?;
        Ok(())
    }

    /// Lease currently stored for `identity`, valid or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn lease(&self, identity: &str) -> LeaseResult<Option<LeaseRecord>> {
        Ok(self.store.get(&self.key(identity)).await?)
    }

    /// Swap the configuration of `identity`.
    ///
    /// Mount and secret path are locked once a lease is held: changing them
    /// would orphan the outstanding lease. Delete the value first.
    ///
    /// # Errors
    ///
    /// Returns [`LeaseError::InvalidArgument`] if a lease is held and the
    /// configuration differs.
    pub async fn reconfigure(
        &self,
        identity: &str,
        current: &ProviderConfig,
        requested: ProviderConfig,
    ) -> LeaseResult<ProviderConfig> {
        if *current == requested {
            return Ok(requested);
        }

        let key = self.key(identity);
        let _guard = self.lock_identity(&key).await;

        if self.store.get(&key).await?.is_some() {
            return Err(LeaseError::invalid_argument(format!(
                "configuration of {identity} is locked while a lease is held"
            )));
        }
        Ok(requested)
    }

    /// Enabled mounts backed by `engine_type`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount table cannot be read.
    pub async fn available_mounts(&self, engine_type: &str) -> LeaseResult<Vec<MountInfo>> {
        let mounts = self.retry.execute(|| self.transport.list_mounts()).await?;
        Ok(MountInfo::of_type(&mounts, engine_type)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Check that the mount in `config` is enabled with `engine_type`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount table cannot be read or the mount is
    /// missing or of another type.
    pub async fn verify_mount(&self, config: &ProviderConfig, engine_type: &str) -> LeaseResult<()> {
        let mounts = self.retry.execute(|| self.transport.list_mounts()).await?;
        config.ensure_mounted(&mounts, engine_type)
    }

    /// Masked rendering of the current credential, for display.
    pub async fn obscured_value(
        &self,
        identity: &str,
        config: &ProviderConfig,
        options: &ObscureOptions,
    ) -> String {
        codec::obscure(&self.get_value(identity, config).await, options)
    }

    fn key(&self, identity: &str) -> String {
        lease_key(&self.namespace, identity)
    }

    async fn lock_identity(&self, key: &str) -> IdentityGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key.to_string()).or_default())
        };
        let mut held = IdentityGuard {
            key: key.to_string(),
            lock,
            guard: None,
            locks: &self.locks,
        };
        // Released through `held` even if this future is dropped while waiting.
        let guard = Arc::clone(&held.lock).lock_owned().await;
        held.guard = Some(guard);
        held
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl DynamicSecretProvider for LeaseManager {
    async fn get_value(&self, identity: &str, config: &ProviderConfig) -> String {
        match self.try_get_value(identity, config).await {
            Ok(value) => value,
            Err(e) => {
                error!(identity, error = %e, "Failed to fetch dynamic secret");
                String::new()
            }
        }
    }

    async fn set_value(&self, identity: &str, _value: &str) {
        debug!(identity, "Ignoring write to a dynamic secret");
    }

    async fn delete_value(&self, identity: &str, config: &ProviderConfig) {
        if let Err(e) = self.try_delete_value(identity, config).await {
            error!(identity, error = %e, "Failed to delete dynamic secret");
        }
    }
}
