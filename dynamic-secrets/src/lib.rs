//! Lease-aware cache for dynamic secrets.
//!
//! Fetches time-limited credentials from HashiCorp Vault, keeps them until
//! their lease expires, re-fetches on the first read after expiry, and
//! revokes them on delete.
//!
//! ```no_run
//! use dynamic_secrets::{
//!     DynamicSecretProvider, LeaseManager, MemoryLeaseStore, ProviderConfig, TransportConfig,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), dynamic_secrets::LeaseError> {
//! let manager = LeaseManager::from_config(
//!     &TransportConfig::from_env()?,
//!     Arc::new(MemoryLeaseStore::new()),
//! )?;
//! let config = ProviderConfig::new("aws/", "deploy")?;
//!
//! let credentials = manager.get_value("aws_deploy", &config).await;
//! manager.delete_value("aws_deploy", &config).await;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod manager;
pub mod path;
pub mod provider;
pub mod responses;
pub mod retry;
pub mod store;
pub mod telemetry;
pub mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::ObscureOptions;
pub use config::{MountInfo, ProviderConfig, TransportConfig};
pub use error::{LeaseError, LeaseResult, StoreError, TransportError};
pub use manager::{LeaseManager, RevokeOutcome};
pub use path::{LeaseAction, build_path};
pub use provider::{DynamicSecretProvider, Transport};
pub use responses::SecretResponse;
pub use retry::{RetryConfig, RetryPolicy};
pub use store::{FileLeaseStore, LeaseRecord, LeaseStore, MemoryLeaseStore};
pub use transport::VaultTransport;
