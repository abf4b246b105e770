//! Lease records and the stores that persist them.
//!
//! The manager only needs atomic `get`/`set`/`delete` on whole records;
//! durability is up to the store implementation.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::RwLock;
use tracing::debug;

/// Default key namespace for lease records.
pub const DEFAULT_NAMESPACE: &str = "dynamic_secrets";

/// Build the store key for an identity: `<namespace>.<identity>`.
#[must_use]
pub fn lease_key(namespace: &str, identity: &str) -> String {
    format!("{namespace}.{identity}")
}

/// A cached dynamic credential and the lease it was issued under.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    /// Encoded credential payload
    pub data: String,
    /// Lease identifier assigned by the secrets manager
    pub lease_id: String,
    /// Lease duration in seconds, as reported at issuance
    pub lease_duration: u64,
    /// Issuance time plus `lease_duration`
    pub lease_expiry: DateTime<Utc>,
}

impl LeaseRecord {
    /// Create a record issued at `issued_at`.
    ///
    /// Expiry is derived locally from the relative duration, never taken
    /// from the server as an absolute time.
    #[must_use]
    pub fn issue(
        data: impl Into<String>,
        lease_id: impl Into<String>,
        lease_duration: u64,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let ttl = i64::try_from(lease_duration)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        let lease_expiry = issued_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            data: data.into(),
            lease_id: lease_id.into(),
            lease_duration,
            lease_expiry,
        }
    }

    /// Whether the lease can be used without a round-trip at `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.lease_expiry
    }
}

impl fmt::Debug for LeaseRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeaseRecord")
            .field("data", &"[REDACTED]")
            .field("lease_id", &self.lease_id)
            .field("lease_duration", &self.lease_duration)
            .field("lease_expiry", &self.lease_expiry)
            .finish()
    }
}

/// Key-value persistence for lease records.
///
/// Each call must be atomic with respect to the others on the same key.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Fetch the record stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<LeaseRecord>, StoreError>;

    /// Store `record` under `key`, replacing any previous record.
    async fn set(&self, key: &str, record: LeaseRecord) -> Result<(), StoreError>;

    /// Remove the record under `key`; absent keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// In-process lease store.
#[derive(Debug, Default)]
pub struct MemoryLeaseStore {
    records: RwLock<HashMap<String, LeaseRecord>>,
}

impl MemoryLeaseStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn get(&self, key: &str) -> Result<Option<LeaseRecord>, StoreError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, record: LeaseRecord) -> Result<(), StoreError> {
        self.records.write().await.insert(key.to_string(), record);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.records.write().await.remove(key);
        Ok(())
    }
}

/// Lease store backed by a single JSON document on disk.
///
/// Every operation holds an advisory lock on a sibling `<path>.lock` file,
/// shared for reads and exclusive for writes, so several stores (in one
/// process or many) can use the same document. Writes go to a uniquely named
/// temp file in the same directory that is then renamed over the document.
#[derive(Debug)]
pub struct FileLeaseStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileLeaseStore {
    /// Use the document at `path`; it is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_path = path.clone().into_os_string();
        lock_path.push(".lock");
        Self {
            path,
            lock_path: lock_path.into(),
        }
    }

    /// Location of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `op` on a blocking thread while holding the document lock.
    async fn locked<T, F>(&self, exclusive: bool, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Path) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        let lock_path = self.lock_path.clone();

        tokio::task::spawn_blocking(move || {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;
            let mut lock = fd_lock::RwLock::new(file);
            if exclusive {
                let _guard = lock.write()?;
                op(&path)
            } else {
                let _guard = lock.read()?;
                op(&path)
            }
        })
        .await?
    }
}

fn load(path: &Path) -> Result<BTreeMap<String, LeaseRecord>, StoreError> {
    match std::fs::read(path) {
        Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e.into()),
    }
}

fn save(path: &Path, records: &BTreeMap<String, LeaseRecord>) -> Result<(), StoreError> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, records)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    debug!(path = %path.display(), records = records.len(), "Lease store saved");
    Ok(())
}

#[async_trait]
impl LeaseStore for FileLeaseStore {
    async fn get(&self, key: &str) -> Result<Option<LeaseRecord>, StoreError> {
        let key = key.to_string();
        self.locked(false, move |path| Ok(load(path)?.remove(&key)))
            .await
    }

    async fn set(&self, key: &str, record: LeaseRecord) -> Result<(), StoreError> {
        let key = key.to_string();
        self.locked(true, move |path| {
            let mut records = load(path)?;
            records.insert(key, record);
            save(path, &records)
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let key = key.to_string();
        self.locked(true, move |path| {
            let mut records = load(path)?;
            if records.remove(&key).is_some() {
                save(path, &records)?;
            }
            Ok(())
        })
        .await
    }
}
