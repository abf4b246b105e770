//! Vault API response structures.

use crate::config::MountInfo;
use crate::error::TransportError;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

/// Envelope of a Vault response that may carry a lease.
#[derive(Debug, Deserialize)]
pub struct LeasedResponse {
    /// Lease identifier, empty when no lease was issued
    #[serde(default)]
    pub lease_id: String,
    /// Lease duration in seconds
    #[serde(default)]
    pub lease_duration: u64,
    /// Whether the lease may be renewed
    #[serde(default)]
    pub renewable: bool,
    /// Response payload
    pub data: Option<Map<String, Value>>,
}

/// Dynamic credential issued under a lease.
#[derive(Clone, PartialEq)]
pub struct SecretResponse {
    /// Credential fields (`access_key`, `secret_key`, ...)
    pub data: Map<String, Value>,
    /// Lease identifier needed to revoke the credential
    pub lease_id: String,
    /// Lease duration in seconds
    pub lease_duration: u64,
    /// Whether the lease may be renewed
    pub renewable: bool,
}

impl fmt::Debug for SecretResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretResponse")
            .field("data", &"[REDACTED]")
            .field("lease_id", &self.lease_id)
            .field("lease_duration", &self.lease_duration)
            .field("renewable", &self.renewable)
            .finish()
    }
}

impl TryFrom<LeasedResponse> for SecretResponse {
    type Error = TransportError;

    fn try_from(response: LeasedResponse) -> Result<Self, Self::Error> {
        let data = response
            .data
            .ok_or_else(|| TransportError::MalformedResponse("response has no data".to_string()))?;
        if response.lease_id.is_empty() {
            return Err(TransportError::MalformedResponse(
                "response carries no lease".to_string(),
            ));
        }

        Ok(Self {
            data,
            lease_id: response.lease_id,
            lease_duration: response.lease_duration,
            renewable: response.renewable,
        })
    }
}

/// Mount table entry from `sys/mounts`.
#[derive(Debug, Deserialize)]
struct MountEntry {
    #[serde(rename = "type")]
    engine_type: String,
}

/// Parse a `sys/mounts` response body.
///
/// Current Vault versions nest the table under `data`; older ones also
/// repeat it at the top level next to envelope fields.
///
/// # Errors
///
/// Returns [`TransportError::MalformedResponse`] if the body is not an object.
pub fn parse_mounts(body: Value) -> Result<Vec<MountInfo>, TransportError> {
    let table = match body {
        Value::Object(mut top) => match top.remove("data") {
            Some(Value::Object(data)) => data,
            _ => top,
        },
        _ => {
            return Err(TransportError::MalformedResponse(
                "mount table is not an object".to_string(),
            ));
        }
    };

    let mut mounts: Vec<MountInfo> = table
        .into_iter()
        .filter(|(path, _)| path.ends_with('/'))
        .filter_map(|(path, entry)| {
            serde_json::from_value::<MountEntry>(entry)
                .ok()
                .map(|entry| MountInfo {
                    path,
                    engine_type: entry.engine_type,
                })
        })
        .collect();
    mounts.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(mounts)
}
