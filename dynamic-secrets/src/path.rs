//! Request path construction for lease actions.

use crate::config::ProviderConfig;
use crate::error::{LeaseError, LeaseResult};
use std::fmt;
use std::str::FromStr;

/// Action performed against the secrets manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseAction {
    /// Issue a new dynamic credential
    Get,
    /// Revoke an existing lease
    Revoke,
}

impl LeaseAction {
    /// Action name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Revoke => "revoke",
        }
    }
}

impl fmt::Display for LeaseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeaseAction {
    type Err = LeaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get" => Ok(Self::Get),
            "revoke" => Ok(Self::Revoke),
            other => Err(LeaseError::invalid_argument(format!("unknown action: {other}"))),
        }
    }
}

/// Build the request path for `action`.
///
/// Path segments are not escaped; [`ProviderConfig`] already restricts them
/// to a safe character set.
///
/// # Errors
///
/// Returns [`LeaseError::InvalidArgument`] when a revoke is requested
/// without a lease id.
pub fn build_path(
    action: LeaseAction,
    config: &ProviderConfig,
    lease_id: Option<&str>,
) -> LeaseResult<String> {
    match action {
        LeaseAction::Get => Ok(format!(
            "/{}creds/{}",
            config.secret_engine_mount(),
            config.secret_path()
        )),
        LeaseAction::Revoke => match lease_id {
            Some(id) if !id.is_empty() => Ok(format!("/sys/leases/revoke/{id}")),
            _ => Err(LeaseError::invalid_argument("revoke requires a lease id")),
        },
    }
}
