//! Shared proptest generators.

use proptest::prelude::*;

/// Secret paths accepted by `ProviderConfig`.
pub fn secret_path_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("deploy".to_string()),
        Just("teams/platform/ci-runner".to_string()),
        "[a-zA-Z0-9._-]{1,12}(/[a-zA-Z0-9._-]{1,12}){0,3}",
    ]
}

/// Secret paths containing at least one forbidden character.
pub fn invalid_secret_path_strategy() -> impl Strategy<Value = String> {
    ("[a-z]{0,8}", "[ ?#%&:;@=+]", "[a-z]{0,8}").prop_map(|(a, bad, b)| format!("{a}{bad}{b}"))
}

/// Secret-engine mount names.
pub fn mount_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("aws/".to_string()),
        Just("database/".to_string()),
        "[a-z][a-z0-9-]{1,15}/",
    ]
}

/// Vault lease identifiers (`<mount>/creds/<role>/<nonce>`).
pub fn lease_id_strategy() -> impl Strategy<Value = String> {
    ("[a-z]{3,8}", "[a-z][a-z0-9-]{2,12}", "[A-Za-z0-9]{24}")
        .prop_map(|(mount, role, nonce)| format!("{mount}/creds/{role}/{nonce}"))
}

/// Lease durations from zero to one year.
pub fn lease_duration_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![Just(0_u64), Just(3600_u64), 1_u64..31_536_000]
}

/// Unix timestamps between 2001 and 2286.
pub fn issued_at_strategy() -> impl Strategy<Value = i64> {
    1_000_000_000_i64..10_000_000_000
}

/// Credential-like secret values, including non-ASCII characters.
pub fn secret_value_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9!@#$%^&*/+=äöü]{0,64}"
}
