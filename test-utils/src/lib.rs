//! Shared test utilities for the dynamic-secrets workspace.
//!
//! This crate provides:
//! - Proptest generators for paths, lease ids and credential values
//! - A scriptable mock transport that records every call
//! - Test fixtures with sample Vault responses

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;
