//! Error types for vaultctl
//!
//! This module defines the error hierarchy that covers:
//! - Remote store transport and API errors
//! - Configuration and CLI errors
//! - Tree-build failures (first worker error plus the partial tree)
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - NotFound is a domain outcome, not an error: store reads and lists
//!   return `Ok(None)` for it and never surface it through `StoreError`
//! - Preserve the remote's message verbatim in transport errors

use crate::tree::Tree;
use thiserror::Error;

/// Errors from the remote secret store (anything that is not NotFound)
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Transport-level failure (connection, TLS, timeout, ...)
    #[error("request to '{path}' failed: {reason}")]
    Transport { path: String, reason: String },

    /// The remote answered with a non-success status
    #[error("remote returned {status} for '{path}': {message}")]
    Api {
        path: String,
        status: u16,
        message: String,
    },

    /// The remote answered 2xx but the body did not match the contract
    #[error("malformed response for '{path}': {reason}")]
    MalformedResponse { path: String, reason: String },

    /// The store address could not be turned into a request URL
    #[error("invalid store address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },
}

impl StoreError {
    /// The path the failing operation targeted
    pub fn path(&self) -> &str {
        match self {
            StoreError::Transport { path, .. } => path,
            StoreError::Api { path, .. } => path,
            StoreError::MalformedResponse { path, .. } => path,
            StoreError::InvalidAddress { .. } => "",
        }
    }
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid request timeout
    #[error("invalid timeout {secs}s: must be at least 1")]
    InvalidTimeout { secs: u64 },

    /// Store address missing or unusable
    #[error("invalid store address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// A `key=value` pair on the command line did not parse
    #[error("invalid field '{field}': expected key=value")]
    InvalidField { field: String },
}

/// A tree build that stopped on a transport error
///
/// Carries the partially populated tree alongside the first error observed;
/// everything appended before the failing step is still reachable through
/// `partial`.
#[derive(Error, Debug)]
#[error("{source}")]
pub struct BuildError {
    #[source]
    pub source: StoreError,
    pub partial: Tree,
}

/// Result type alias for StoreError
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for ConfigError
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
