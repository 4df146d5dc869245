//! vaultctl - CLI client for Vault-style secret stores
//!
//! A command-line client for remote secret stores that expose a versioned
//! HTTP/JSON key-value API. Supports reading, writing, copying, moving and
//! deleting secrets, and materializing whole subtrees of the namespace for
//! display and path enumeration.
//!
//! # Features
//!
//! - **Parallel tree exploration**: the remote only exposes per-node
//!   listing, so a full subtree takes many dependent requests. A small
//!   worker pool drains a self-terminating work queue; the queue closes
//!   itself when every worker is simultaneously idle, because the workers
//!   are also the only producers of new work.
//!
//! - **Behavioural node classification**: the remote never says whether a
//!   path is a directory, a secret, or both. The client infers it from
//!   which of the two probes (read, list) answers, treating NotFound as
//!   data rather than as an error.
//!
//! - **Bounded concurrency**: remote calls dominate wall time and stores
//!   are typically rate-limited, so parallelism defaults to at most three
//!   workers.
//!
//! # Example
//!
//! ```bash
//! # Draw the whole namespace, including secret keys
//! vaultctl tree / --keys
//!
//! # Enumerate leaf paths for scripting
//! vaultctl paths secret/ | grep prod
//!
//! # Read one field
//! vaultctl read secret/db:password
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod path;
pub mod tree;

pub use client::{HttpStore, MountKind, Secret, SecretStore};
pub use config::{CliArgs, ClientConfig, Command};
pub use error::{BuildError, ConfigError, StoreError};
pub use tree::{build_tree, NodeKind, Tree, TreeBuilder};
