//! Configuration types for vaultctl
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime client configuration with validation

use crate::error::ConfigError;
use clap::{Parser, Subcommand};
use std::time::Duration;

/// Hard ceiling for `--workers`; the remote is the bottleneck long before
/// this
const MAX_WORKERS: usize = 8;

/// Command-line client for Vault-style secret stores
#[derive(Parser, Debug, Clone)]
#[command(
    name = "vaultctl",
    version,
    about = "Read, write and explore secrets on a Vault-style store",
    after_help = "EXAMPLES:\n    \
        vaultctl tree secret/ --keys\n    \
        vaultctl paths / > all-paths.txt\n    \
        vaultctl read secret/db:password\n    \
        vaultctl write secret/db user=app password=hunter2\n    \
        vaultctl copy secret/db secret/db-staging"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Store address, e.g. https://vault.example.com:8200
    #[arg(long, env = "VAULT_ADDR", global = true, value_name = "URL")]
    pub address: Option<String>,

    /// Authentication token
    #[arg(long, env = "VAULT_TOKEN", global = true, value_name = "TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Number of parallel workers for tree exploration
    #[arg(short = 'w', long, global = true, value_name = "NUM")]
    pub workers: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30", global = true, value_name = "SECS")]
    pub timeout: u64,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    pub tls_skip_verify: bool,

    /// Verbose output (debug-level logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Quiet mode - suppress the progress spinner
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Draw the namespace under PATH as a tree
    Tree {
        /// Root of the subtree ("/" for everything)
        #[arg(value_name = "PATH", default_value = "/")]
        path: String,

        /// Also fetch and show each secret's keys
        #[arg(short = 'k', long)]
        keys: bool,

        /// Disable ANSI colour
        #[arg(long)]
        no_color: bool,
    },

    /// Print every leaf path under PATH, one per line
    Paths {
        /// Root of the subtree ("/" for everything)
        #[arg(value_name = "PATH", default_value = "/")]
        path: String,

        /// Include `path:key` entries for secret fields
        #[arg(short = 'k', long)]
        keys: bool,
    },

    /// Read a secret, or one field of it with a `path:key` suffix
    Read {
        #[arg(value_name = "PATH[:KEY]")]
        path: String,
    },

    /// Write a secret from key=value pairs
    Write {
        #[arg(value_name = "PATH")]
        path: String,

        /// Fields as key=value
        #[arg(value_name = "KEY=VALUE", required = true)]
        fields: Vec<String>,
    },

    /// Delete the secret at PATH
    Delete {
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Copy a secret (or one field, with a `:key` suffix on SRC)
    Copy {
        #[arg(value_name = "SRC[:KEY]")]
        src: String,
        #[arg(value_name = "DST")]
        dst: String,
    },

    /// Move a secret (copy, then delete the source)
    Move {
        #[arg(value_name = "SRC")]
        src: String,
        #[arg(value_name = "DST")]
        dst: String,
    },
}

/// Validated runtime configuration for the remote client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Store base address
    pub address: String,

    /// Authentication token, if any
    pub token: Option<String>,

    /// Worker count for tree exploration
    pub workers: Option<usize>,

    /// Per-request timeout
    pub timeout: Duration,

    /// Skip TLS certificate verification
    pub tls_skip_verify: bool,

    /// Verbose logging
    pub verbose: bool,

    /// Suppress the spinner
    pub quiet: bool,
}

impl ClientConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: &CliArgs) -> Result<Self, ConfigError> {
        let address = args
            .address
            .clone()
            .ok_or_else(|| ConfigError::InvalidAddress {
                address: String::new(),
                reason: "set --address or VAULT_ADDR".to_string(),
            })?;

        if let Some(workers) = args.workers {
            if workers == 0 || workers > MAX_WORKERS {
                return Err(ConfigError::InvalidWorkerCount {
                    count: workers,
                    max: MAX_WORKERS,
                });
            }
        }

        if args.timeout == 0 {
            return Err(ConfigError::InvalidTimeout { secs: args.timeout });
        }

        Ok(Self {
            address,
            token: args.token.clone(),
            workers: args.workers,
            timeout: Duration::from_secs(args.timeout),
            tls_skip_verify: args.tls_skip_verify,
            verbose: args.verbose,
            quiet: args.quiet,
        })
    }
}

/// Parse a `key=value` field argument
pub fn parse_field(field: &str) -> Result<(String, String), ConfigError> {
    match field.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(ConfigError::InvalidField {
            field: field.to_string(),
        }),
    }
}
