//! vaultctl - CLI client for Vault-style secret stores
//!
//! Entry point for the CLI application.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::process::ExitCode;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::EnvFilter;
use vaultctl::client::HttpStoreBuilder;
use vaultctl::config::{parse_field, CliArgs, ClientConfig, Command};
use vaultctl::path::parse_path;
use vaultctl::{Secret, SecretStore, Tree, TreeBuilder};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse();

    setup_logging(args.verbose);

    let config = ClientConfig::from_args(&args).context("Invalid configuration")?;

    let store = HttpStoreBuilder::new(&config.address)
        .timeout(config.timeout)
        .insecure_tls(config.tls_skip_verify);
    let store = match &config.token {
        Some(token) => store.token(token),
        None => store,
    };
    let store = store.build().context("Failed to initialize store client")?;

    match &args.command {
        Command::Tree {
            path,
            keys,
            no_color,
        } => {
            let tree = explore(&store, &config, path, *keys)?;
            let colour = !no_color && console::colors_enabled();
            print!("{}", tree.render(colour, *keys));
        }

        Command::Paths { path, keys } => {
            let tree = explore(&store, &config, path, *keys)?;
            for leaf in tree.paths() {
                println!("{leaf}");
            }
        }

        Command::Read { path } => {
            let (path, key) = parse_path(path);
            let secret = read_required(&store, &path)?;
            if key.is_empty() {
                for (k, v) in secret.iter() {
                    println!("{k} = {v}");
                }
            } else {
                match secret.get(&key) {
                    Some(value) => println!("{value}"),
                    None => bail!("secret '{path}' has no key '{key}'"),
                }
            }
        }

        Command::Write { path, fields } => {
            let (path, _) = parse_path(path);
            let secret: Secret = fields
                .iter()
                .map(|f| parse_field(f))
                .collect::<Result<_, _>>()
                .context("Invalid field")?;
            store.write(&path, &secret)?;
        }

        Command::Delete { path } => {
            let (path, _) = parse_path(path);
            store.delete(&path)?;
        }

        Command::Copy { src, dst } => {
            copy_secret(&store, src, dst)?;
        }

        Command::Move { src, dst } => {
            let (src_path, src_key) = parse_path(src);
            if !src_key.is_empty() {
                bail!("move works on whole secrets; use copy for single keys");
            }
            copy_secret(&store, src, dst)?;
            store.delete(&src_path)?;
        }
    }

    Ok(())
}

/// Build the subtree under `path`, with a spinner when interactive
fn explore(
    store: &dyn SecretStore,
    config: &ClientConfig,
    path: &str,
    keys: bool,
) -> Result<Tree> {
    let spinner = if !config.quiet && console::user_attended_stderr() {
        Some(spinner("Exploring secret tree..."))
    } else {
        None
    };

    let mut builder = TreeBuilder::new(store).fetch_keys(keys);
    if let Some(workers) = config.workers {
        builder = builder.workers(workers);
    }
    let result = builder.build(path);

    if let Some(s) = spinner {
        s.finish_and_clear();
    }

    result.map_err(Into::into)
}

/// Read a secret that must exist
fn read_required(store: &dyn SecretStore, path: &str) -> Result<Secret> {
    match store.read(path)? {
        Some(secret) => Ok(secret),
        None => bail!("no secret at '{path}'"),
    }
}

/// Copy a whole secret, or one field of it when SRC carries a `:key` suffix
fn copy_secret(store: &dyn SecretStore, src: &str, dst: &str) -> Result<()> {
    let (src_path, src_key) = parse_path(src);
    let (dst_path, dst_key) = parse_path(dst);
    if !dst_key.is_empty() {
        bail!("destination must not carry a ':key' suffix");
    }

    let secret = read_required(store, &src_path)?;
    let to_write = if src_key.is_empty() {
        secret
    } else {
        match secret.get(&src_key) {
            Some(value) => {
                let mut single = Secret::new();
                single.insert(src_key.clone(), value);
                single
            }
            None => bail!("secret '{src_path}' has no key '{src_key}'"),
        }
    };

    store.write(&dst_path, &to_write)?;
    Ok(())
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .expect("Invalid progress template"),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("vaultctl=debug,warn")
    } else {
        EnvFilter::new("vaultctl=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
