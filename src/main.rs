//! adtree CLI entry point.
//!
//! Provides `collect` for a full collection run against a domain controller
//! and `links` for decoding a raw `gPLink` value offline.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use adtree::collector::Collector;
use adtree::config::{config_path, load_config, Config};
use adtree::directory::{Directory, LdapDirectory};
use adtree::gpo::{resolve_links, PolicyNameCache};
use adtree::logging;

/// adtree — Group Policy link and OU membership resolution.
#[derive(Parser)]
#[command(name = "adtree", version, about)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Resolve links and memberships for every domain root and OU.
    Collect {
        /// Config file (default: `$ADTREE_CONFIG_PATH` or `~/.adtree/config.toml`).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output file (default: config value, else stdout).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Decode a raw gPLink value without contacting a directory.
    Links {
        /// Domain appended to each policy name.
        #[arg(long)]
        domain: String,
        /// Raw attribute value, e.g. `[LDAP://cn={GUID},...;0]`.
        raw: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Collect { config, output } => handle_collect(config, output).await,
        Command::Links { domain, raw } => handle_links(&domain, &raw),
    }
}

/// Run a full collection and write JSON results.
async fn handle_collect(
    config_override: Option<PathBuf>,
    output_override: Option<PathBuf>,
) -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("warning: failed to load .env: {e}");
        }
    }
    let env = |key: &str| std::env::var(key).ok();

    let config = logging::with_startup_logging("info", || -> anyhow::Result<Config> {
        let path = match config_override {
            Some(path) => path,
            None => config_path(env)?,
        };
        let mut config =
            load_config(&path).with_context(|| format!("failed to load {}", path.display()))?;
        config.apply_overrides(env);
        config.validate().context("invalid configuration")?;
        Ok(config)
    })?;

    let _logging_guard = match &config.logging.logs_dir {
        Some(dir) => Some(logging::init_production(dir, &config.logging.level)?),
        None => {
            logging::init_cli(&config.logging.level);
            None
        }
    };

    let password = config.bind_password(env);
    if config.directory.bind_dn.is_some() && password.is_none() {
        warn!(var = %config.directory.password_env, "bind password variable is not set");
    }

    let directory = Arc::new(
        LdapDirectory::connect(&config.directory, password.as_deref())
            .await
            .context("failed to connect to directory")?,
    );

    let collector = Collector::new(
        Arc::clone(&directory) as Arc<dyn Directory>,
        config.directory.domain.clone(),
        config.collection.max_concurrency,
    );

    let cancel = collector.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight containers");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let result = collector.run().await.context("collection run failed")?;
    drop(collector);

    if let Ok(directory) = Arc::try_unwrap(directory) {
        directory.unbind().await;
    }

    let json = serde_json::to_string_pretty(&result).context("failed to serialise results")?;
    match output_override.or(config.collection.output) {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "results written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}").context("failed to write results")?;
        }
    }

    Ok(())
}

/// Print the enabled links of a raw gPLink value as JSON.
fn handle_links(domain: &str, raw: &str) -> anyhow::Result<()> {
    logging::init_cli("warn");

    let cache = PolicyNameCache::new();
    let links = resolve_links(Some(raw), domain, &cache);
    let json = serde_json::to_string_pretty(&links).context("failed to serialise links")?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{json}").context("failed to write links")?;
    Ok(())
}
