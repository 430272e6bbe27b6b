//! Log setup for collection runs.
//!
//! The final subscriber depends on `[logging]` in the config file, which is
//! not known until the config has been read. Startup therefore goes through
//! [`with_startup_logging`], a stderr subscriber scoped to config loading, and
//! then installs the global one:
//! - [`init_production`] when `logs_dir` is set: stderr plus a daily JSON file
//!   that keeps a record of every run
//! - [`init_cli`] otherwise: stderr only
//!
//! Results go to stdout or the output file, never through `tracing`.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keeps the JSON file writer alive; drop it after the run to flush.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Run `f` with stderr logging active on the current thread only.
///
/// Used around config loading so that override warnings are visible before
/// the global subscriber exists.
pub fn with_startup_logging<T>(default_level: &str, f: impl FnOnce() -> T) -> T {
    with_startup_writer(default_level, std::io::stderr, f)
}

/// [`with_startup_logging`] with a caller-chosen writer.
pub fn with_startup_writer<W, T>(default_level: &str, writer: W, f: impl FnOnce() -> T) -> T
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_writer(writer)
        .with_ansi(false)
        .finish();
    tracing::subscriber::with_default(subscriber, f)
}

/// Log to stderr and to `{logs_dir}/adtree.log.YYYY-MM-DD` as JSON.
///
/// `RUST_LOG` takes precedence over `default_level`.
///
/// # Errors
///
/// Fails if `logs_dir` cannot be created or a global subscriber is already
/// installed.
pub fn init_production(logs_dir: &Path, default_level: &str) -> anyhow::Result<LoggingGuard> {
    std::fs::create_dir_all(logs_dir).map_err(|e| {
        anyhow::anyhow!(
            "failed to create logs directory {}: {e}",
            logs_dir.display()
        )
    })?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(logs_dir, "adtree.log"));

    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(file_writer),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;

    Ok(LoggingGuard { _guard: guard })
}

/// Log to stderr only. An already installed subscriber is left in place.
pub fn init_cli(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_writer(std::io::stderr)
        .try_init();
}
