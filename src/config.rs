//! Configuration loading and validation.
//!
//! Loads `config.toml` from `$ADTREE_CONFIG_PATH` or `~/.adtree/config.toml`.
//! Every section has defaults, so a missing file or an empty one is valid.
//!
//! Precedence: env vars > config file > defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Directory connection settings.
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Collection run settings.
    #[serde(default)]
    pub collection: CollectionConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How to reach and bind to the directory.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// Domain controller host name or address.
    #[serde(default)]
    pub host: String,

    /// Port; defaults to 389, or 636 with `use_ssl`.
    #[serde(default)]
    pub port: Option<u16>,

    /// Connect with `ldaps://`.
    #[serde(default)]
    pub use_ssl: bool,

    /// Upgrade a plain connection with StartTLS.
    #[serde(default)]
    pub use_starttls: bool,

    /// Bind DN; empty or absent means anonymous.
    #[serde(default)]
    pub bind_dn: Option<String>,

    /// Name of the environment variable holding the bind password.
    #[serde(default = "default_password_env")]
    pub password_env: String,

    /// Naming context searched when no base is given (e.g. `DC=corp,DC=local`).
    #[serde(default)]
    pub base_dn: String,

    /// Domain name appended to policy names (e.g. `CORP.LOCAL`).
    #[serde(default)]
    pub domain: String,

    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: None,
            use_ssl: false,
            use_starttls: false,
            bind_dn: None,
            password_env: default_password_env(),
            base_dn: String::new(),
            domain: String::new(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl DirectoryConfig {
    /// Effective port.
    pub fn port(&self) -> u16 {
        match (self.port, self.use_ssl) {
            (Some(port), _) => port,
            (None, true) => 636,
            (None, false) => 389,
        }
    }

    /// Connection URL.
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "ldaps" } else { "ldap" };
        format!("{scheme}://{}:{}", self.host, self.port())
    }
}

/// Collection run settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionConfig {
    /// Upper bound on containers processed at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Where to write results; stdout when absent.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            output: None,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for rotated JSON logs; console only when absent.
    #[serde(default)]
    pub logs_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            logs_dir: None,
        }
    }
}

fn default_password_env() -> String {
    "ADTREE_BIND_PASSWORD".to_owned()
}
fn default_connect_timeout() -> u64 {
    30
}
fn default_max_concurrency() -> usize {
    10
}
fn default_log_level() -> String {
    "info".to_owned()
}

impl Config {
    /// Parse a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed.
    pub fn from_toml(toml_str: &str) -> anyhow::Result<Self> {
        toml::from_str(toml_str).map_err(|e| anyhow::anyhow!("failed to parse config TOML: {e}"))
    }

    /// Apply environment overrides using `env` to look variables up.
    ///
    /// Takes a resolver so tests need not touch the process environment.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("ADTREE_HOST") {
            self.directory.host = v;
        }
        if let Some(v) = env("ADTREE_DOMAIN") {
            self.directory.domain = v;
        }
        if let Some(v) = env("ADTREE_BASE_DN") {
            self.directory.base_dn = v;
        }
        if let Some(v) = env("ADTREE_BIND_DN") {
            self.directory.bind_dn = Some(v);
        }
        if let Some(v) = env("ADTREE_MAX_CONCURRENCY") {
            match v.parse() {
                Ok(n) => self.collection.max_concurrency = n,
                Err(_) => tracing::warn!(
                    var = "ADTREE_MAX_CONCURRENCY",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
    }

    /// Check that a collection run can start with these settings.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first unusable field.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.directory.host.trim().is_empty() {
            anyhow::bail!("directory.host must be set");
        }
        if self.directory.domain.trim().is_empty() {
            anyhow::bail!("directory.domain must be set");
        }
        if self.directory.base_dn.trim().is_empty() {
            anyhow::bail!("directory.base_dn must be set");
        }
        if self.collection.max_concurrency == 0 {
            anyhow::bail!("collection.max_concurrency must be at least 1");
        }
        Ok(())
    }

    /// Bind password from the configured environment variable, if set.
    pub fn bind_password(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        env(&self.directory.password_env)
    }
}

/// Load config from `path`; a missing file yields defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            tracing::info!(path = %path.display(), "loading config from file");
            toml::from_str(&contents)
                .map_err(|e| anyhow::anyhow!("failed to parse config at {}: {e}", path.display()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => Err(anyhow::anyhow!(
            "failed to read config at {}: {e}",
            path.display()
        )),
    }
}

/// Resolve the config path: `$ADTREE_CONFIG_PATH`, else `~/.adtree/config.toml`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_path(env: impl Fn(&str) -> Option<String>) -> anyhow::Result<PathBuf> {
    if let Some(p) = env("ADTREE_CONFIG_PATH") {
        return Ok(PathBuf::from(p));
    }
    Ok(config_dir()?.join("config.toml"))
}

/// Resolve the default config directory (`~/.adtree/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".adtree"))
}
