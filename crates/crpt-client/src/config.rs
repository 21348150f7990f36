use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ClientError;

/// The production "create document" endpoint.
pub const DEFAULT_API_URL: &str = "https://ismp.crpt.ru/api/v3/lk/documents/create";

/// Length of the rate-limit window. The limit applies per one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    pub fn as_duration(self) -> Duration {
        match self {
            Self::Seconds => Duration::from_secs(1),
            Self::Minutes => Duration::from_secs(60),
            Self::Hours => Duration::from_secs(60 * 60),
            Self::Days => Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Configuration for crpt.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (CRPT_* prefix)
/// 3. Config file (~/.config/crpt/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Endpoint documents are POSTed to.
    ///
    /// Can be set via:
    /// - ENV: CRPT_API_URL
    /// - Config: api_url = "..."
    pub api_url: String,

    /// Maximum number of requests per `time_unit`.
    ///
    /// Can be set via:
    /// - ENV: CRPT_REQUEST_LIMIT
    /// - Config: request_limit = 5
    pub request_limit: usize,

    /// Window over which `request_limit` applies.
    ///
    /// Can be set via:
    /// - ENV: CRPT_TIME_UNIT
    /// - Config: time_unit = "minutes"
    pub time_unit: TimeUnit,

    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,

    /// Logger settings, passed straight to twyg.
    pub logging: twyg::Opts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_limit: 5,
            time_unit: TimeUnit::Minutes,
            request_timeout_secs: 30,
            logging: twyg::Opts::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default file and environment variables.
    ///
    /// Searches for config file at: ~/.config/crpt/config.toml
    /// Reads environment variables with CRPT_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from `path` (skipped if missing) and environment
    /// variables.
    ///
    /// This is used when the --config CLI flag is provided.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if path.exists() {
            let path_str = path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("crpt");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;

        Ok(config)
    }

    /// The rate-limit window: one `time_unit`.
    pub fn window(&self) -> Duration {
        self.time_unit.as_duration()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Checks the values a client cannot work without.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.request_limit == 0 {
            return Err(ClientError::InvalidConfig(
                "request_limit must be at least 1".to_string(),
            ));
        }
        if self.api_url.trim().is_empty() {
            return Err(ClientError::InvalidConfig(
                "api_url must not be empty".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/crpt/config.toml
/// - macOS: ~/Library/Application Support/crpt/config.toml
/// - Windows: %APPDATA%\crpt\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("crpt")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# crpt Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (CRPT_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Endpoint documents are submitted to
#
# Can also be set via:
# - Environment: CRPT_API_URL=https://...
api_url = "https://ismp.crpt.ru/api/v3/lk/documents/create"

# At most `request_limit` requests are sent per `time_unit`.
# Further submissions wait until the oldest request leaves the window.
#
# time_unit is one of: seconds, minutes, hours, days
request_limit = 5
time_unit = "minutes"

# HTTP timeout for a single request, in seconds
request_timeout_secs = 30
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    ensure_config_file_at(&config_file_path())
}

/// Create the example config at `path` if nothing is there yet.
pub fn ensure_config_file_at(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(path, example_config()).context("Failed to write config file")?;

    Ok(true)
}
