//! Configuration for the snapshot service.
//!
//! Loaded from a YAML file with environment variable interpolation and
//! validated at startup.
//!
//! # Usage
//!
//! ```rust,ignore
//! use psx_snapshot::config::load_config;
//!
//! // Load from default path (config.yaml)
//! let config = load_config(None)?;
//!
//! // Access configuration values
//! println!("HTTP port: {}", config.server.http_port);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream feed configuration.
    #[serde(default)]
    pub feeds: FeedsConfig,
    /// Snapshot store configuration.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Background refresh configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port for the read-only JSON endpoints.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Bind address.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            bind_address: default_bind_address(),
        }
    }
}

/// Upstream feed configuration.
///
/// Both feeds reject requests without a browser-like `User-Agent`, and both
/// are always called with the bounded `timeout_secs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedsConfig {
    /// Market-watch quote table endpoint (primary feed).
    #[serde(default = "default_market_watch_url")]
    pub market_watch_url: String,
    /// Symbol directory endpoint (reference feed).
    #[serde(default = "default_symbols_url")]
    pub symbols_url: String,
    /// User-Agent header sent with every feed request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Total request timeout in seconds. Must be nonzero.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            market_watch_url: default_market_watch_url(),
            symbols_url: default_symbols_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Snapshot store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database path. Created if missing.
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Maximum pool connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Refresh cadence policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerMode {
    /// Sleep a fixed duration between cycles.
    Interval,
    /// Run once per day at a configured wall-clock time.
    Daily,
}

/// Background refresh configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Cadence policy.
    #[serde(default = "default_scheduler_mode")]
    pub mode: SchedulerMode,
    /// Seconds between cycles in `interval` mode. Must be nonzero.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Daily trigger time (`HH:MM`, 24-hour) in `daily` mode.
    #[serde(default = "default_daily_time")]
    pub daily_time: String,
    /// UTC offset in hours for the daily trigger time. Defaults to Pakistan
    /// Standard Time.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mode: default_scheduler_mode(),
            interval_secs: default_interval_secs(),
            daily_time: default_daily_time(),
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}

const fn default_http_port() -> u16 {
    8080
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_market_watch_url() -> String {
    "https://dps.psx.com.pk/market-watch".to_string()
}

fn default_symbols_url() -> String {
    "https://dps.psx.com.pk/symbols".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

const fn default_timeout_secs() -> u64 {
    20
}

fn default_db_path() -> String {
    "./data/psx.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

const fn default_scheduler_mode() -> SchedulerMode {
    SchedulerMode::Interval
}

const fn default_interval_secs() -> u64 {
    300
}

fn default_daily_time() -> String {
    "17:30".to_string()
}

const fn default_utc_offset_hours() -> i32 {
    5
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to "config.yaml".
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or("config.yaml");

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    let interpolated = interpolate_env_vars(&contents);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;

    Ok(config)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let mut result = input.to_string();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    for cap in re.captures_iter(input) {
        let Some(full_match) = cap.get(0) else {
            continue;
        };
        let Some(var_match) = cap.get(1) else {
            continue;
        };
        let full_match = full_match.as_str();
        let var_name = var_match.as_str();
        let default_value = cap.get(2).map(|m| m.as_str());

        let value = match std::env::var(var_name) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.map_or_else(String::new, str::to_string),
        };

        result = result.replace(full_match, &value);
    }

    result
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.feeds.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "feeds.timeout_secs must be nonzero; feed requests require a bounded timeout"
                .to_string(),
        ));
    }

    if config.feeds.market_watch_url.is_empty() || config.feeds.symbols_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "feed URLs must not be empty".to_string(),
        ));
    }

    if config.scheduler.interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "scheduler.interval_secs must be nonzero".to_string(),
        ));
    }

    if parse_daily_time(&config.scheduler.daily_time).is_none() {
        return Err(ConfigError::ValidationError(format!(
            "scheduler.daily_time '{}' is not a valid HH:MM time",
            config.scheduler.daily_time
        )));
    }

    if config.scheduler.utc_offset_hours.abs() > 14 {
        return Err(ConfigError::ValidationError(
            "scheduler.utc_offset_hours must be within ±14".to_string(),
        ));
    }

    if config.persistence.max_connections == 0 {
        return Err(ConfigError::ValidationError(
            "persistence.max_connections must be nonzero".to_string(),
        ));
    }

    Ok(())
}

/// Parse an `HH:MM` wall-clock time.
#[must_use]
pub fn parse_daily_time(value: &str) -> Option<chrono::NaiveTime> {
    chrono::NaiveTime::parse_from_str(value, "%H:%M").ok()
}
