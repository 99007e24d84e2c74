//! Server configuration loading from file and environment variables.

use roster_db::DbRuntimeSettings;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Admin surface settings.
    #[serde(default)]
    pub admin: AdminConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Attempts made by each connection acquisition before failing.
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    /// Fixed delay between acquisition attempts.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// How long one attempt waits for a free pooled connection.
    #[serde(default = "default_checkout_timeout_ms")]
    pub checkout_timeout_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "roster_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Admin surface configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    /// Token required in `X-Admin-Token` for introspection endpoints.
    /// When unset those endpoints are open.
    #[serde(default)]
    pub token: Option<String>,

    /// Static page served at `/admin`.
    #[serde(default = "default_admin_page")]
    pub page_path: PathBuf,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8000
}

fn default_db_path() -> String {
    "roster.db".to_string()
}

fn default_pool_max_size() -> u32 {
    DbRuntimeSettings::default().pool_max_size
}

fn default_busy_timeout_ms() -> u64 {
    DbRuntimeSettings::default().busy_timeout_ms
}

fn default_connect_attempts() -> u32 {
    DbRuntimeSettings::default().connect_attempts
}

fn default_retry_delay_ms() -> u64 {
    DbRuntimeSettings::default().retry_delay_ms
}

fn default_checkout_timeout_ms() -> u64 {
    DbRuntimeSettings::default().checkout_timeout_ms
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_admin_page() -> PathBuf {
    PathBuf::from("static/admin.html")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            pool_max_size: default_pool_max_size(),
            busy_timeout_ms: default_busy_timeout_ms(),
            connect_attempts: default_connect_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            checkout_timeout_ms: default_checkout_timeout_ms(),
        }
    }
}

impl DatabaseConfig {
    /// The pool and retry tunables for [`roster_db::Database::open`].
    pub fn runtime_settings(&self) -> DbRuntimeSettings {
        DbRuntimeSettings {
            busy_timeout_ms: self.busy_timeout_ms,
            pool_max_size: self.pool_max_size,
            connect_attempts: self.connect_attempts,
            retry_delay_ms: self.retry_delay_ms,
            checkout_timeout_ms: self.checkout_timeout_ms,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            token: None,
            page_path: default_admin_page(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults, then
/// applies environment overrides (see [`apply_env_overrides`]).
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Applies overrides read through `lookup`.
///
/// - `ROSTER_HOST`, `ROSTER_PORT` override `server.*`
/// - `ROSTER_DB_PATH`, `ROSTER_DB_POOL_MAX_SIZE`, `ROSTER_DB_CONNECT_ATTEMPTS`,
///   `ROSTER_DB_RETRY_DELAY_MS`, `ROSTER_DB_CHECKOUT_TIMEOUT_MS` override
///   `database.*`
/// - `ROSTER_LOG_LEVEL`, `ROSTER_LOG_JSON` override `logging.*`
/// - `ROSTER_ADMIN_TOKEN`, `ROSTER_ADMIN_PAGE` override `admin.*`
///
/// Values that fail to parse are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    fn parsed<T: std::str::FromStr>(value: Option<String>) -> Option<T> {
        value.and_then(|v| v.trim().parse().ok())
    }

    if let Some(host) = parsed(lookup("ROSTER_HOST")) {
        config.server.host = host;
    }
    if let Some(port) = parsed(lookup("ROSTER_PORT")) {
        config.server.port = port;
    }
    if let Some(db_path) = lookup("ROSTER_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(size) = parsed(lookup("ROSTER_DB_POOL_MAX_SIZE")) {
        config.database.pool_max_size = size;
    }
    if let Some(attempts) = parsed(lookup("ROSTER_DB_CONNECT_ATTEMPTS")) {
        config.database.connect_attempts = attempts;
    }
    if let Some(delay) = parsed(lookup("ROSTER_DB_RETRY_DELAY_MS")) {
        config.database.retry_delay_ms = delay;
    }
    if let Some(wait) = parsed(lookup("ROSTER_DB_CHECKOUT_TIMEOUT_MS")) {
        config.database.checkout_timeout_ms = wait;
    }
    if let Some(level) = lookup("ROSTER_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("ROSTER_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(token) = lookup("ROSTER_ADMIN_TOKEN") {
        config.admin.token = Some(token).filter(|t| !t.is_empty());
    }
    if let Some(page) = lookup("ROSTER_ADMIN_PAGE") {
        config.admin.page_path = PathBuf::from(page);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.database.path, "roster.db");
        assert_eq!(config.database.connect_attempts, 5);
        assert_eq!(config.database.retry_delay_ms, 2_000);
        assert_eq!(config.database.checkout_timeout_ms, 250);
        assert!(config.admin.token.is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [database]
            path = "/var/lib/roster/users.db"
            connect_attempts = 2

            [admin]
            token = "s3cret"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, "/var/lib/roster/users.db");
        assert_eq!(config.database.connect_attempts, 2);
        assert_eq!(config.database.retry_delay_ms, 2_000);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.admin.token.as_deref(), Some("s3cret"));
    }

    #[test]
    fn env_overrides_win_and_bad_values_are_ignored() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            lookup_from(&[
                ("ROSTER_PORT", "9100"),
                ("ROSTER_HOST", "not-an-ip"),
                ("ROSTER_DB_PATH", "/tmp/r.db"),
                ("ROSTER_DB_RETRY_DELAY_MS", "250"),
                ("ROSTER_DB_CHECKOUT_TIMEOUT_MS", "75"),
                ("ROSTER_LOG_JSON", "1"),
                ("ROSTER_ADMIN_TOKEN", ""),
            ]),
        );

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, default_host());
        assert_eq!(config.database.path, "/tmp/r.db");
        assert_eq!(config.database.retry_delay_ms, 250);
        assert_eq!(config.database.checkout_timeout_ms, 75);
        assert!(config.logging.json);
        assert!(config.admin.token.is_none(), "empty token means unset");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        assert!(matches!(
            load_config(path.to_str()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn runtime_settings_carry_retry_policy() {
        let config = DatabaseConfig {
            connect_attempts: 3,
            retry_delay_ms: 10,
            ..DatabaseConfig::default()
        };
        let settings = config.runtime_settings();
        assert_eq!(settings.connect_attempts, 3);
        assert_eq!(settings.retry_delay_ms, 10);
        assert_eq!(settings.pool_max_size, 8);
        assert_eq!(settings.checkout_timeout_ms, 250);
    }
}
