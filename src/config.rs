use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// CORS allowed origins, comma separated. Unset or `*` allows any origin.
    pub cors_origins: Option<String>,

    /// Log level, used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Database URL. In-memory stores are used when unset.
    pub db_url: Option<String>,

    /// Largest accepted upload body, in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Outbound events buffered per realtime connection before it is
    /// considered a slow consumer
    #[serde(default = "default_peer_queue_capacity")]
    pub peer_queue_capacity: usize,

    /// Seconds between server pings on realtime connections (0 disables)
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// User recorded in the access history when a request names none
    #[serde(default = "default_user_id")]
    pub default_user_id: String,

    /// Number of recent documents returned when the request sets no limit
    #[serde(default = "default_recent_limit")]
    pub recent_limit: i64,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        // Try to load from app.env file first
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            // Fallback to .env file
            dotenvy::dotenv().ok();
        }

        // Load from environment variables using envy. Runs before tracing is
        // set up, so the caller reports the outcome.
        envy::from_env::<Config>().map_err(ConfigError::EnvError)
    }

    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Fallback tracing filter built from `log_level`
    pub fn log_filter(&self) -> String {
        format!("{},axum::rejection=trace", self.log_level.trim().to_lowercase())
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        match self.heartbeat_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            cors_origins: None,
            log_level: default_log_level(),
            service_name: default_service_name(),
            db_url: None,
            max_upload_bytes: default_max_upload_bytes(),
            peer_queue_capacity: default_peer_queue_capacity(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            default_user_id: default_user_id(),
            recent_limit: default_recent_limit(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    EnvError(envy::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::EnvError(e) => write!(f, "Environment variable error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "pdf-colab".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_peer_queue_capacity() -> usize {
    256
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_user_id() -> String {
    "default-user".to_string()
}

fn default_recent_limit() -> i64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_values_override_defaults() {
        let vars = vec![
            ("PORT".to_string(), "9100".to_string()),
            ("PEER_QUEUE_CAPACITY".to_string(), "4".to_string()),
            ("HEARTBEAT_INTERVAL_SECS".to_string(), "0".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.peer_queue_capacity, 4);
        assert_eq!(config.heartbeat_interval(), None);
        assert_eq!(config.default_user_id, "default-user");
        assert!(config.db_url.is_none());
    }

    #[test]
    fn defaults_match_the_frontend_contract() {
        let config = Config::default();
        assert_eq!(config.server_address(), "0.0.0.0:8000");
        assert_eq!(config.heartbeat_interval(), Some(Duration::from_secs(30)));
        assert_eq!(config.environment, "development");
        assert_eq!(config.log_filter(), "info,axum::rejection=trace");
    }

    #[test]
    fn log_level_feeds_the_fallback_filter() {
        let vars = vec![("LOG_LEVEL".to_string(), " DEBUG ".to_string())];
        let config: Config = envy::from_iter(vars).unwrap();
        assert_eq!(config.log_filter(), "debug,axum::rejection=trace");
    }
}
