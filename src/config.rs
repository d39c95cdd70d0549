use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BATCH_CHUNK_SIZE: usize = 100;
const DEFAULT_RESERVATION_TTL_HOURS: i64 = 24;
const CONFIG_FILE: &str = "config/engine";

/// Engine configuration, layered from defaults, an optional config file and
/// `INVENTORY_`-prefixed environment variables, validated on load.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct EngineConfig {
    /// Store connection URL (Postgres in production, SQLite in tests).
    pub database_url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Lines per transaction in `apply_deltas`. A tuning constant, not a
    /// correctness parameter.
    #[validate(range(min = 1, max = 10000))]
    #[serde(default = "default_batch_chunk_size")]
    pub batch_chunk_size: usize,

    /// Default hold duration for reservations created without an explicit
    /// expiry.
    #[validate(range(min = 1, max = 8760))]
    #[serde(default = "default_reservation_ttl_hours")]
    pub reservation_ttl_hours: i64,

    /// Emit JSON-formatted logs instead of human-readable ones.
    #[serde(default)]
    pub log_json: bool,
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_min_connections() -> u32 {
    DEFAULT_MIN_CONNECTIONS
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_batch_chunk_size() -> usize {
    DEFAULT_BATCH_CHUNK_SIZE
}

fn default_reservation_ttl_hours() -> i64 {
    DEFAULT_RESERVATION_TTL_HOURS
}

impl EngineConfig {
    /// Loads configuration from `config/engine.{toml,yaml,...}` (if present)
    /// and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let config: EngineConfig = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix("INVENTORY"))
            .build()?
            .try_deserialize()?;

        config
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            batch_chunk_size = config.batch_chunk_size,
            reservation_ttl_hours = config.reservation_ttl_hours,
            "Engine configuration loaded"
        );
        Ok(config)
    }

    /// Configuration with defaults for everything but the store URL.
    /// SQLite URLs are pinned to a single pooled connection so in-memory
    /// databases survive across queries.
    pub fn for_database(database_url: impl Into<String>) -> Self {
        let database_url = database_url.into();
        let (max_connections, min_connections) = if database_url.starts_with("sqlite:") {
            (1, 1)
        } else {
            (DEFAULT_MAX_CONNECTIONS, DEFAULT_MIN_CONNECTIONS)
        };
        Self {
            database_url,
            max_connections,
            min_connections,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            batch_chunk_size: DEFAULT_BATCH_CHUNK_SIZE,
            reservation_ttl_hours: DEFAULT_RESERVATION_TTL_HOURS,
            log_json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_urls_get_single_connection() {
        let config = EngineConfig::for_database("sqlite::memory:");
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.batch_chunk_size, DEFAULT_BATCH_CHUNK_SIZE);
    }

    #[test]
    fn validation_rejects_zero_chunk_size() {
        let mut config = EngineConfig::for_database("sqlite::memory:");
        config.batch_chunk_size = 0;
        assert!(config.validate().is_err());
    }
}
