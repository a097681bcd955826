use config::{ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;

// Top-level settings container
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub booking: BookingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

// No url means the in-memory store
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub pool_size: u32,
    pub acquire_timeout_secs: u64,
}

// No url means the seat map cache is off
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub seat_map_ttl_secs: u64,
}

/// Limits applied to every booking attempt.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    pub max_seats_per_booking: usize,
    pub lock_wait_ms: u64,
}

impl BookingConfig {
    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            max_seats_per_booking: 10,
            lock_wait_ms: 2000,
        }
    }
}

// Flat view of the process environment, same names as the deployment files use
#[derive(Debug, Deserialize)]
struct EnvVars {
    host: String,
    port: u16,
    environment: String,
    rust_log: String,
    log_format: LogFormat,
    request_timeout_secs: u64,
    database_url: Option<String>,
    db_pool_size: u32,
    db_acquire_timeout_secs: u64,
    redis_url: Option<String>,
    seat_map_cache_ttl_secs: u64,
    booking_max_seats: usize,
    booking_lock_wait_ms: u64,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(Environment::default().try_parsing(true))
    }

    pub fn from_source(env: Environment) -> Result<Self, ConfigError> {
        let vars: EnvVars = config::Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8000_i64)?
            .set_default("environment", "development")?
            .set_default("rust_log", "showtime_booking=debug,tower_http=debug")?
            .set_default("log_format", "pretty")?
            .set_default("request_timeout_secs", 10_i64)?
            .set_default("db_pool_size", 20_i64)?
            .set_default("db_acquire_timeout_secs", 5_i64)?
            .set_default("seat_map_cache_ttl_secs", 5_i64)?
            .set_default("booking_max_seats", 10_i64)?
            .set_default("booking_lock_wait_ms", 2000_i64)?
            .add_source(env)
            .build()?
            .try_deserialize()?;

        if vars.booking_max_seats == 0 {
            return Err(ConfigError::Message(
                "BOOKING_MAX_SEATS must be at least 1".to_string(),
            ));
        }
        // Postgres reads a lock_timeout of 0 as "wait forever"
        if vars.booking_lock_wait_ms == 0 {
            return Err(ConfigError::Message(
                "BOOKING_LOCK_WAIT_MS must be at least 1".to_string(),
            ));
        }

        Ok(Config {
            app: AppConfig {
                host: vars.host,
                port: vars.port,
                environment: vars.environment,
                rust_log: vars.rust_log,
                log_format: vars.log_format,
                request_timeout_secs: vars.request_timeout_secs,
            },
            database: DatabaseConfig {
                url: non_empty(vars.database_url),
                pool_size: vars.db_pool_size,
                acquire_timeout_secs: vars.db_acquire_timeout_secs,
            },
            redis: RedisConfig {
                url: non_empty(vars.redis_url),
                seat_map_ttl_secs: vars.seat_map_cache_ttl_secs,
            },
            booking: BookingConfig {
                max_seats_per_booking: vars.booking_max_seats,
                lock_wait_ms: vars.booking_lock_wait_ms,
            },
        })
    }

    /// In-memory store, no cache, default limits.
    pub fn local() -> Self {
        Config {
            app: AppConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
                environment: "test".to_string(),
                rust_log: "showtime_booking=debug".to_string(),
                log_format: LogFormat::Pretty,
                request_timeout_secs: 10,
            },
            database: DatabaseConfig {
                url: None,
                pool_size: 5,
                acquire_timeout_secs: 5,
            },
            redis: RedisConfig {
                url: None,
                seat_map_ttl_secs: 5,
            },
            booking: BookingConfig::default(),
        }
    }
}
