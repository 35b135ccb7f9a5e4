//! Application configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables for production.
//! Config precedence: env vars > .env file > config.toml > defaults

use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

const DEFAULT_MAX_MESSAGE_LENGTH: u32 = 4000;
const DEFAULT_MAX_ATTACHMENT_COUNT: u32 = 10;
const DEFAULT_MAX_POLL_OPTIONS: u32 = 10;
const DEFAULT_POLL_DURATION_HOURS: u32 = 24;
const DEFAULT_POLL_COOLDOWN_HOURS: u32 = 24;
const DEFAULT_MAX_PIN_DAYS: u32 = 365;
const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 5000;
const DEFAULT_MAX_WRITE_RETRIES: u32 = 5;
const DEFAULT_BROADCAST_CAPACITY: usize = 10_000;
const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 45_000;

/// Get the global application configuration.
///
/// # Panics
/// Panics if config has not been initialized via [`init`].
pub fn get() -> &'static AppConfig {
    CONFIG
        .get()
        .expect("Config not initialized. Call brainiacs_common::config::init() first.")
}

/// Initialize the global configuration from environment.
///
/// Should be called once at application startup, before any other code accesses config.
pub fn init() -> Result<&'static AppConfig, config::ConfigError> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    let cfg = config::Config::builder()
        // Defaults
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5000)?
        .set_default("server.gateway_port", 5001)?
        .set_default("database.url", "sqlite://brainiacs.db?mode=rwc")?
        .set_default("database.max_connections", 20)?
        .set_default("database.min_connections", 1)?
        .set_default("database.operation_timeout_ms", DEFAULT_OPERATION_TIMEOUT_MS)?
        .set_default("database.max_write_retries", DEFAULT_MAX_WRITE_RETRIES)?
        .set_default("limits.max_message_length", DEFAULT_MAX_MESSAGE_LENGTH)?
        .set_default("limits.max_attachment_count", DEFAULT_MAX_ATTACHMENT_COUNT)?
        .set_default("limits.max_poll_options", DEFAULT_MAX_POLL_OPTIONS)?
        .set_default("limits.poll_duration_hours", DEFAULT_POLL_DURATION_HOURS)?
        .set_default("limits.poll_cooldown_hours", DEFAULT_POLL_COOLDOWN_HOURS)?
        .set_default("limits.max_pin_days", DEFAULT_MAX_PIN_DAYS)?
        .set_default("gateway.broadcast_capacity", DEFAULT_BROADCAST_CAPACITY as u64)?
        .set_default("gateway.heartbeat_interval_ms", DEFAULT_HEARTBEAT_INTERVAL_MS)?
        // Optional config file
        .add_source(config::File::with_name("config").required(false))
        // Environment variables (BRAINIACS_SERVER__PORT, BRAINIACS_DATABASE__URL, etc.)
        .add_source(
            config::Environment::with_prefix("BRAINIACS")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = cfg.try_deserialize()?;
    Ok(CONFIG.get_or_init(|| app_config))
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub limits: LimitsConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    /// REST API port.
    pub port: u16,
    /// WebSocket gateway port.
    pub gateway_port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// `postgres://…` or `sqlite://…` (lite mode)
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Upper bound for a single store round-trip.
    pub operation_timeout_ms: u64,
    /// Attempts for a versioned board write before giving up.
    pub max_write_retries: u32,
}

impl DatabaseConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    pub max_message_length: u32,
    pub max_attachment_count: u32,
    pub max_poll_options: u32,
    /// Lifetime of a poll from creation.
    pub poll_duration_hours: u32,
    /// Rolling window in which a creator may open one poll per board.
    pub poll_cooldown_hours: u32,
    /// Longest pin a client may ask for.
    pub max_pin_days: u32,
}

impl LimitsConfig {
    pub fn poll_duration(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.poll_duration_hours))
    }

    pub fn poll_cooldown(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.poll_cooldown_hours))
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            max_attachment_count: DEFAULT_MAX_ATTACHMENT_COUNT,
            max_poll_options: DEFAULT_MAX_POLL_OPTIONS,
            poll_duration_hours: DEFAULT_POLL_DURATION_HOURS,
            poll_cooldown_hours: DEFAULT_POLL_COOLDOWN_HOURS,
            max_pin_days: DEFAULT_MAX_PIN_DAYS,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// Capacity of the shared fan-out channel. Slow connections that fall
    /// further behind than this skip events.
    pub broadcast_capacity: usize,
    /// Advertised to clients in `hello`.
    pub heartbeat_interval_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
        }
    }
}

/// Store settings used by `brainiacs-db` independent of the global config,
/// so tests can build a store without calling [`init`].
#[derive(Debug, Clone, Copy)]
pub struct StoreSettings {
    pub operation_timeout: Duration,
    pub max_write_retries: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
            max_write_retries: DEFAULT_MAX_WRITE_RETRIES,
        }
    }
}

impl From<&DatabaseConfig> for StoreSettings {
    fn from(db: &DatabaseConfig) -> Self {
        Self {
            operation_timeout: db.operation_timeout(),
            max_write_retries: db.max_write_retries.max(1),
        }
    }
}
