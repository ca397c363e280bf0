//! Configuration for the gateway.

use anyhow::{bail, Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Lowest per-client ceiling the gateway will run with, whatever is configured.
pub const MIN_REQUESTS_PER_MINUTE: u32 = 20;

/// Gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Caller authentication
    pub auth: AuthConfig,

    /// Chat session configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Per-recipient limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared bearer secret expected from the backend
    pub token: SecretString,

    /// Requests allowed per client identity per minute
    #[serde(default = "default_max_requests_per_minute")]
    pub max_requests_per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Session bridge base URL
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// Where the session provider keeps its credentials
    #[serde(default = "default_auth_dir")]
    pub auth_dir: PathBuf,

    /// Delay before reconnecting after a transient drop
    #[serde(default = "default_reconnect_delay", with = "humantime_serde")]
    pub reconnect_delay: Duration,

    /// Delay before retrying after a failed reconnect
    #[serde(default = "default_retry_delay", with = "humantime_serde")]
    pub retry_delay: Duration,

    /// Bridge event poll interval
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Minimum seconds between two sends to the same number
    #[serde(default = "default_min_seconds_between_same_number")]
    pub min_seconds_between_same_number: u64,

    /// How often idle limiter entries are swept
    #[serde(default = "default_sweep_interval", with = "humantime_serde")]
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default implementations
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            auth_dir: default_auth_dir(),
            reconnect_delay: default_reconnect_delay(),
            retry_delay: default_retry_delay(),
            poll_interval: default_poll_interval(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            min_seconds_between_same_number: default_min_seconds_between_same_number(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    10000
}

fn default_max_requests_per_minute() -> u32 {
    120
}

fn default_bridge_url() -> String {
    "http://wa-bridge:3000".into()
}

fn default_auth_dir() -> PathBuf {
    PathBuf::from("./auth")
}

fn default_reconnect_delay() -> Duration {
    Duration::from_secs(3)
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_min_seconds_between_same_number() -> u64 {
    60
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(300)
}

fn default_log_level() -> String {
    "info".into()
}

impl ServerConfig {
    /// Parsed listen address.
    pub fn ip(&self) -> Result<IpAddr> {
        self.listen_addr.parse().with_context(|| {
            format!(
                "SERVER__LISTEN_ADDR is not an IP address: {:?}",
                self.listen_addr
            )
        })
    }
}

impl AuthConfig {
    /// Effective per-client ceiling, never below the floor.
    pub fn requests_per_minute(&self) -> u32 {
        self.max_requests_per_minute.max(MIN_REQUESTS_PER_MINUTE)
    }
}

impl LimitsConfig {
    pub fn min_gap(&self) -> Duration {
        Duration::from_secs(self.min_seconds_between_same_number)
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        // Hosting platforms hand out the port as a bare PORT variable.
        let port = std::env::var("PORT").ok();

        let config = config::Config::builder()
            .add_source(environment())
            .set_override_option("server.port", port)
            .context("Failed to apply PORT override")?
            .build()
            .context("Failed to build configuration")?;

        Self::from_source(config)
    }

    /// Deserialize and validate an already-built configuration source.
    pub fn from_source(source: config::Config) -> Result<Self> {
        let config: Self = source
            .try_deserialize()
            .context("Failed to deserialize configuration (is AUTH__TOKEN set?)")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the gateway cannot safely run with.
    pub fn validate(&self) -> Result<()> {
        if self.auth.token.expose_secret().trim().is_empty() {
            bail!("AUTH__TOKEN must not be empty");
        }
        self.server.ip()?;
        if self.session.poll_interval.is_zero() {
            bail!("SESSION__POLL_INTERVAL must be greater than zero");
        }
        if self.limits.sweep_interval.is_zero() {
            bail!("LIMITS__SWEEP_INTERVAL must be greater than zero");
        }
        Ok(())
    }
}

/// Environment source with `__` separating nested sections.
fn environment() -> config::Environment {
    config::Environment::default()
        .separator("__")
        // try_parsing(true) would turn a token like 000123 into the number 123.
        // Keep strings as strings.
        .try_parsing(false)
}
