//! Client settings and configuration structures.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all client settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Entity cache and eviction configuration
    pub cache: CacheSettings,

    /// Gateway intake configuration
    pub gateway: GatewaySettings,

    /// REST executor configuration
    pub rest: RestSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Entity cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Messages kept per channel before least recently used ones are evicted
    pub message_cache_size: usize,

    /// Seconds without access before members, users and presences are
    /// evicted (0 disables)
    pub member_idle_secs: u64,

    /// Seconds between background eviction sweeps (0 disables the sweeper)
    pub eviction_interval_secs: u64,
}

/// Gateway intake configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    /// Number of ordered worker lanes guild traffic is sharded onto
    pub dispatch_lanes: usize,

    /// Queued dispatches per lane before the reader waits
    pub lane_capacity: usize,

    /// Domain events buffered before processors wait for the subscriber
    pub event_buffer: usize,
}

/// REST executor configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RestSettings {
    /// Whether cache misses may fall back to REST
    pub enabled: bool,

    /// API base URL, e.g. "https://discord.com/api/v10"
    pub base_url: String,

    /// Bot token; required when REST is enabled
    #[serde(default)]
    pub token: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// User agent sent with every request
    pub user_agent: String,
}

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. Built-in defaults
    /// 2. config/default.toml (base configuration)
    /// 3. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 4. `APP__` environment variables
    /// 5. `DISCORD_TOKEN` / `DISCORD_API_URL` (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if the loaded settings fail validation.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Self::read()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Like [`Settings::load`], without validating the result.
    pub fn read() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("cache.message_cache_size", 100_i64)?
            .set_default("cache.member_idle_secs", 0_i64)?
            .set_default("cache.eviction_interval_secs", 60_i64)?
            .set_default("gateway.dispatch_lanes", 8_i64)?
            .set_default("gateway.lane_capacity", 256_i64)?
            .set_default("gateway.event_buffer", 1024_i64)?
            .set_default("rest.enabled", true)?
            .set_default("rest.base_url", "https://discord.com/api/v10")?
            .set_default("rest.timeout_secs", 15_i64)?
            .set_default("rest.user_agent", concat!("discord-state/", env!("CARGO_PKG_VERSION")))?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__GATEWAY__DISPATCH_LANES=4 -> gateway.dispatch_lanes = 4
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("rest.token", std::env::var("DISCORD_TOKEN").ok())?
            .set_override_option("rest.base_url", std::env::var("DISCORD_API_URL").ok())?
            .build()?
            .try_deserialize()
    }

    /// Reject settings the client cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.dispatch_lanes == 0 {
            return Err(ConfigError::Message(
                "gateway.dispatch_lanes must be at least 1".into(),
            ));
        }
        if self.gateway.lane_capacity == 0 || self.gateway.event_buffer == 0 {
            return Err(ConfigError::Message(
                "gateway queue capacities must be at least 1".into(),
            ));
        }
        if self.rest.enabled && self.rest.token.trim().is_empty() {
            return Err(ConfigError::Message(
                "rest.token (DISCORD_TOKEN) is required when REST is enabled".into(),
            ));
        }
        Ok(())
    }

    /// Settings for a client that never touches the network.
    pub fn offline() -> Self {
        Self {
            rest: RestSettings {
                enabled: false,
                ..RestSettings::default()
            },
            ..Self::default()
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            gateway: GatewaySettings::default(),
            rest: RestSettings::default(),
            environment: "development".into(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            message_cache_size: 100,
            member_idle_secs: 0,
            eviction_interval_secs: 60,
        }
    }
}

impl CacheSettings {
    /// Idle threshold for member-like kinds, if enabled.
    pub fn member_idle(&self) -> Option<Duration> {
        (self.member_idle_secs > 0).then(|| Duration::from_secs(self.member_idle_secs))
    }

    /// Sweep interval, if the background sweeper is enabled.
    pub fn eviction_interval(&self) -> Option<Duration> {
        (self.eviction_interval_secs > 0).then(|| Duration::from_secs(self.eviction_interval_secs))
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            dispatch_lanes: 8,
            lane_capacity: 256,
            event_buffer: 1024,
        }
    }
}

impl Default for RestSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://discord.com/api/v10".into(),
            token: String::new(),
            timeout_secs: 15,
            user_agent: concat!("discord-state/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl RestSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_settings_are_valid() {
        assert!(Settings::offline().validate().is_ok());
    }

    #[test]
    fn test_rest_requires_token() {
        let settings = Settings::default();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.rest.token = "abc".into();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_lanes_rejected() {
        let mut settings = Settings::offline();
        settings.gateway.dispatch_lanes = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_disabled_durations() {
        let cache = CacheSettings {
            member_idle_secs: 0,
            eviction_interval_secs: 0,
            ..CacheSettings::default()
        };
        assert!(cache.member_idle().is_none());
        assert!(cache.eviction_interval().is_none());
    }
}
