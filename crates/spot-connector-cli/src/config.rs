/*
[INPUT]:  YAML configuration file and credential environment variables
[OUTPUT]: Parsed connector configuration and client settings
[POS]:    Configuration layer - connector setup
[UPDATE]: When adding new configuration options
*/

use std::time::Duration;

use serde::{Deserialize, Serialize};
use spot_connector::http::client::DEFAULT_BASE_URL;
use spot_connector::{ClientConfig, Credentials, RetryPolicy, TimeSyncConfig};

pub const API_KEY_ENV: &str = "SPOT_API_KEY";
pub const API_SECRET_ENV: &str = "SPOT_API_SECRET";

/// Top-level configuration for the connector
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectorConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    /// Correct signed request timestamps by the measured server offset
    #[serde(default)]
    pub use_server_time_offset: bool,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default)]
    pub time_sync: TimeSyncSettings,
}

/// Server time synchronization settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeSyncSettings {
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    #[serde(default = "default_trust_threshold_ms")]
    pub trust_threshold_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for TimeSyncSettings {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
            trust_threshold_ms: default_trust_threshold_ms(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_refresh_interval_ms() -> u64 {
    30_000
}

fn default_trust_threshold_ms() -> u64 {
    1_000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    50
}

fn default_max_backoff_ms() -> u64 {
    1_000
}

impl ConnectorConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.time_sync.max_attempts == 0 {
            anyhow::bail!("time_sync.max_attempts must be at least 1");
        }
        if self.time_sync.trust_threshold_ms == 0 {
            anyhow::bail!("time_sync.trust_threshold_ms must be positive");
        }
        if self.api_key.is_some() != self.api_secret.is_some() {
            anyhow::bail!("api_key and api_secret must be set together");
        }
        Ok(())
    }

    /// Fill missing credentials from `SPOT_API_KEY` / `SPOT_API_SECRET`
    pub fn with_env_credentials(mut self) -> Self {
        if self.api_key.is_none() && self.api_secret.is_none() {
            self.api_key = std::env::var(API_KEY_ENV).ok();
            self.api_secret = std::env::var(API_SECRET_ENV).ok();
        }
        self
    }

    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.api_key, &self.api_secret) {
            (Some(key), Some(secret)) => Some(Credentials::new(key, secret)),
            _ => None,
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        let settings = &self.time_sync;
        let time_sync = TimeSyncConfig {
            enabled: self.use_server_time_offset,
            refresh_interval: Duration::from_millis(settings.refresh_interval_ms),
            trust_threshold: Duration::from_millis(settings.trust_threshold_ms),
            retry: RetryPolicy {
                max_attempts: settings.max_attempts,
                initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
                max_backoff: Duration::from_millis(settings.max_backoff_ms),
            },
        };

        ClientConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            time_sync,
            ..ClientConfig::default()
        }
    }
}
