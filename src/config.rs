use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use config::{Config, Environment, File};
pub use config::ConfigError;
use serde::Deserialize;

use crate::errors::{Error, Result};
use crate::gateway::RetryPolicy;
use crate::order::{Validator, DEFAULT_QUOTE_SUFFIX};
use crate::strategy::oco::OcoConfig;

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Settings {
    /// Symbol rules
    #[serde(default)]
    pub validation: ValidationConfig,
    /// OCO monitoring parameters
    #[serde(default)]
    pub oco: OcoSettings,
    /// Grid/TWAP parameters
    #[serde(default)]
    pub batch: BatchSettings,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
    /// Paper venue configuration
    #[serde(default)]
    pub paper: PaperConfig,
}

#[derive(Debug, Deserialize)]
pub struct ValidationConfig {
    /// Quote asset every symbol must end with (e.g. "USDT")
    #[serde(default = "default_quote_suffix")]
    pub quote_suffix: String,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            quote_suffix: default_quote_suffix(),
        }
    }
}

fn default_quote_suffix() -> String {
    DEFAULT_QUOTE_SUFFIX.to_string()
}

#[derive(Debug, Deserialize)]
pub struct OcoSettings {
    /// Delay between two status polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Give up monitoring after this many seconds (unbounded when unset)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Attempts per status query before monitoring fails
    #[serde(default = "default_max_query_attempts")]
    pub max_query_attempts: u32,
    /// Base delay for exponential backoff (milliseconds)
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl Default for OcoSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: None,
            max_query_attempts: default_max_query_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_query_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    200
}

impl OcoSettings {
    /// Build the coordinator configuration, `timeout_secs` overrides the file value
    pub fn to_oco_config(&self, timeout_secs: Option<u64>) -> OcoConfig {
        OcoConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            timeout: timeout_secs.or(self.timeout_secs).map(Duration::from_secs),
            query_retry: RetryPolicy::new(
                self.max_query_attempts,
                Duration::from_millis(self.retry_base_delay_ms),
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchSettings {
    /// Decimal places grid level prices are rounded to
    #[serde(default = "default_price_decimals")]
    pub price_decimals: u32,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            price_decimals: default_price_decimals(),
        }
    }
}

fn default_price_decimals() -> u32 {
    2
}

#[derive(Debug, Deserialize)]
pub struct LogConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file appended to next to the console output (empty disables it)
    #[serde(default = "default_log_file")]
    pub file: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "bot.log".to_string()
}

#[derive(Debug, Deserialize, Default)]
pub struct PaperConfig {
    /// Reference price per symbol, market orders fill at this price
    #[serde(default)]
    pub prices: HashMap<String, f64>,
}

impl Settings {
    /// Load settings from an optional configuration file.
    ///
    /// A missing file is not an error; every field has a default.
    pub fn new(config_path: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(false));
        }

        builder
            // Add environment variables (overrides file)
            // e.g. BOT__OCO__POLL_INTERVAL_MS=500
            .add_source(
                Environment::with_prefix("BOT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn validator(&self) -> Validator {
        Validator::new(&self.validation.quote_suffix)
    }
}

/// Venue API credentials
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
}

impl Credentials {
    pub const API_KEY_VAR: &'static str = "VENUE_API_KEY";
    pub const API_SECRET_VAR: &'static str = "VENUE_API_SECRET";

    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Load credentials from the environment after reading `.env` if present
    pub fn from_env() -> Result<Self> {
        // A missing .env is fine, the variables may come from the shell
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve both variables through `lookup`. Empty values count as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let fetch = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(Error::MissingCredentials(name))
        };

        Ok(Self {
            api_key: fetch(Self::API_KEY_VAR)?,
            api_secret: fetch(Self::API_SECRET_VAR)?,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }

    /// Shortened key safe to print in logs
    pub fn key_hint(&self) -> String {
        let prefix: String = self.api_key.chars().take(4).collect();
        format!("{}****", prefix)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.key_hint())
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let settings = Settings::new(Some("does-not-exist.toml")).unwrap();
        assert_eq!(settings.validation.quote_suffix, "USDT");
        assert_eq!(settings.oco.poll_interval_ms, 1000);
        assert_eq!(settings.batch.price_decimals, 2);
        assert_eq!(settings.log.file, "bot.log");
        assert!(settings.paper.prices.is_empty());
    }

    #[test]
    fn test_oco_config_timeout_override() {
        let settings = OcoSettings {
            timeout_secs: Some(60),
            ..OcoSettings::default()
        };

        let from_file = settings.to_oco_config(None);
        assert_eq!(from_file.timeout, Some(Duration::from_secs(60)));
        assert_eq!(from_file.poll_interval, Duration::from_millis(1000));
        assert_eq!(from_file.query_retry.max_attempts, 3);

        let overridden = settings.to_oco_config(Some(5));
        assert_eq!(overridden.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_credentials_present() {
        let creds = Credentials::from_lookup(|name| match name {
            "VENUE_API_KEY" => Some("abcdef123".to_string()),
            "VENUE_API_SECRET" => Some("s3cr3t".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(creds.api_key(), "abcdef123");
        assert_eq!(creds.key_hint(), "abcd****");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("s3cr3t"));
        assert!(!debug.contains("abcdef123"));
    }

    #[test]
    fn test_missing_credentials() {
        let err = Credentials::from_lookup(|name| match name {
            "VENUE_API_KEY" => Some("key".to_string()),
            _ => None,
        })
        .unwrap_err();
        assert!(matches!(err, Error::MissingCredentials("VENUE_API_SECRET")));

        let err = Credentials::from_lookup(|_| Some("   ".to_string())).unwrap_err();
        assert!(matches!(err, Error::MissingCredentials("VENUE_API_KEY")));
    }
}
