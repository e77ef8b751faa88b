//! Runtime settings.
//!
//! Settings load from `config/{RUN_MODE}.toml` when present, with
//! environment overrides for credentials. Everything except the market
//! list has a sensible default.

use config::{Config, ConfigError, File};
use serde::Deserialize;

use crate::data::{interval_label, PERIOD_MINUTES};
use crate::error::{FeedError, FeedResult};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Symbols to track, e.g. ["BTCUSDT", "ETHUSDT"]
    #[serde(default)]
    pub markets: Vec<String>,

    /// Use the spot testnet endpoints
    #[serde(default)]
    pub testnet: bool,

    /// K-line periods to track, in minutes
    #[serde(default = "default_kline_periods")]
    pub kline_periods: Vec<u32>,

    /// Row limit for the recent-trades seed
    #[serde(default = "default_trade_seed_limit")]
    pub trade_seed_limit: u32,

    /// recvWindow for signed requests, milliseconds
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,

    /// HTTP request timeout, seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// API key; usually supplied via BINANCE_API_KEY
    #[serde(default)]
    pub api_key: Option<String>,

    /// API secret; usually supplied via BINANCE_API_SECRET
    #[serde(default)]
    pub api_secret: Option<String>,
}

fn default_kline_periods() -> Vec<u32> {
    PERIOD_MINUTES.to_vec()
}

fn default_trade_seed_limit() -> u32 {
    100
}

fn default_recv_window_ms() -> u64 {
    5000
}

fn default_http_timeout_secs() -> u64 {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            markets: Vec::new(),
            testnet: false,
            kline_periods: default_kline_periods(),
            trade_seed_limit: default_trade_seed_limit(),
            recv_window_ms: default_recv_window_ms(),
            http_timeout_secs: default_http_timeout_secs(),
            api_key: None,
            api_secret: None,
        }
    }
}

impl Settings {
    /// Load settings for the current RUN_MODE with env overrides.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false));

        if let Ok(api_key) = std::env::var("BINANCE_API_KEY") {
            builder = builder.set_override("api_key", api_key)?;
        }
        if let Ok(api_secret) = std::env::var("BINANCE_API_SECRET") {
            builder = builder.set_override("api_secret", api_secret)?;
        }

        let s = builder.build()?;
        s.try_deserialize()
    }

    /// Validate the parts the engine needs at start.
    pub fn validate(&self) -> FeedResult<()> {
        if self.markets.is_empty() {
            return Err(FeedError::Configuration("No markets configured".to_string()));
        }
        if self.kline_periods.is_empty() {
            return Err(FeedError::Configuration(
                "No k-line periods configured".to_string(),
            ));
        }
        for &period in &self.kline_periods {
            interval_label(period)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.trade_seed_limit, 100);
        assert_eq!(settings.recv_window_ms, 5000);
        assert_eq!(settings.kline_periods, PERIOD_MINUTES.to_vec());
        assert!(!settings.testnet);
    }

    #[test]
    fn test_validate_rejects_empty_markets() {
        let settings = Settings::default();
        assert!(matches!(
            settings.validate(),
            Err(FeedError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_period() {
        let settings = Settings {
            markets: vec!["BTCUSDT".to_string()],
            kline_periods: vec![1, 2],
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(FeedError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_accepts_known_periods() {
        let settings = Settings {
            markets: vec!["BTCUSDT".to_string()],
            kline_periods: vec![1, 60, 1440],
            ..Settings::default()
        };
        assert!(settings.validate().is_ok());
    }
}
