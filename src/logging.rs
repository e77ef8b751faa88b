//! Logging initialization.
//!
//! One call at process start; components log through the `tracing`
//! macros and never hold a logger.
//!
//! Environment:
//! - `RUST_LOG`: standard tracing filter (e.g. `info`, `binance_feed=debug`)
//! - `LOG_FORMAT`: `pretty` (default) or `compact`

use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable format with colors
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl LogFormat {
    /// Parse a format name; unknown values fall back to pretty.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }

    /// Read the format from LOG_FORMAT.
    pub fn from_env() -> Self {
        std::env::var("LOG_FORMAT")
            .map(|s| Self::parse(&s))
            .unwrap_or_default()
    }
}

/// Initialize the global subscriber with the given fallback level.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    match LogFormat::from_env() {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Compact => tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .init(),
    }
}
