//! Binance spot endpoints and stream-path construction.

use crate::data::interval_label;
use crate::error::FeedResult;

/// Endpoint configuration for the Binance spot API.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// REST API base URL
    pub rest_url: String,
    /// WebSocket base URL
    pub ws_url: String,
}

impl Endpoints {
    /// Production spot endpoints.
    pub fn spot() -> Self {
        Self {
            rest_url: "https://api.binance.com".to_string(),
            ws_url: "wss://stream.binance.com:9443".to_string(),
        }
    }

    /// Spot testnet endpoints.
    pub fn spot_testnet() -> Self {
        Self {
            rest_url: "https://testnet.binance.vision".to_string(),
            ws_url: "wss://testnet.binance.vision".to_string(),
        }
    }

    /// Select endpoints by the testnet flag.
    pub fn for_env(testnet: bool) -> Self {
        if testnet {
            Self::spot_testnet()
        } else {
            Self::spot()
        }
    }

    /// Combined-stream URL for the given stream names.
    pub fn combined_stream_url(&self, streams: &[String]) -> String {
        format!("{}/stream?streams={}", self.ws_url, streams.join("/"))
    }
}

/// REST API endpoint paths.
pub mod paths {
    /// Depth snapshot
    pub const DEPTH: &str = "/api/v3/depth";

    /// Recent trades
    pub const TRADES: &str = "/api/v3/trades";

    /// K-line history
    pub const KLINES: &str = "/api/v3/klines";

    /// New order (signed)
    pub const ORDER: &str = "/api/v3/order";

    /// Test connectivity
    pub const PING: &str = "/api/v3/ping";
}

/// Stream names for one symbol: depth, ticker, trade, and one k-line
/// stream per period.
pub fn market_streams(symbol: &str, periods: &[u32]) -> FeedResult<Vec<String>> {
    let symbol = symbol.to_lowercase();
    let mut streams = Vec::with_capacity(3 + periods.len());
    streams.push(format!("{}@depth", symbol));
    streams.push(format!("{}@ticker", symbol));
    streams.push(format!("{}@trade", symbol));
    for &period in periods {
        streams.push(format!("{}@kline_{}", symbol, interval_label(period)?));
    }
    Ok(streams)
}
