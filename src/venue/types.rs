//! Wire types for Binance REST responses and WebSocket frames.
//!
//! Prices and volumes travel as exact strings and are parsed into
//! decimals by the consumer; the structs here stay faithful to the wire.

use serde::Deserialize;

/// Combined-stream frame envelope: `{"stream": "<symbol>@<kind>", "data": ...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamFrame {
    /// Stream name, e.g. "btcusdt@depth"
    pub stream: String,
    /// The kind-specific payload
    pub data: serde_json::Value,
}

/// REST depth snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct DepthSnapshot {
    /// Generation of this snapshot
    #[serde(rename = "lastUpdateId")]
    pub last_update_id: u64,

    /// Bid levels as [price, volume] strings
    pub bids: Vec<[String; 2]>,

    /// Ask levels as [price, volume] strings
    pub asks: Vec<[String; 2]>,
}

/// Diff-depth stream payload.
#[derive(Debug, Clone, Deserialize)]
pub struct DepthUpdate {
    /// First update id in this event
    #[serde(rename = "U")]
    pub first_update_id: u64,

    /// Final update id in this event
    #[serde(rename = "u")]
    pub final_update_id: u64,

    /// Bid level changes as [price, volume] strings
    #[serde(rename = "b")]
    pub bids: Vec<[String; 2]>,

    /// Ask level changes as [price, volume] strings
    #[serde(rename = "a")]
    pub asks: Vec<[String; 2]>,
}

/// 24h ticker stream payload.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerPayload {
    /// Symbol
    #[serde(rename = "s")]
    pub symbol: String,

    /// Price change percent
    #[serde(rename = "P")]
    pub price_change_percent: String,

    /// Weighted average price
    #[serde(rename = "w")]
    pub weighted_avg_price: String,

    /// Last price
    #[serde(rename = "c")]
    pub last_price: String,

    /// Open price
    #[serde(rename = "o")]
    pub open_price: String,

    /// High price
    #[serde(rename = "h")]
    pub high_price: String,

    /// Low price
    #[serde(rename = "l")]
    pub low_price: String,

    /// Base asset volume
    #[serde(rename = "v")]
    pub volume: String,

    /// Best bid price
    #[serde(rename = "b")]
    pub best_bid: String,

    /// Best ask price
    #[serde(rename = "a")]
    pub best_ask: String,
}

/// Trade stream payload.
#[derive(Debug, Clone, Deserialize)]
pub struct TradePayload {
    /// Trade ID
    #[serde(rename = "t")]
    pub trade_id: u64,

    /// Price
    #[serde(rename = "p")]
    pub price: String,

    /// Quantity
    #[serde(rename = "q")]
    pub quantity: String,

    /// Event time, milliseconds
    #[serde(rename = "E")]
    pub event_time: i64,

    /// Is the buyer the market maker?
    #[serde(rename = "m")]
    pub is_buyer_maker: bool,
}

/// K-line stream payload wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct KlinePayload {
    /// The bar itself
    #[serde(rename = "k")]
    pub bar: KlineBar,
}

/// One k-line bar from the stream.
#[derive(Debug, Clone, Deserialize)]
pub struct KlineBar {
    /// Bar open time, milliseconds
    #[serde(rename = "t")]
    pub open_time: i64,

    /// Interval label, e.g. "1m"
    #[serde(rename = "i")]
    pub interval: String,

    /// Open price
    #[serde(rename = "o")]
    pub open: String,

    /// High price
    #[serde(rename = "h")]
    pub high: String,

    /// Low price
    #[serde(rename = "l")]
    pub low: String,

    /// Close price
    #[serde(rename = "c")]
    pub close: String,

    /// Base asset volume
    #[serde(rename = "v")]
    pub volume: String,
}

/// One row of the REST recent-trades response.
#[derive(Debug, Clone, Deserialize)]
pub struct RecentTrade {
    /// Trade ID
    pub id: u64,

    /// Price
    pub price: String,

    /// Quantity
    pub qty: String,

    /// Trade time, milliseconds
    pub time: i64,

    /// Is the buyer the market maker?
    #[serde(rename = "isBuyerMaker")]
    pub is_buyer_maker: bool,
}

/// One row of the REST k-line history, truncated to the first six fields.
#[derive(Debug, Clone)]
pub struct KlineRecord {
    /// Bar open time, milliseconds
    pub open_time: i64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
}

/// Acknowledgement of a submitted order.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderAck {
    /// Venue-assigned order id
    #[serde(rename = "orderId")]
    pub order_id: i64,
}
