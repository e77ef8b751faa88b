//! Normalized market-data records published on the event bus.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of a trade as labeled on the tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// Derive the tape label from the buyer-is-maker flag.
    ///
    /// The upstream labels a trade `buy` when the buyer was the resting
    /// order (`isBuyerMaker` on REST, `m` on the stream). Both of its
    /// paths use this mapping, so it is preserved here verbatim even
    /// though the aggressor-side convention would invert it.
    pub fn from_buyer_maker(is_buyer_maker: bool) -> Self {
        if is_buyer_maker {
            TradeSide::Buy
        } else {
            TradeSide::Sell
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

/// Normalized 24h ticker statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerStats {
    pub low: Decimal,
    pub high: Decimal,
    pub last: Decimal,
    pub volume: Decimal,
    pub open: Decimal,
    /// Best ask price
    pub sell: Decimal,
    /// Best bid price
    pub buy: Decimal,
    pub avg_price: Decimal,
    /// Kept as the raw wire string
    pub price_change_percent: String,
}

/// Normalized live trade published on the bus (not appended to the tape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeTick {
    pub tid: u64,
    pub side: TradeSide,
    /// Unix seconds
    pub date: i64,
    pub price: Decimal,
    pub amount: Decimal,
}
