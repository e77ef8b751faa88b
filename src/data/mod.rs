//! Per-symbol market-data stores and their normalized records.

pub mod klines;
pub mod orderbook;
pub mod trades;
pub mod types;

pub use klines::{interval_label, interval_minutes, KLineSeries, KlinePoint, PERIOD_MINUTES};
pub use orderbook::{LevelDelta, OrderBook};
pub use trades::{TradeBook, TradeEntry};
pub use types::{TickerStats, TradeSide, TradeTick};
