//! Upstream market-data client and order gateway for Binance spot.
//!
//! For each configured symbol the [`engine::StreamEngine`] maintains
//! three synchronized views fed by REST snapshots plus one combined
//! WebSocket stream: a generation-gated [`data::OrderBook`], a
//! [`data::TradeBook`] tape, and per-period [`data::KLineSeries`].
//! Normalized updates are re-published on the [`bus::EventBus`]; the
//! [`trader::Trader`] submits orders once a readiness signal flips.

pub mod bus;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod logging;
pub mod trader;
pub mod venue;

pub use bus::{EventBus, EventKind, FeedEvent};
pub use config::Settings;
pub use engine::{EngineSettings, StreamEngine};
pub use error::{FeedError, FeedResult};
pub use trader::{OrderRequest, OrderSide, OrderType, TradeEvent, TradeHandle, Trader};
