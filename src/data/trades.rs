//! Trade tape: an append-only sequence of executed trades per symbol.
//!
//! Two parallel tapes share one shape: the market tape, seeded once from
//! the recent-trades snapshot, and the own-trades tape for fills
//! belonging to this account. The upstream may repost a trade id; the
//! tape does not dedupe.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::TradeSide;

/// A single tape entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEntry {
    pub tid: u64,
    pub side: TradeSide,
    /// Unix seconds
    pub ts: i64,
    pub price: Decimal,
    pub amount: Decimal,
    /// Resting ask order id, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ask_id: Option<u64>,
    /// Resting bid order id, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bid_id: Option<u64>,
}

/// Append-only trade tape with a parallel own-trades tape.
#[derive(Debug, Clone, Default)]
pub struct TradeBook {
    tape: Vec<TradeEntry>,
    own: Vec<TradeEntry>,
}

impl TradeBook {
    /// Create an empty trade book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a market trade.
    pub fn add(&mut self, tid: u64, side: TradeSide, ts: i64, price: Decimal, amount: Decimal) {
        self.tape.push(TradeEntry {
            tid,
            side,
            ts,
            price,
            amount,
            ask_id: None,
            bid_id: None,
        });
    }

    /// Append a market trade with the resting order ids attached.
    pub fn add_with_makers(
        &mut self,
        tid: u64,
        side: TradeSide,
        ts: i64,
        price: Decimal,
        amount: Decimal,
        ask_id: Option<u64>,
        bid_id: Option<u64>,
    ) {
        self.tape.push(TradeEntry {
            tid,
            side,
            ts,
            price,
            amount,
            ask_id,
            bid_id,
        });
    }

    /// Up to `size` most recent market trades, newest first.
    pub fn fetch(&self, size: usize) -> Vec<TradeEntry> {
        self.tape.iter().rev().take(size).cloned().collect()
    }

    /// Number of market trades on the tape.
    pub fn len(&self) -> usize {
        self.tape.len()
    }

    /// Check if the market tape is empty.
    pub fn is_empty(&self) -> bool {
        self.tape.is_empty()
    }

    /// Append an own trade.
    pub fn add_my_trade(
        &mut self,
        tid: u64,
        side: TradeSide,
        ts: i64,
        price: Decimal,
        amount: Decimal,
        ask_id: Option<u64>,
        bid_id: Option<u64>,
    ) {
        self.own.push(TradeEntry {
            tid,
            side,
            ts,
            price,
            amount,
            ask_id,
            bid_id,
        });
    }

    /// All own trades, newest first.
    pub fn fetch_my_trades(&self) -> Vec<TradeEntry> {
        self.own.iter().rev().cloned().collect()
    }
}
