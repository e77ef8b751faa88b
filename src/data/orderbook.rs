//! Generation-gated order book.
//!
//! The book fuses a one-shot REST depth snapshot with an incremental
//! diff-depth stream. Every mutation carries a generation (Binance's
//! `lastUpdateId` for snapshots, `u` for diffs); the book drops anything
//! that predates its current state and otherwise keeps both sides sorted
//! for O(1) best-of-book and ordered traversal.
//!
//! # Gating rules
//!
//! - A level update is rejected when its generation is below the book's
//!   current generation, or at-or-below the last committed snapshot
//!   generation. Rejected updates leave the book untouched.
//! - A multi-level diff applies all of its levels at one generation: the
//!   first accepted level raises the book's generation, the rest pass at
//!   equality.
//! - `commit` replaces the whole book and supersedes every diff up to and
//!   including its generation.
//!
//! A crossed book (best bid >= best ask) is representable and observable
//! via [`OrderBook::is_crossed`]; it is never silently normalized.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;

/// Outcome of a single level update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelDelta {
    /// An existing price level was removed (volume went to zero)
    Removed,
    /// The level was updated in place, or the update was rejected
    Unchanged,
    /// A new price level was inserted
    Inserted,
}

impl LevelDelta {
    /// Signed representation: -1 removed, 0 unchanged, +1 inserted.
    pub fn as_i8(self) -> i8 {
        match self {
            LevelDelta::Removed => -1,
            LevelDelta::Unchanged => 0,
            LevelDelta::Inserted => 1,
        }
    }
}

/// Wrapper for reverse ordering of Decimal, so bids iterate highest-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReverseDecimal(Decimal);

impl PartialOrd for ReverseDecimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReverseDecimal {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp(&self.0)
    }
}

/// Price-sorted bid/ask ladder with generation-gated updates.
///
/// Bids are kept descending (highest first), asks ascending (lowest
/// first). Every stored level has volume > 0.
#[derive(Debug, Clone)]
pub struct OrderBook {
    /// Symbol for this order book
    symbol: String,
    /// Bid levels (price -> volume), iterated descending
    bids: BTreeMap<ReverseDecimal, Decimal>,
    /// Ask levels (price -> volume), iterated ascending
    asks: BTreeMap<Decimal, Decimal>,
    /// Last applied generation
    generation: u64,
    /// Generation of the last committed snapshot
    commit_generation: u64,
}

impl OrderBook {
    /// Create a new empty order book.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            generation: 0,
            commit_generation: 0,
        }
    }

    /// Symbol this book tracks.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Last applied generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn accepts(&self, generation: u64) -> bool {
        generation > self.commit_generation && generation >= self.generation
    }

    /// Update a bid level.
    pub fn bid(&mut self, price: Decimal, volume: Decimal, generation: u64) -> LevelDelta {
        if !self.accepts(generation) {
            return LevelDelta::Unchanged;
        }
        self.generation = self.generation.max(generation);

        let key = ReverseDecimal(price);
        if volume.is_zero() {
            match self.bids.remove(&key) {
                Some(_) => LevelDelta::Removed,
                None => LevelDelta::Unchanged,
            }
        } else {
            match self.bids.insert(key, volume) {
                Some(_) => LevelDelta::Unchanged,
                None => LevelDelta::Inserted,
            }
        }
    }

    /// Update an ask level.
    pub fn ask(&mut self, price: Decimal, volume: Decimal, generation: u64) -> LevelDelta {
        if !self.accepts(generation) {
            return LevelDelta::Unchanged;
        }
        self.generation = self.generation.max(generation);

        if volume.is_zero() {
            match self.asks.remove(&price) {
                Some(_) => LevelDelta::Removed,
                None => LevelDelta::Unchanged,
            }
        } else {
            match self.asks.insert(price, volume) {
                Some(_) => LevelDelta::Unchanged,
                None => LevelDelta::Inserted,
            }
        }
    }

    /// Replace the whole book with a snapshot at the given generation.
    ///
    /// After a commit at G the book contains exactly the seed levels with
    /// volume > 0, and every diff with `u <= G` is subsequently discarded.
    pub fn commit(
        &mut self,
        generation: u64,
        bids: &[(Decimal, Decimal)],
        asks: &[(Decimal, Decimal)],
    ) {
        self.bids.clear();
        self.asks.clear();
        for (price, volume) in bids {
            if !volume.is_zero() {
                self.bids.insert(ReverseDecimal(*price), *volume);
            }
        }
        for (price, volume) in asks {
            if !volume.is_zero() {
                self.asks.insert(*price, *volume);
            }
        }
        self.generation = generation;
        self.commit_generation = generation;
    }

    /// Best bid as (price, volume), if any.
    pub fn best_bid(&self) -> Option<(Decimal, Decimal)> {
        self.bids.iter().next().map(|(k, v)| (k.0, *v))
    }

    /// Best ask as (price, volume), if any.
    pub fn best_ask(&self) -> Option<(Decimal, Decimal)> {
        self.asks.iter().next().map(|(k, v)| (*k, *v))
    }

    /// Top N bid levels, highest price first.
    pub fn bids(&self, depth: usize) -> Vec<(Decimal, Decimal)> {
        self.bids
            .iter()
            .take(depth)
            .map(|(k, v)| (k.0, *v))
            .collect()
    }

    /// Top N ask levels, lowest price first.
    pub fn asks(&self, depth: usize) -> Vec<(Decimal, Decimal)> {
        self.asks
            .iter()
            .take(depth)
            .map(|(k, v)| (*k, *v))
            .collect()
    }

    /// Number of bid levels.
    pub fn bid_depth(&self) -> usize {
        self.bids.len()
    }

    /// Number of ask levels.
    pub fn ask_depth(&self) -> usize {
        self.asks.len()
    }

    /// Check if the book is empty on both sides.
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Check if the book is crossed (best bid >= best ask).
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => bid >= ask,
            _ => false,
        }
    }

    /// Bid-ask spread, when both sides are populated.
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some(ask - bid),
            _ => None,
        }
    }
}

impl fmt::Display for OrderBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "OrderBook {} @ gen {}", self.symbol, self.generation)?;
        writeln!(f, "  Asks ({}):", self.ask_depth())?;
        for (price, volume) in self.asks(5).iter().rev() {
            writeln!(f, "    {}@{}", volume, price)?;
        }
        if let Some(spread) = self.spread() {
            writeln!(f, "  --- spread: {} ---", spread)?;
        }
        writeln!(f, "  Bids ({}):", self.bid_depth())?;
        for (price, volume) in self.bids(5) {
            writeln!(f, "    {}@{}", volume, price)?;
        }
        Ok(())
    }
}
