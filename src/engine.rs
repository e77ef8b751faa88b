//! The multiplexed stream engine.
//!
//! One combined WebSocket carries depth diffs, 24h tickers, trades, and
//! k-lines for every configured symbol. The engine seeds its per-symbol
//! stores from REST snapshots, fans incoming frames out by stream kind,
//! and publishes normalized events on the bus. A three-counter startup
//! barrier emits `OrderBookOpen` / `TradeBookOpen` / `KlineOpen` as each
//! snapshot class completes, and `Ready` exactly once when all of them
//! have.
//!
//! Per-symbol ordering: one reader task dispatches every frame of the
//! connection, and snapshot commits take the same store lock as frame
//! dispatch, so a commit happens-before any diff that passes the
//! generation gate. No ordering is guaranteed across symbols.
//!
//! The engine does not reconnect and does not retry failed snapshots; it
//! emits `Error` and leaves recovery to a supervisor calling `stop()` and
//! starting a fresh engine.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::bus::{EventBus, FeedEvent};
use crate::data::{
    interval_label, interval_minutes, KLineSeries, OrderBook, TickerStats, TradeBook, TradeSide,
    TradeTick,
};
use crate::error::{FeedError, FeedResult};
use crate::venue::endpoints::market_streams;
use crate::venue::types::{DepthUpdate, KlinePayload, StreamFrame, TickerPayload, TradePayload};
use crate::venue::{MarketApi, StreamCallback, StreamSignal};

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// K-line periods to track, in minutes
    pub periods: Vec<u32>,
    /// Row limit for the recent-trades seed
    pub trade_seed_limit: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            periods: crate::data::PERIOD_MINUTES.to_vec(),
            trade_seed_limit: 100,
        }
    }
}

/// The three per-symbol stores, each behind its own lock.
struct SymbolStores {
    book: Mutex<OrderBook>,
    trades: Mutex<TradeBook>,
    klines: Mutex<KLineSeries>,
    /// Whether this symbol's depth snapshot has counted toward the barrier
    depth_counted: AtomicBool,
    /// Set after a commit until the first in-range diff is accepted
    awaiting_first_diff: AtomicBool,
}

/// Startup barrier counters.
struct StartupBarrier {
    depth: AtomicUsize,
    trades: AtomicUsize,
    klines: AtomicUsize,
    ready: AtomicBool,
}

struct Shared {
    api: Arc<dyn MarketApi>,
    bus: Arc<EventBus>,
    settings: EngineSettings,
    stores: RwLock<HashMap<String, Arc<SymbolStores>>>,
    barrier: StartupBarrier,
    closed: AtomicBool,
    resync_tx: mpsc::UnboundedSender<String>,
}

/// Multiplexed market-data engine for a set of symbols.
pub struct StreamEngine {
    shared: Arc<Shared>,
    resync_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    shutdown_tx: broadcast::Sender<()>,
    started: AtomicBool,
}

impl StreamEngine {
    /// Create an engine over the given venue API and event bus.
    pub fn new(api: Arc<dyn MarketApi>, bus: Arc<EventBus>, settings: EngineSettings) -> Self {
        let (resync_tx, resync_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = broadcast::channel(4);
        Self {
            shared: Arc::new(Shared {
                api,
                bus,
                settings,
                stores: RwLock::new(HashMap::new()),
                barrier: StartupBarrier {
                    depth: AtomicUsize::new(0),
                    trades: AtomicUsize::new(0),
                    klines: AtomicUsize::new(0),
                    ready: AtomicBool::new(false),
                },
                closed: AtomicBool::new(false),
                resync_tx,
            }),
            resync_rx: Mutex::new(Some(resync_rx)),
            shutdown_tx,
            started: AtomicBool::new(false),
        }
    }

    /// Start the engine for the given markets.
    ///
    /// Builds one order book, trade book, and k-line series per symbol,
    /// opens the combined stream, and (once connected) issues every
    /// startup snapshot request. Configuration problems are returned
    /// synchronously; everything later is reported on the bus.
    pub async fn start(&self, markets: &[String]) -> FeedResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(FeedError::Configuration(
                "Engine already started".to_string(),
            ));
        }
        if markets.is_empty() {
            return Err(FeedError::Configuration("No markets configured".to_string()));
        }
        if self.shared.settings.periods.is_empty() {
            return Err(FeedError::Configuration(
                "No k-line periods configured".to_string(),
            ));
        }
        for &period in &self.shared.settings.periods {
            interval_label(period)?;
        }

        let periods = &self.shared.settings.periods;
        let mut stores = HashMap::new();
        let mut streams = Vec::new();
        for market in markets {
            let symbol = market.to_uppercase();
            streams.extend(market_streams(&symbol, periods)?);
            stores.insert(
                symbol.clone(),
                Arc::new(SymbolStores {
                    book: Mutex::new(OrderBook::new(&symbol)),
                    trades: Mutex::new(TradeBook::new()),
                    klines: Mutex::new(KLineSeries::new(&symbol, periods)?),
                    depth_counted: AtomicBool::new(false),
                    awaiting_first_diff: AtomicBool::new(false),
                }),
            );
        }

        let n = stores.len();
        self.shared.barrier.depth.store(n, Ordering::Release);
        self.shared.barrier.trades.store(n, Ordering::Release);
        self.shared
            .barrier
            .klines
            .store(n * periods.len(), Ordering::Release);
        *self.shared.stores.write() = stores;

        info!(
            "Starting stream engine for {} markets, {} streams",
            n,
            streams.len()
        );

        // Resnapshot pump: depth gaps detected during dispatch land here.
        let mut resync_rx = self
            .resync_rx
            .lock()
            .take()
            .ok_or_else(|| FeedError::Configuration("Engine already started".to_string()))?;
        let shared = self.shared.clone();
        tokio::spawn(async move {
            while let Some(symbol) = resync_rx.recv().await {
                if shared.closed.load(Ordering::Acquire) {
                    break;
                }
                warn!("Resnapshotting {} after depth gap", symbol);
                shared.load_depth(&symbol).await;
            }
        });

        let shared = self.shared.clone();
        let callback: StreamCallback = Arc::new(move |signal| match signal {
            StreamSignal::Connected => Shared::spawn_snapshot_loads(&shared),
            StreamSignal::Message(text) => shared.dispatch(&text),
            StreamSignal::Closed(reason) => {
                if !shared.closed.load(Ordering::Acquire) {
                    shared
                        .bus
                        .emit(&FeedEvent::Error(format!("Stream closed: {}", reason)));
                }
            }
        });

        let api = self.shared.api.clone();
        let shared = self.shared.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = api.subscribe(&streams, callback, shutdown_rx).await {
                if !shared.closed.load(Ordering::Acquire) {
                    shared.bus.emit(&FeedEvent::Error(e.to_string()));
                }
            }
        });

        Ok(())
    }

    /// Route one raw frame into the per-symbol stores and the bus.
    ///
    /// This is the entry point the stream task feeds; it is public so a
    /// harness can drive the engine without a live socket.
    pub fn dispatch(&self, raw: &str) {
        self.shared.dispatch(raw);
    }

    /// Whether every startup snapshot has loaded.
    pub fn is_ready(&self) -> bool {
        self.shared.barrier.ready.load(Ordering::Acquire)
    }

    /// Copy of a symbol's order book, if the engine tracks it.
    pub fn order_book(&self, symbol: &str) -> Option<OrderBook> {
        self.shared.store(symbol).map(|s| s.book.lock().clone())
    }

    /// Copy of a symbol's trade book, if the engine tracks it.
    pub fn trade_book(&self, symbol: &str) -> Option<TradeBook> {
        self.shared.store(symbol).map(|s| s.trades.lock().clone())
    }

    /// Copy of a symbol's k-line series, if the engine tracks it.
    pub fn kline_series(&self, symbol: &str) -> Option<KLineSeries> {
        self.shared.store(symbol).map(|s| s.klines.lock().clone())
    }

    /// Close the stream and release the per-symbol stores.
    ///
    /// Outstanding snapshot callbacks become no-ops.
    pub fn stop(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Stopping stream engine");
        let _ = self.shutdown_tx.send(());
        self.shared.stores.write().clear();
    }
}

impl Shared {
    fn store(&self, symbol: &str) -> Option<Arc<SymbolStores>> {
        self.stores.read().get(symbol).cloned()
    }

    fn spawn_snapshot_loads(shared: &Arc<Shared>) {
        let symbols: Vec<String> = shared.stores.read().keys().cloned().collect();
        for symbol in symbols {
            {
                let shared = shared.clone();
                let symbol = symbol.clone();
                tokio::spawn(async move { shared.load_depth(&symbol).await });
            }
            {
                let shared = shared.clone();
                let symbol = symbol.clone();
                tokio::spawn(async move { shared.load_trades(&symbol).await });
            }
            for &period in &shared.settings.periods {
                let shared = shared.clone();
                let symbol = symbol.clone();
                tokio::spawn(async move { shared.load_klines(&symbol, period).await });
            }
        }
    }

    async fn load_depth(&self, symbol: &str) {
        match self.api.depth(symbol).await {
            Ok(snapshot) => {
                if self.closed.load(Ordering::Acquire) {
                    return;
                }
                let Some(store) = self.store(symbol) else {
                    return;
                };
                let (bids, asks) = match (
                    parse_levels(&snapshot.bids),
                    parse_levels(&snapshot.asks),
                ) {
                    (Ok(bids), Ok(asks)) => (bids, asks),
                    (Err(e), _) | (_, Err(e)) => {
                        warn!("Bad depth snapshot for {}: {}", symbol, e);
                        self.bus.emit(&FeedEvent::Error(e.to_string()));
                        return;
                    }
                };
                {
                    let mut book = store.book.lock();
                    book.commit(snapshot.last_update_id, &bids, &asks);
                    store.awaiting_first_diff.store(true, Ordering::Release);
                }
                info!(
                    "Committed depth snapshot for {} at generation {}",
                    symbol, snapshot.last_update_id
                );
                if !store.depth_counted.swap(true, Ordering::AcqRel)
                    && self.barrier.depth.fetch_sub(1, Ordering::AcqRel) == 1
                {
                    self.bus.emit(&FeedEvent::OrderBookOpen(self.order_books()));
                    self.maybe_ready();
                }
            }
            Err(e) => self.snapshot_failed(symbol, "depth", e),
        }
    }

    async fn load_trades(&self, symbol: &str) {
        match self
            .api
            .recent_trades(symbol, self.settings.trade_seed_limit)
            .await
        {
            Ok(rows) => {
                if self.closed.load(Ordering::Acquire) {
                    return;
                }
                let Some(store) = self.store(symbol) else {
                    return;
                };
                {
                    let mut trades = store.trades.lock();
                    for row in &rows {
                        let (price, amount) = match (
                            Decimal::from_str(&row.price),
                            Decimal::from_str(&row.qty),
                        ) {
                            (Ok(p), Ok(q)) => (p, q),
                            _ => {
                                warn!("Skipping unparsable trade {} for {}", row.id, symbol);
                                continue;
                            }
                        };
                        trades.add(
                            row.id,
                            TradeSide::from_buyer_maker(row.is_buyer_maker),
                            row.time / 1000,
                            price,
                            amount,
                        );
                    }
                }
                info!("Seeded trade tape for {} with {} trades", symbol, rows.len());
                if self.barrier.trades.fetch_sub(1, Ordering::AcqRel) == 1 {
                    self.bus.emit(&FeedEvent::TradeBookOpen(self.trade_books()));
                    self.maybe_ready();
                }
            }
            Err(e) => self.snapshot_failed(symbol, "trades", e),
        }
    }

    async fn load_klines(&self, symbol: &str, period: u32) {
        let label = match interval_label(period) {
            Ok(label) => label,
            Err(e) => {
                warn!("Skipping k-line load for {}: {}", symbol, e);
                return;
            }
        };
        match self.api.klines(symbol, label).await {
            Ok(rows) => {
                if self.closed.load(Ordering::Acquire) {
                    return;
                }
                let Some(store) = self.store(symbol) else {
                    return;
                };
                {
                    let mut klines = store.klines.lock();
                    for row in &rows {
                        let parsed = (
                            Decimal::from_str(&row.open),
                            Decimal::from_str(&row.high),
                            Decimal::from_str(&row.low),
                            Decimal::from_str(&row.close),
                            Decimal::from_str(&row.volume),
                        );
                        let (Ok(o), Ok(h), Ok(l), Ok(c), Ok(v)) = parsed else {
                            warn!("Skipping unparsable {} bar for {}", label, symbol);
                            continue;
                        };
                        if let Err(e) = klines.add(period, row.open_time, o, h, l, c, v) {
                            warn!("Dropping {} bar for {}: {}", label, symbol, e);
                        }
                    }
                }
                debug!("Loaded {} {} bars for {}", rows.len(), label, symbol);
                if self.barrier.klines.fetch_sub(1, Ordering::AcqRel) == 1 {
                    self.bus.emit(&FeedEvent::KlineOpen(self.kline_series()));
                    self.maybe_ready();
                }
            }
            Err(e) => self.snapshot_failed(symbol, label, e),
        }
    }

    fn snapshot_failed(&self, symbol: &str, what: &str, e: FeedError) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        warn!("{} snapshot failed for {}: {}", what, symbol, e);
        self.bus.emit(&FeedEvent::Error(e.to_string()));
    }

    fn maybe_ready(&self) {
        let done = self.barrier.depth.load(Ordering::Acquire) == 0
            && self.barrier.trades.load(Ordering::Acquire) == 0
            && self.barrier.klines.load(Ordering::Acquire) == 0;
        if done && !self.barrier.ready.swap(true, Ordering::AcqRel) {
            info!("All startup snapshots loaded");
            self.bus.emit(&FeedEvent::Ready);
        }
    }

    fn order_books(&self) -> HashMap<String, OrderBook> {
        self.stores
            .read()
            .iter()
            .map(|(symbol, store)| (symbol.clone(), store.book.lock().clone()))
            .collect()
    }

    fn trade_books(&self) -> HashMap<String, TradeBook> {
        self.stores
            .read()
            .iter()
            .map(|(symbol, store)| (symbol.clone(), store.trades.lock().clone()))
            .collect()
    }

    fn kline_series(&self) -> HashMap<String, KLineSeries> {
        self.stores
            .read()
            .iter()
            .map(|(symbol, store)| (symbol.clone(), store.klines.lock().clone()))
            .collect()
    }

    fn dispatch(&self, raw: &str) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let frame: StreamFrame = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(_) => {
                // Subscription acks and other control messages carry no stream field.
                debug!("Ignoring non-stream frame: {}", raw);
                return;
            }
        };
        let Some((raw_symbol, kind)) = frame.stream.split_once('@') else {
            debug!("Ignoring malformed stream name: {}", frame.stream);
            return;
        };
        let symbol = raw_symbol.to_uppercase();
        let Some(store) = self.store(&symbol) else {
            debug!("Frame for untracked symbol {}", symbol);
            return;
        };

        if kind == "depth" {
            match serde_json::from_value::<DepthUpdate>(frame.data) {
                Ok(update) => self.handle_depth(&symbol, &store, update),
                Err(e) => warn!("Bad depth frame for {}: {}", symbol, e),
            }
        } else if kind == "ticker" {
            match serde_json::from_value::<TickerPayload>(frame.data) {
                Ok(payload) => match normalize_ticker(&payload) {
                    Ok(data) => self.bus.emit(&FeedEvent::Ticker { symbol, data }),
                    Err(e) => warn!("Bad ticker values for {}: {}", symbol, e),
                },
                Err(e) => warn!("Bad ticker frame for {}: {}", symbol, e),
            }
        } else if kind == "trade" {
            match serde_json::from_value::<TradePayload>(frame.data) {
                Ok(payload) => match normalize_trade(&payload) {
                    // The tape stays as seeded; live trades are bus-only.
                    Ok(data) => self.bus.emit(&FeedEvent::Trade { symbol, data }),
                    Err(e) => warn!("Bad trade values for {}: {}", symbol, e),
                },
                Err(e) => warn!("Bad trade frame for {}: {}", symbol, e),
            }
        } else if let Some(label) = kind.strip_prefix("kline_") {
            let period = match interval_minutes(label) {
                Ok(period) => period,
                Err(e) => {
                    warn!("Frame for unknown k-line interval: {}", e);
                    return;
                }
            };
            match serde_json::from_value::<KlinePayload>(frame.data) {
                Ok(payload) => {
                    let bar = &payload.bar;
                    let parsed = (
                        Decimal::from_str(&bar.open),
                        Decimal::from_str(&bar.high),
                        Decimal::from_str(&bar.low),
                        Decimal::from_str(&bar.close),
                        Decimal::from_str(&bar.volume),
                    );
                    let (Ok(o), Ok(h), Ok(l), Ok(c), Ok(v)) = parsed else {
                        warn!("Bad k-line values for {}", symbol);
                        return;
                    };
                    let data = store.klines.lock().filter(bar.open_time, o, h, l, c, v);
                    self.bus.emit(&FeedEvent::Kline {
                        symbol,
                        period,
                        data,
                    });
                }
                Err(e) => warn!("Bad k-line frame for {}: {}", symbol, e),
            }
        } else {
            debug!("Ignoring frame of unknown kind: {}", kind);
        }
    }

    fn handle_depth(&self, symbol: &str, store: &Arc<SymbolStores>, update: DepthUpdate) {
        let mut book = store.book.lock();
        let generation = book.generation();

        if store.awaiting_first_diff.load(Ordering::Acquire)
            && update.final_update_id > generation
        {
            // The first diff bridging the snapshot must cover G+1.
            if update.first_update_id > generation + 1 {
                drop(book);
                warn!(
                    "Depth gap for {}: first diff covers [{}, {}], book at {}",
                    symbol, update.first_update_id, update.final_update_id, generation
                );
                let _ = self.resync_tx.send(symbol.to_string());
                return;
            }
            store.awaiting_first_diff.store(false, Ordering::Release);
        }

        let mut bid_delta = 0i32;
        let mut ask_delta = 0i32;
        for [price, volume] in &update.bids {
            let (Ok(price), Ok(volume)) = (Decimal::from_str(price), Decimal::from_str(volume))
            else {
                warn!("Skipping unparsable bid level for {}", symbol);
                continue;
            };
            bid_delta += book.bid(price, volume, update.final_update_id).as_i8() as i32;
        }
        for [price, volume] in &update.asks {
            let (Ok(price), Ok(volume)) = (Decimal::from_str(price), Decimal::from_str(volume))
            else {
                warn!("Skipping unparsable ask level for {}", symbol);
                continue;
            };
            ask_delta += book.ask(price, volume, update.final_update_id).as_i8() as i32;
        }
        debug!(
            "Depth {} u={} bid_delta={} ask_delta={}",
            symbol, update.final_update_id, bid_delta, ask_delta
        );
    }
}

fn parse_levels(levels: &[[String; 2]]) -> FeedResult<Vec<(Decimal, Decimal)>> {
    levels
        .iter()
        .map(|[price, volume]| {
            let price = Decimal::from_str(price)
                .map_err(|e| FeedError::Parse(format!("Bad price {}: {}", price, e)))?;
            let volume = Decimal::from_str(volume)
                .map_err(|e| FeedError::Parse(format!("Bad volume {}: {}", volume, e)))?;
            Ok((price, volume))
        })
        .collect()
}

fn normalize_ticker(payload: &TickerPayload) -> FeedResult<TickerStats> {
    let field = |name: &str, value: &str| {
        Decimal::from_str(value)
            .map_err(|e| FeedError::Parse(format!("Bad ticker field {}: {}", name, e)))
    };
    Ok(TickerStats {
        low: field("l", &payload.low_price)?,
        high: field("h", &payload.high_price)?,
        last: field("c", &payload.last_price)?,
        volume: field("v", &payload.volume)?,
        open: field("o", &payload.open_price)?,
        sell: field("a", &payload.best_ask)?,
        buy: field("b", &payload.best_bid)?,
        avg_price: field("w", &payload.weighted_avg_price)?,
        price_change_percent: payload.price_change_percent.clone(),
    })
}

fn normalize_trade(payload: &TradePayload) -> FeedResult<TradeTick> {
    let price = Decimal::from_str(&payload.price)
        .map_err(|e| FeedError::Parse(format!("Bad trade price: {}", e)))?;
    let amount = Decimal::from_str(&payload.quantity)
        .map_err(|e| FeedError::Parse(format!("Bad trade quantity: {}", e)))?;
    Ok(TradeTick {
        tid: payload.trade_id,
        side: TradeSide::from_buyer_maker(payload.is_buyer_maker),
        date: payload.event_time / 1000,
        price,
        amount,
    })
}
