//! Shared mock venue API for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};

use binance_feed::error::FeedResult;
use binance_feed::trader::OrderRequest;
use binance_feed::venue::types::{DepthSnapshot, KlineRecord, NewOrderAck, RecentTrade};
use binance_feed::venue::{MarketApi, StreamCallback, StreamSignal};

fn level(price: &str, volume: &str) -> [String; 2] {
    [price.to_string(), volume.to_string()]
}

/// Mock venue: canned snapshots, optional per-symbol gates on the depth
/// request, and call counting.
#[derive(Default)]
pub struct MockApi {
    /// Per-symbol depth snapshot (generation, bids, asks)
    pub snapshots: Mutex<HashMap<String, DepthSnapshot>>,
    /// Per-symbol gate: the depth request waits until the gate flips
    pub depth_gates: Mutex<HashMap<String, watch::Receiver<bool>>>,
    /// Depth requests issued per symbol
    pub depth_calls: Mutex<HashMap<String, usize>>,
    /// Orders submitted
    pub submit_calls: AtomicUsize,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a canned depth snapshot for a symbol.
    pub fn with_snapshot(self, symbol: &str, generation: u64) -> Self {
        self.snapshots.lock().insert(
            symbol.to_string(),
            DepthSnapshot {
                last_update_id: generation,
                bids: vec![level("10", "1")],
                asks: vec![level("11", "2")],
            },
        );
        self
    }

    /// Gate a symbol's depth request; returns the release switch.
    pub fn gate_depth(&self, symbol: &str) -> watch::Sender<bool> {
        let (tx, rx) = watch::channel(false);
        self.depth_gates.lock().insert(symbol.to_string(), rx);
        tx
    }

    pub fn depth_calls_for(&self, symbol: &str) -> usize {
        self.depth_calls.lock().get(symbol).copied().unwrap_or(0)
    }
}

#[async_trait]
impl MarketApi for MockApi {
    async fn depth(&self, symbol: &str) -> FeedResult<DepthSnapshot> {
        *self.depth_calls.lock().entry(symbol.to_string()).or_insert(0) += 1;
        let gate = self.depth_gates.lock().get(symbol).cloned();
        if let Some(mut gate) = gate {
            let _ = gate.wait_for(|released| *released).await;
        }
        let snapshot = self.snapshots.lock().get(symbol).cloned();
        Ok(snapshot.unwrap_or(DepthSnapshot {
            last_update_id: 1,
            bids: vec![level("10", "1")],
            asks: vec![level("11", "2")],
        }))
    }

    async fn recent_trades(&self, _symbol: &str, _limit: u32) -> FeedResult<Vec<RecentTrade>> {
        Ok(vec![
            RecentTrade {
                id: 1,
                price: "10".to_string(),
                qty: "1".to_string(),
                time: 1_000_000,
                is_buyer_maker: false,
            },
            RecentTrade {
                id: 2,
                price: "11".to_string(),
                qty: "2".to_string(),
                time: 1_001_000,
                is_buyer_maker: true,
            },
            RecentTrade {
                id: 3,
                price: "12".to_string(),
                qty: "3".to_string(),
                time: 1_002_000,
                is_buyer_maker: false,
            },
        ])
    }

    async fn klines(&self, _symbol: &str, _interval: &str) -> FeedResult<Vec<KlineRecord>> {
        Ok(vec![KlineRecord {
            open_time: 1_700_000_000_000,
            open: "10".to_string(),
            high: "11".to_string(),
            low: "9".to_string(),
            close: "10.5".to_string(),
            volume: "0.123456".to_string(),
        }])
    }

    async fn submit_order(
        &self,
        _request: &OrderRequest,
        _client_order_id: &str,
    ) -> FeedResult<NewOrderAck> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        Ok(NewOrderAck { order_id: 42 })
    }

    async fn subscribe(
        &self,
        _streams: &[String],
        callback: StreamCallback,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> FeedResult<()> {
        callback(StreamSignal::Connected);
        let _ = shutdown_rx.recv().await;
        Ok(())
    }

    async fn ping(&self) -> FeedResult<()> {
        Ok(())
    }
}

/// Poll until `check` passes or the deadline expires.
pub async fn wait_until(check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("Condition not reached within deadline");
}
