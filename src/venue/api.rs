//! The venue API seam.
//!
//! The engine and trader depend on `Arc<dyn MarketApi>` rather than on a
//! concrete transport, so tests can substitute a mock and the production
//! wiring stays in one place.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use super::endpoints::{paths, Endpoints};
use super::http::HttpClient;
use super::types::{DepthSnapshot, KlineRecord, NewOrderAck, RecentTrade};
use super::ws::{self, StreamCallback};
use crate::error::{FeedError, FeedResult};
use crate::trader::{OrderRequest, OrderType};

/// Venue operations the engine and trader consume.
#[async_trait]
pub trait MarketApi: Send + Sync {
    /// Fetch a depth snapshot for a symbol.
    async fn depth(&self, symbol: &str) -> FeedResult<DepthSnapshot>;

    /// Fetch the most recent trades for a symbol.
    async fn recent_trades(&self, symbol: &str, limit: u32) -> FeedResult<Vec<RecentTrade>>;

    /// Fetch k-line history for a symbol and interval label.
    async fn klines(&self, symbol: &str, interval: &str) -> FeedResult<Vec<KlineRecord>>;

    /// Submit an order; resolves to the venue's acknowledgement.
    async fn submit_order(
        &self,
        request: &OrderRequest,
        client_order_id: &str,
    ) -> FeedResult<NewOrderAck>;

    /// Open the combined stream and run it until shutdown or failure.
    async fn subscribe(
        &self,
        streams: &[String],
        callback: StreamCallback,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> FeedResult<()>;

    /// Test connectivity.
    async fn ping(&self) -> FeedResult<()>;
}

/// Binance spot implementation of [`MarketApi`].
pub struct BinanceClient {
    http: Arc<HttpClient>,
    endpoints: Endpoints,
}

impl BinanceClient {
    /// Create a client over an HTTP transport and endpoint set.
    pub fn new(http: Arc<HttpClient>, endpoints: Endpoints) -> Self {
        Self { http, endpoints }
    }

    fn parse_kline_rows(rows: Vec<Vec<serde_json::Value>>) -> FeedResult<Vec<KlineRecord>> {
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() < 6 {
                return Err(FeedError::Parse(format!(
                    "K-line row has {} fields, expected at least 6",
                    row.len()
                )));
            }
            let open_time = row[0]
                .as_i64()
                .ok_or_else(|| FeedError::Parse("K-line open time is not an integer".to_string()))?;
            let field = |i: usize| -> FeedResult<String> {
                row[i]
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| FeedError::Parse(format!("K-line field {} is not a string", i)))
            };
            records.push(KlineRecord {
                open_time,
                open: field(1)?,
                high: field(2)?,
                low: field(3)?,
                close: field(4)?,
                volume: field(5)?,
            });
        }
        Ok(records)
    }
}

#[async_trait]
impl MarketApi for BinanceClient {
    async fn depth(&self, symbol: &str) -> FeedResult<DepthSnapshot> {
        self.http
            .get_public(paths::DEPTH, &[("symbol", symbol)])
            .await
    }

    async fn recent_trades(&self, symbol: &str, limit: u32) -> FeedResult<Vec<RecentTrade>> {
        let limit = limit.to_string();
        self.http
            .get_public(paths::TRADES, &[("symbol", symbol), ("limit", &limit)])
            .await
    }

    async fn klines(&self, symbol: &str, interval: &str) -> FeedResult<Vec<KlineRecord>> {
        let rows: Vec<Vec<serde_json::Value>> = self
            .http
            .get_public(paths::KLINES, &[("symbol", symbol), ("interval", interval)])
            .await?;
        Self::parse_kline_rows(rows)
    }

    async fn submit_order(
        &self,
        request: &OrderRequest,
        client_order_id: &str,
    ) -> FeedResult<NewOrderAck> {
        let side = request.side.as_str();
        let order_type = request.order_type.as_str();
        let quantity = request.quantity.to_string();

        let mut params = vec![
            ("symbol", request.symbol.as_str()),
            ("side", side),
            ("type", order_type),
            ("quantity", &quantity),
            ("newClientOrderId", client_order_id),
        ];

        let price;
        if request.order_type == OrderType::Limit {
            match request.price {
                Some(p) => {
                    price = p.to_string();
                    params.push(("price", &price));
                    params.push(("timeInForce", "GTC"));
                }
                None => {
                    return Err(FeedError::Configuration(
                        "Limit order requires a price".to_string(),
                    ))
                }
            }
        }

        debug!("Submitting order: {:?}", params);

        self.http.post_signed(paths::ORDER, &params).await
    }

    async fn subscribe(
        &self,
        streams: &[String],
        callback: StreamCallback,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> FeedResult<()> {
        let url = self.endpoints.combined_stream_url(streams);
        ws::run(&url, callback, shutdown_rx).await
    }

    async fn ping(&self) -> FeedResult<()> {
        let _: serde_json::Value = self.http.get_public(paths::PING, &[]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_kline_rows() {
        let rows: Vec<Vec<serde_json::Value>> = vec![vec![
            json!(1672515780000i64),
            json!("50000.0"),
            json!("50100.0"),
            json!("49990.0"),
            json!("50050.0"),
            json!("12.345"),
            json!(1672515839999i64),
            json!("617250.0"),
        ]];

        let records = BinanceClient::parse_kline_rows(rows).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].open_time, 1672515780000);
        assert_eq!(records[0].open, "50000.0");
        assert_eq!(records[0].volume, "12.345");
    }

    #[test]
    fn test_parse_kline_rows_short_row() {
        let rows = vec![vec![json!(1), json!("1")]];
        assert!(matches!(
            BinanceClient::parse_kline_rows(rows),
            Err(FeedError::Parse(_))
        ));
    }
}
