//! Order submission gated on upstream readiness.
//!
//! `order` returns a [`TradeHandle`] immediately; the actual POST waits
//! until the readiness signal flips, so callers behave identically
//! whether they submit before or after the feed is live. Each handle
//! carries its own event channel: `Submitted` with the venue order id on
//! success, `Failed` with the original request otherwise.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bus::{EventBus, FeedEvent};
use crate::error::FeedError;
use crate::venue::MarketApi;

/// Side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Limit,
    Market,
}

impl OrderType {
    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderType::Limit => "LIMIT",
            OrderType::Market => "MARKET",
        }
    }
}

/// An order to submit.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub symbol: String,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub quantity: Decimal,
    /// Required for limit orders
    pub price: Option<Decimal>,
}

/// Lifecycle events published per order.
#[derive(Debug, Clone)]
pub enum TradeEvent {
    /// The venue accepted the order; carries its order id
    Submitted(i64),
    /// Submission failed; carries the request that failed
    Failed {
        request: OrderRequest,
        reason: String,
    },
}

/// Handle to one in-flight order.
///
/// Holds a receiver opened before submission starts, so no event can be
/// missed between `order` returning and the first `next_event` call.
/// Dropping the handle drops the subscription; the order itself is not
/// cancelled.
pub struct TradeHandle {
    client_order_id: String,
    sender: broadcast::Sender<TradeEvent>,
    events: broadcast::Receiver<TradeEvent>,
}

impl TradeHandle {
    /// Client order id attached to the submission.
    pub fn client_order_id(&self) -> &str {
        &self.client_order_id
    }

    /// Wait for the next lifecycle event. Returns `None` once the order
    /// task has finished and all events were consumed.
    pub async fn next_event(&mut self) -> Option<TradeEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Open an additional subscription to this order's events.
    pub fn subscribe(&self) -> broadcast::Receiver<TradeEvent> {
        self.sender.subscribe()
    }
}

/// Order gateway gated on a readiness signal.
///
/// Readiness is edge-triggered and one-shot: it is flipped exactly once
/// by an external component (typically a bus subscriber on the engine's
/// ready event), and every submission waits for it.
pub struct Trader {
    api: Arc<dyn MarketApi>,
    bus: Arc<EventBus>,
    ready_tx: watch::Sender<bool>,
}

impl Trader {
    /// Create a trader over the venue API.
    pub fn new(api: Arc<dyn MarketApi>, bus: Arc<EventBus>) -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self { api, bus, ready_tx }
    }

    /// Whether submissions currently start immediately.
    pub fn is_ready(&self) -> bool {
        *self.ready_tx.borrow()
    }

    /// Flip the readiness signal; deferred submissions start now.
    pub fn set_ready(&self) {
        if !self.ready_tx.send_replace(true) {
            info!("Trader ready, releasing deferred orders");
        }
    }

    /// Submit an order, returning its handle immediately.
    ///
    /// If the trader is not yet ready, submission is deferred until it
    /// is. `timeout`, when given, bounds the whole wait-then-submit; on
    /// expiry the handle receives `Failed` with a timeout reason.
    pub fn order(&self, timeout: Option<Duration>, request: OrderRequest) -> TradeHandle {
        let (sender, events) = broadcast::channel(16);
        let client_order_id = Uuid::new_v4().simple().to_string();
        let handle = TradeHandle {
            client_order_id: client_order_id.clone(),
            sender: sender.clone(),
            events,
        };

        let api = self.api.clone();
        let bus = self.bus.clone();
        let mut ready_rx = self.ready_tx.subscribe();
        tokio::spawn(async move {
            let submit = async {
                ready_rx
                    .wait_for(|ready| *ready)
                    .await
                    .map_err(|_| FeedError::Closed)?;
                debug!("Submitting order {} for {}", client_order_id, request.symbol);
                api.submit_order(&request, &client_order_id).await
            };

            let result = match timeout {
                Some(deadline) => match tokio::time::timeout(deadline, submit).await {
                    Ok(result) => result,
                    Err(_) => Err(FeedError::Timeout(format!(
                        "Order not submitted within {:?}",
                        deadline
                    ))),
                },
                None => submit.await,
            };

            match result {
                Ok(ack) => {
                    info!(
                        "Order {} submitted as {}",
                        client_order_id, ack.order_id
                    );
                    let _ = sender.send(TradeEvent::Submitted(ack.order_id));
                }
                Err(e) => {
                    warn!("Order {} failed: {}", client_order_id, e);
                    bus.emit(&FeedEvent::Error(e.to_string()));
                    let _ = sender.send(TradeEvent::Failed {
                        request,
                        reason: e.to_string(),
                    });
                }
            }
        });

        handle
    }
}
