//! In-process event bus.
//!
//! A minimal named-event publish/subscribe facility shared by the stream
//! engine and the trader. Handlers for a kind run synchronously in
//! registration order; one-shot semantics are the subscriber's business.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::data::{KLineSeries, KlinePoint, OrderBook, TickerStats, TradeBook, TradeTick};

/// Kinds of events carried on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// All depth snapshots committed; payload is every order book
    OrderBookOpen,
    /// All trade tapes seeded; payload is every trade book
    TradeBookOpen,
    /// All k-line histories loaded; payload is every series
    KlineOpen,
    /// Live 24h ticker update
    Ticker,
    /// Live trade
    Trade,
    /// Live k-line update
    Kline,
    /// Every startup snapshot has loaded
    Ready,
    /// Transport or upstream failure
    Error,
}

/// An event with its payload. Payloads are owned copies of engine state,
/// never aliases into it.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    OrderBookOpen(HashMap<String, OrderBook>),
    TradeBookOpen(HashMap<String, TradeBook>),
    KlineOpen(HashMap<String, KLineSeries>),
    Ticker {
        symbol: String,
        data: TickerStats,
    },
    Trade {
        symbol: String,
        data: TradeTick,
    },
    Kline {
        symbol: String,
        /// Period in minutes
        period: u32,
        data: KlinePoint,
    },
    Ready,
    Error(String),
}

impl FeedEvent {
    /// The kind this event is delivered under.
    pub fn kind(&self) -> EventKind {
        match self {
            FeedEvent::OrderBookOpen(_) => EventKind::OrderBookOpen,
            FeedEvent::TradeBookOpen(_) => EventKind::TradeBookOpen,
            FeedEvent::KlineOpen(_) => EventKind::KlineOpen,
            FeedEvent::Ticker { .. } => EventKind::Ticker,
            FeedEvent::Trade { .. } => EventKind::Trade,
            FeedEvent::Kline { .. } => EventKind::Kline,
            FeedEvent::Ready => EventKind::Ready,
            FeedEvent::Error(_) => EventKind::Error,
        }
    }
}

/// Callback registered for an event kind.
pub type EventHandler = Arc<dyn Fn(&FeedEvent) + Send + Sync>;

/// Named-event publish/subscribe.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<EventKind, Vec<EventHandler>>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an event kind.
    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&FeedEvent) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .entry(kind)
            .or_default()
            .push(Arc::new(handler));
    }

    /// Deliver an event to every handler of its kind, in registration
    /// order, on the calling task.
    pub fn emit(&self, event: &FeedEvent) {
        let handlers: Vec<EventHandler> = {
            let map = self.handlers.read();
            match map.get(&event.kind()) {
                Some(list) => list.clone(),
                None => return,
            }
        };
        for handler in handlers {
            handler(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let seen = seen.clone();
            bus.on(EventKind::Ready, move |_| seen.lock().push(i));
        }

        bus.emit(&FeedEvent::Ready);
        assert_eq!(*seen.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_emit_without_handlers() {
        let bus = EventBus::new();
        bus.emit(&FeedEvent::Error("nobody listening".to_string()));
    }

    #[test]
    fn test_kinds_are_independent() {
        let bus = EventBus::new();
        let ready = Arc::new(Mutex::new(0u32));
        let errors = Arc::new(Mutex::new(0u32));

        {
            let ready = ready.clone();
            bus.on(EventKind::Ready, move |_| *ready.lock() += 1);
        }
        {
            let errors = errors.clone();
            bus.on(EventKind::Error, move |_| *errors.lock() += 1);
        }

        bus.emit(&FeedEvent::Ready);
        bus.emit(&FeedEvent::Ready);
        bus.emit(&FeedEvent::Error("x".to_string()));

        assert_eq!(*ready.lock(), 2);
        assert_eq!(*errors.lock(), 1);
    }
}
