use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use binance_feed::bus::{EventBus, EventKind, FeedEvent};
use binance_feed::config::Settings;
use binance_feed::engine::{EngineSettings, StreamEngine};
use binance_feed::error::FeedResult;
use binance_feed::trader::Trader;
use binance_feed::venue::{BinanceClient, BinanceHmacSigner, Endpoints, HttpClient, MarketApi};
use binance_feed::{logging, FeedError};

#[tokio::main]
async fn main() -> FeedResult<()> {
    logging::init("info");

    let settings = Settings::new()
        .map_err(|e| FeedError::Configuration(format!("Failed to load settings: {}", e)))?;
    settings.validate()?;

    info!("Starting feed for markets: {:?}", settings.markets);

    let endpoints = Endpoints::for_env(settings.testnet);
    let signer = BinanceHmacSigner::new(
        settings.api_key.clone().unwrap_or_default(),
        settings.api_secret.clone().unwrap_or_default(),
    );
    let http = Arc::new(HttpClient::new(
        endpoints.rest_url.clone(),
        Arc::new(signer),
        Duration::from_secs(settings.http_timeout_secs),
        settings.recv_window_ms,
    )?);
    let api = Arc::new(BinanceClient::new(http, endpoints));

    api.ping().await?;
    info!("Venue reachable");

    let bus = Arc::new(EventBus::new());
    bus.on(EventKind::Error, |event| {
        if let FeedEvent::Error(message) = event {
            error!("Upstream error: {}", message);
        }
    });
    bus.on(EventKind::OrderBookOpen, |event| {
        if let FeedEvent::OrderBookOpen(books) = event {
            info!("Order books open for {} symbols", books.len());
        }
    });
    bus.on(EventKind::TradeBookOpen, |event| {
        if let FeedEvent::TradeBookOpen(books) = event {
            info!("Trade tapes seeded for {} symbols", books.len());
        }
    });
    bus.on(EventKind::KlineOpen, |event| {
        if let FeedEvent::KlineOpen(series) = event {
            info!("K-line series loaded for {} symbols", series.len());
        }
    });
    bus.on(EventKind::Ticker, |event| {
        if let FeedEvent::Ticker { symbol, data } = event {
            debug!("{} last={} spread {}..{}", symbol, data.last, data.buy, data.sell);
        }
    });

    let trader = Arc::new(Trader::new(api.clone(), bus.clone()));
    {
        let trader = trader.clone();
        bus.on(EventKind::Ready, move |_| {
            info!("Feed ready");
            trader.set_ready();
        });
    }

    let engine = StreamEngine::new(api, bus, EngineSettings {
        periods: settings.kline_periods.clone(),
        trade_seed_limit: settings.trade_seed_limit,
    });
    engine.start(&settings.markets).await?;

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| FeedError::Configuration(format!("Failed to listen for ctrl-c: {}", e)))?;
    info!("Shutdown signal received");
    engine.stop();

    Ok(())
}
