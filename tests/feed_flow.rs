//! End-to-end engine scenarios over the mock venue: the startup barrier,
//! snapshot/diff fusion, stale-diff handling, dispatch fan-out, and the
//! depth-gap resnapshot.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal_macros::dec;

use binance_feed::bus::{EventBus, EventKind, FeedEvent};
use binance_feed::data::TradeSide;
use binance_feed::engine::{EngineSettings, StreamEngine};

use common::{wait_until, MockApi};

fn test_settings() -> EngineSettings {
    EngineSettings {
        periods: vec![1],
        trade_seed_limit: 100,
    }
}

#[tokio::test]
async fn orderbook_open_fires_once_after_all_snapshots() {
    let api = Arc::new(MockApi::new().with_snapshot("BTCUSDT", 100).with_snapshot("ETHUSDT", 200));
    let gate_btc = api.gate_depth("BTCUSDT");
    let gate_eth = api.gate_depth("ETHUSDT");

    let bus = Arc::new(EventBus::new());
    let book_opens: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(Vec::new()));
    let ready_count = Arc::new(AtomicUsize::new(0));
    {
        let book_opens = book_opens.clone();
        bus.on(EventKind::OrderBookOpen, move |event| {
            if let FeedEvent::OrderBookOpen(books) = event {
                let mut symbols: Vec<String> = books.keys().cloned().collect();
                symbols.sort();
                book_opens.lock().push(symbols);
            }
        });
    }
    {
        let ready_count = ready_count.clone();
        bus.on(EventKind::Ready, move |_| {
            ready_count.fetch_add(1, Ordering::SeqCst);
        });
    }

    let engine = StreamEngine::new(api.clone(), bus, test_settings());
    engine
        .start(&["BTCUSDT".to_string(), "ETHUSDT".to_string()])
        .await
        .unwrap();

    // Trades and k-lines are ungated; wait for their seeds to land.
    wait_until(|| engine.trade_book("BTCUSDT").map(|t| t.len()) == Some(3)).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(book_opens.lock().is_empty());
    assert_eq!(ready_count.load(Ordering::SeqCst), 0);

    // First symbol alone must not open the books.
    gate_btc.send(true).unwrap();
    wait_until(|| engine.order_book("BTCUSDT").map(|b| b.generation()) == Some(100)).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(book_opens.lock().is_empty());

    gate_eth.send(true).unwrap();
    wait_until(|| !book_opens.lock().is_empty()).await;
    wait_until(|| ready_count.load(Ordering::SeqCst) == 1).await;

    let opens = book_opens.lock();
    assert_eq!(opens.len(), 1);
    assert_eq!(opens[0], vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]);
    assert!(engine.is_ready());

    engine.stop();
}

#[tokio::test]
async fn snapshot_then_diff() {
    let api = Arc::new(MockApi::new().with_snapshot("BTCUSDT", 100));
    let bus = Arc::new(EventBus::new());
    let engine = StreamEngine::new(api, bus, test_settings());
    engine.start(&["BTCUSDT".to_string()]).await.unwrap();
    wait_until(|| engine.is_ready()).await;

    engine.dispatch(
        r#"{"stream":"btcusdt@depth","data":{"e":"depthUpdate","E":1,"s":"BTCUSDT","U":101,"u":101,"b":[["10","0"]],"a":[["12","3"]]}}"#,
    );

    let book = engine.order_book("BTCUSDT").unwrap();
    assert_eq!(book.generation(), 101);
    assert!(book.bids(10).is_empty());
    assert_eq!(book.asks(10), vec![(dec!(11), dec!(2)), (dec!(12), dec!(3))]);
    assert_eq!(book.best_ask(), Some((dec!(11), dec!(2))));
    assert_eq!(book.best_bid(), None);

    engine.stop();
}

#[tokio::test]
async fn stale_diff_is_dropped() {
    let api = Arc::new(MockApi::new().with_snapshot("BTCUSDT", 200));
    let bus = Arc::new(EventBus::new());
    let engine = StreamEngine::new(api, bus, test_settings());
    engine.start(&["BTCUSDT".to_string()]).await.unwrap();
    wait_until(|| engine.is_ready()).await;

    let before = engine.order_book("BTCUSDT").unwrap();
    engine.dispatch(
        r#"{"stream":"btcusdt@depth","data":{"e":"depthUpdate","E":1,"s":"BTCUSDT","U":199,"u":199,"b":[],"a":[["50","1"]]}}"#,
    );

    let after = engine.order_book("BTCUSDT").unwrap();
    assert_eq!(after.generation(), 200);
    assert_eq!(after.asks(10), before.asks(10));

    engine.stop();
}

#[tokio::test]
async fn depth_gap_triggers_resnapshot() {
    let api = Arc::new(MockApi::new().with_snapshot("BTCUSDT", 100));
    let bus = Arc::new(EventBus::new());
    let engine = StreamEngine::new(api.clone(), bus, test_settings());
    engine.start(&["BTCUSDT".to_string()]).await.unwrap();
    wait_until(|| engine.is_ready()).await;
    assert_eq!(api.depth_calls_for("BTCUSDT"), 1);

    // First post-commit diff skips generation 101: out of range.
    engine.dispatch(
        r#"{"stream":"btcusdt@depth","data":{"e":"depthUpdate","E":1,"s":"BTCUSDT","U":105,"u":106,"b":[["9","5"]],"a":[]}}"#,
    );

    wait_until(|| api.depth_calls_for("BTCUSDT") == 2).await;
    // The gapped diff itself was not applied.
    let book = engine.order_book("BTCUSDT").unwrap();
    assert!(!book.bids(10).contains(&(dec!(9), dec!(5))));

    engine.stop();
}

#[tokio::test]
async fn trade_tape_seeded_and_live_trades_bus_only() {
    let api = Arc::new(MockApi::new().with_snapshot("BTCUSDT", 100));
    let bus = Arc::new(EventBus::new());
    let trades_seen = Arc::new(Mutex::new(Vec::new()));
    {
        let trades_seen = trades_seen.clone();
        bus.on(EventKind::Trade, move |event| {
            if let FeedEvent::Trade { data, .. } = event {
                trades_seen.lock().push(data.clone());
            }
        });
    }

    let engine = StreamEngine::new(api, bus, test_settings());
    engine.start(&["BTCUSDT".to_string()]).await.unwrap();
    wait_until(|| engine.is_ready()).await;

    let tape = engine.trade_book("BTCUSDT").unwrap();
    assert_eq!(tape.len(), 3);
    let recent = tape.fetch(2);
    assert_eq!(recent[0].tid, 3);
    assert_eq!(recent[1].tid, 2);
    // Maker flag labeling: isBuyerMaker=true reads as buy.
    assert_eq!(recent[1].side, TradeSide::Buy);

    engine.dispatch(
        r#"{"stream":"btcusdt@trade","data":{"e":"trade","E":1672515782136,"s":"BTCUSDT","t":12345,"p":"50000.00","q":"0.001","T":1672515782136,"m":false,"M":true}}"#,
    );

    let seen = trades_seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].tid, 12345);
    assert_eq!(seen[0].side, TradeSide::Sell);
    assert_eq!(seen[0].date, 1672515782);
    // The tape stays as seeded.
    assert_eq!(engine.trade_book("BTCUSDT").unwrap().len(), 3);

    engine.stop();
}

#[tokio::test]
async fn ticker_and_kline_frames_fan_out() {
    let api = Arc::new(MockApi::new().with_snapshot("BTCUSDT", 100));
    let bus = Arc::new(EventBus::new());
    let tickers = Arc::new(Mutex::new(Vec::new()));
    let klines = Arc::new(Mutex::new(Vec::new()));
    {
        let tickers = tickers.clone();
        bus.on(EventKind::Ticker, move |event| {
            if let FeedEvent::Ticker { data, .. } = event {
                tickers.lock().push(data.clone());
            }
        });
    }
    {
        let klines = klines.clone();
        bus.on(EventKind::Kline, move |event| {
            if let FeedEvent::Kline { period, data, .. } = event {
                klines.lock().push((*period, data.clone()));
            }
        });
    }

    let engine = StreamEngine::new(api, bus, test_settings());
    engine.start(&["BTCUSDT".to_string()]).await.unwrap();
    wait_until(|| engine.is_ready()).await;

    engine.dispatch(
        r#"{"stream":"btcusdt@ticker","data":{"e":"24hrTicker","E":1,"s":"BTCUSDT","p":"100.0","P":"0.25","w":"50050.0","c":"50100.0","o":"50000.0","h":"50500.0","l":"49500.0","v":"1234.5","q":"0","b":"50099.0","a":"50101.0"}}"#,
    );
    engine.dispatch(
        r#"{"stream":"btcusdt@kline_1m","data":{"e":"kline","E":1,"s":"BTCUSDT","k":{"t":1700000000000,"T":1700000059999,"s":"BTCUSDT","i":"1m","o":"10","c":"10.5","h":"11","l":"9","v":"0.123456","n":5,"x":false,"q":"1.2"}}}"#,
    );

    {
        let tickers = tickers.lock();
        assert_eq!(tickers.len(), 1);
        assert_eq!(tickers[0].last, dec!(50100.0));
        assert_eq!(tickers[0].price_change_percent, "0.25");
    }
    {
        let klines = klines.lock();
        assert_eq!(klines.len(), 1);
        assert_eq!(klines[0].0, 1);
        assert_eq!(klines[0].1.open_time, 1_700_000_000);
        assert_eq!(klines[0].1.volume, dec!(0.1235));
    }

    // Live k-line updates are forwarded, not persisted: only the seed bar.
    assert_eq!(
        engine.kline_series("BTCUSDT").unwrap().len(1),
        Some(1)
    );

    engine.stop();
}

#[tokio::test]
async fn start_rejects_bad_configuration() {
    let api = Arc::new(MockApi::new());
    let bus = Arc::new(EventBus::new());

    let engine = StreamEngine::new(api.clone(), bus.clone(), test_settings());
    assert!(engine.start(&[]).await.is_err());

    let engine = StreamEngine::new(
        api,
        bus,
        EngineSettings {
            periods: vec![7],
            trade_seed_limit: 100,
        },
    );
    assert!(engine.start(&["BTCUSDT".to_string()]).await.is_err());
}

#[tokio::test]
async fn stop_releases_stores_and_silences_dispatch() {
    let api = Arc::new(MockApi::new().with_snapshot("BTCUSDT", 100));
    let bus = Arc::new(EventBus::new());
    let engine = StreamEngine::new(api, bus, test_settings());
    engine.start(&["BTCUSDT".to_string()]).await.unwrap();
    wait_until(|| engine.is_ready()).await;

    engine.stop();
    assert!(engine.order_book("BTCUSDT").is_none());

    // Late frames are no-ops.
    engine.dispatch(
        r#"{"stream":"btcusdt@depth","data":{"e":"depthUpdate","E":1,"s":"BTCUSDT","U":101,"u":101,"b":[],"a":[["12","3"]]}}"#,
    );
}
