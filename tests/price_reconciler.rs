//! Price Reconciler Tests - Oracle Push, Ticker Pull, Connection Lifecycle
//!
//! Ticker responses come from a mockall mock; the oracle side is a small
//! fake that counts subscribe calls and live subscriptions so reconnects
//! can be checked for leaks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mockall::mock;
use rust_decimal_macros::dec;
use tokio::sync::{broadcast, mpsc, oneshot};

use perp_order_client::adapters::ui::BroadcastNotifier;
use perp_order_client::domain::market::{AssetSpec, FeedId, Market, MarketCatalog};
use perp_order_client::domain::price::{
    CAP_FALLBACK_PRICE, OracleUpdate, PricePoint, Ticker, TickerKind,
};
use perp_order_client::ports::market_feed::{OracleStream, SubscriptionHandle};
use perp_order_client::ports::notifier::UiEvent;
use perp_order_client::usecases::{
    AppState, ConnectionState, PriceReconciler, ReconcilerCommand, ReconcilerConfig,
};

mock! {
    pub Tickers {}

    #[async_trait::async_trait]
    impl perp_order_client::ports::market_feed::TickerSource for Tickers {
        async fn fetch_tickers(
            &self,
            kind: &perp_order_client::domain::price::TickerKind,
        ) -> anyhow::Result<
            std::collections::HashMap<String, perp_order_client::domain::price::Ticker>,
        >;

        async fn fetch_candles(
            &self,
            market: &str,
            resolution: u64,
            end: i64,
        ) -> anyhow::Result<Vec<perp_order_client::domain::price::Candle>>;

        async fn fetch_cap_price(&self) -> anyhow::Result<Option<rust_decimal::Decimal>>;
    }
}

/// Oracle stream that tracks how many subscriptions are alive.
#[derive(Default)]
struct FakeOracle {
    subscribes: AtomicUsize,
    active: Arc<AtomicUsize>,
    fail: AtomicBool,
    last_feeds: Mutex<Vec<FeedId>>,
}

#[async_trait::async_trait]
impl OracleStream for FakeOracle {
    async fn subscribe(
        &self,
        feed_ids: Vec<FeedId>,
        _updates: mpsc::Sender<OracleUpdate>,
    ) -> anyhow::Result<SubscriptionHandle> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        *self.last_feeds.lock().unwrap() = feed_ids;

        self.active.fetch_add(1, Ordering::SeqCst);
        let active = Arc::clone(&self.active);
        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _ = rx.await;
            active.fetch_sub(1, Ordering::SeqCst);
        });
        Ok(SubscriptionHandle::new(tx, task))
    }
}

const BTC_FEED: &str = "f9c0172ba10dfa4d19088d94f5bf61d3b54d5bd7483a322a982e1373ee8ea31b";
const ETH_FEED: &str = "ca80ba6dc32e08d06f1aa886011eed1d77c77be9eb761cc10d72b7d0a2fd57a6";
const NOW: i64 = 1_700_000_000;

fn catalog() -> MarketCatalog {
    MarketCatalog::new(
        vec![
            Market {
                id: "BTC-USD".into(),
                oracle_feed: BTC_FEED.into(),
                fee_bps: 10,
                max_leverage: dec!(50),
            },
            Market {
                id: "ETH-USD".into(),
                oracle_feed: format!("0x{}", ETH_FEED.to_uppercase()),
                fee_bps: 10,
                max_leverage: dec!(50),
            },
        ],
        vec![AssetSpec::native_eth()],
    )
}

fn btc_update(mantissa: i64, publish_time: i64) -> OracleUpdate {
    OracleUpdate {
        feed_id: format!("0x{BTC_FEED}"),
        mantissa,
        exponent: -8,
        publish_time,
    }
}

fn ticker(c: rust_decimal::Decimal, t: i64) -> Ticker {
    Ticker { o: c, h: c, l: c, c, t }
}

type Reconciler = PriceReconciler<MockTickers, FakeOracle, BroadcastNotifier>;

struct Harness {
    reconciler: Reconciler,
    oracle: Arc<FakeOracle>,
    notifier: Arc<BroadcastNotifier>,
    state: Arc<AppState>,
}

fn harness(tickers: MockTickers, catalog: MarketCatalog) -> Harness {
    let oracle = Arc::new(FakeOracle::default());
    let notifier = Arc::new(BroadcastNotifier::default());
    let state = Arc::new(AppState::new(catalog));
    let reconciler = PriceReconciler::new(
        Arc::new(tickers),
        Arc::clone(&oracle),
        Arc::clone(&notifier),
        Arc::clone(&state),
        ReconcilerConfig {
            focus_market: Some("BTC-USD".into()),
            ..ReconcilerConfig::default()
        },
    );
    Harness {
        reconciler,
        oracle,
        notifier,
        state,
    }
}

// ---- Push source ----

#[tokio::test]
async fn test_connect_subscribes_to_every_feed_once() {
    let mut h = harness(MockTickers::new(), catalog());

    assert_eq!(h.reconciler.connect().await, ConnectionState::Connected);
    assert!(h.state.is_oracle_connected());

    let feeds = h.oracle.last_feeds.lock().unwrap().clone();
    assert_eq!(feeds, vec![ETH_FEED.to_string(), BTC_FEED.to_string()]);
}

#[tokio::test]
async fn test_reconnect_closes_previous_subscription() {
    let mut h = harness(MockTickers::new(), catalog());

    h.reconciler.connect().await;
    h.reconciler.connect().await;

    assert_eq!(h.oracle.subscribes.load(Ordering::SeqCst), 2);
    assert_eq!(h.oracle.active.load(Ordering::SeqCst), 1);

    h.reconciler.close().await;
    assert_eq!(h.oracle.active.load(Ordering::SeqCst), 0);
    assert_eq!(h.reconciler.connection_state(), ConnectionState::Disconnected);
    assert!(!h.state.is_oracle_connected());
}

#[tokio::test]
async fn test_connect_defers_without_reference_market() {
    let mut h = harness(MockTickers::new(), MarketCatalog::default());

    assert_eq!(h.reconciler.connect().await, ConnectionState::AwaitingMetadata);
    assert_eq!(h.oracle.subscribes.load(Ordering::SeqCst), 0);
    assert!(!h.state.is_oracle_connected());
}

#[tokio::test]
async fn test_failed_subscribe_waits_for_retry() {
    let mut h = harness(MockTickers::new(), catalog());
    h.oracle.fail.store(true, Ordering::SeqCst);

    assert_eq!(h.reconciler.connect().await, ConnectionState::AwaitingMetadata);
    assert_eq!(h.oracle.active.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_staleness_window() {
    let mut h = harness(MockTickers::new(), catalog());
    h.reconciler.connect().await;

    let stale = btc_update(6_500_000_000_000, NOW - 61);
    assert!(!h.reconciler.apply_oracle_update(&stale, NOW).await);
    assert_eq!(h.state.prices().get("BTC-USD").await, None);

    let fresh = btc_update(6_500_000_000_000, NOW - 59);
    assert!(h.reconciler.apply_oracle_update(&fresh, NOW).await);
    assert_eq!(
        h.state.prices().get("BTC-USD").await,
        Some(PricePoint {
            price: dec!(65000),
            timestamp: NOW - 59,
        })
    );

    let boundary = btc_update(6_600_000_000_000, NOW - 60);
    assert!(h.reconciler.apply_oracle_update(&boundary, NOW).await);
    assert_eq!(h.state.prices().price("BTC-USD").await, Some(dec!(66000)));
}

#[tokio::test]
async fn test_updates_after_close_are_dropped() {
    let mut h = harness(MockTickers::new(), catalog());
    h.reconciler.connect().await;
    h.reconciler.close().await;

    assert!(!h.reconciler.apply_oracle_update(&btc_update(6_500_000_000_000, NOW), NOW).await);
    assert_eq!(h.state.prices().get("BTC-USD").await, None);

    h.reconciler.connect().await;
    assert!(h.reconciler.apply_oracle_update(&btc_update(6_500_000_000_000, NOW), NOW).await);
}

#[tokio::test]
async fn test_unknown_feed_is_ignored() {
    let mut h = harness(MockTickers::new(), catalog());
    h.reconciler.connect().await;

    let update = OracleUpdate {
        feed_id: "deadbeef".into(),
        mantissa: 100,
        exponent: 0,
        publish_time: NOW,
    };
    assert!(!h.reconciler.apply_oracle_update(&update, NOW).await);
    assert_eq!(h.state.prices().len().await, 0);
}

#[tokio::test]
async fn test_page_title_follows_focus_market_changes() {
    let mut h = harness(MockTickers::new(), catalog());
    let mut events = h.notifier.subscribe();
    h.reconciler.connect().await;

    h.reconciler
        .apply_oracle_update(&btc_update(6_500_012_000_000, NOW), NOW)
        .await;
    assert_eq!(
        events.try_recv().unwrap(),
        UiEvent::PageTitle("65000.12 BTC-USD".into())
    );

    // Same price again: no new title.
    h.reconciler
        .apply_oracle_update(&btc_update(6_500_012_000_000, NOW + 1), NOW + 1)
        .await;
    assert!(events.try_recv().is_err());

    // Other markets never touch the title.
    let eth = OracleUpdate {
        feed_id: ETH_FEED.into(),
        mantissa: 350_000_000_000,
        exponent: -8,
        publish_time: NOW,
    };
    assert!(h.reconciler.apply_oracle_update(&eth, NOW).await);
    assert!(events.try_recv().is_err());
}

// ---- Pull source ----

#[tokio::test]
async fn test_latest_tickers_overwrite_prices() {
    let mut tickers = MockTickers::new();
    tickers
        .expect_fetch_tickers()
        .withf(|kind| *kind == TickerKind::Latest)
        .times(1)
        .returning(|_| {
            Ok(HashMap::from([
                ("BTC-USD".to_string(), ticker(dec!(64000), NOW - 600)),
                ("ETH-USD".to_string(), ticker(dec!(3400), NOW - 600)),
            ]))
        });

    let mut h = harness(tickers, catalog());
    h.reconciler.connect().await;
    h.reconciler
        .apply_oracle_update(&btc_update(6_500_000_000_000, NOW), NOW)
        .await;

    // Snapshots win regardless of their age.
    let snapshot = h.reconciler.refresh_tickers(&TickerKind::Latest).await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(
        h.state.prices().get("BTC-USD").await,
        Some(PricePoint {
            price: dec!(64000),
            timestamp: NOW - 600,
        })
    );
    assert_eq!(h.state.prices().price("ETH-USD").await, Some(dec!(3400)));
}

#[tokio::test]
async fn test_other_ticker_kind_fills_ohlc_only() {
    let mut tickers = MockTickers::new();
    tickers
        .expect_fetch_tickers()
        .withf(|kind| kind.as_str() == "24h")
        .times(1)
        .returning(|_| {
            Ok(HashMap::from([(
                "BTC-USD".to_string(),
                Ticker {
                    o: dec!(60000),
                    h: dec!(66000),
                    l: dec!(59000),
                    c: dec!(65000),
                    t: NOW,
                },
            )]))
        });

    let h = harness(tickers, catalog());
    let kind = TickerKind::Other("24h".into());
    assert!(h.reconciler.refresh_tickers(&kind).await.is_some());

    assert_eq!(h.state.prices().ohlc("BTC-USD").await.unwrap().h, dec!(66000));
    assert_eq!(h.state.prices().get("BTC-USD").await, None);
}

#[tokio::test]
async fn test_ticker_failure_leaves_state_untouched() {
    let mut tickers = MockTickers::new();
    tickers
        .expect_fetch_tickers()
        .times(1)
        .returning(|_| Err(anyhow::anyhow!("HTTP 502")));
    tickers
        .expect_fetch_candles()
        .times(1)
        .returning(|_, _, _| Err(anyhow::anyhow!("HTTP 502")));

    let h = harness(tickers, catalog());
    h.state
        .prices()
        .set("BTC-USD", PricePoint { price: dec!(1), timestamp: 1 })
        .await;

    assert!(h.reconciler.refresh_tickers(&TickerKind::Latest).await.is_none());
    assert!(h.reconciler.fetch_candles("BTC-USD", 300, NOW).await.is_none());
    assert_eq!(h.state.prices().price("BTC-USD").await, Some(dec!(1)));
}

#[tokio::test]
async fn test_fetch_candles_passes_through() {
    let mut tickers = MockTickers::new();
    tickers
        .expect_fetch_candles()
        .withf(|market, resolution, end| market == "ETH-USD" && *resolution == 3600 && *end == NOW)
        .times(1)
        .returning(|_, _, _| Ok(vec![ticker(dec!(3300), NOW - 3600), ticker(dec!(3400), NOW)]));

    let h = harness(tickers, catalog());
    let candles = h.reconciler.fetch_candles("ETH-USD", 3600, NOW).await.unwrap();
    assert_eq!(candles.len(), 2);
    assert_eq!(candles[1].c, dec!(3400));
}

#[tokio::test]
async fn test_cap_price_stores_latest_close() {
    let mut tickers = MockTickers::new();
    tickers
        .expect_fetch_cap_price()
        .times(1)
        .returning(|| Ok(Some(dec!(1.25))));
    let h = harness(tickers, catalog());

    assert_eq!(h.state.prices().cap_price().await, None);
    assert_eq!(h.reconciler.refresh_cap_price().await, Some(dec!(1.25)));
    assert_eq!(h.state.prices().cap_price().await, Some(dec!(1.25)));
}

#[tokio::test]
async fn test_cap_price_falls_back_without_positive_close() {
    let mut tickers = MockTickers::new();
    let mut seq = mockall::Sequence::new();
    tickers
        .expect_fetch_cap_price()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(None));
    tickers
        .expect_fetch_cap_price()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(Some(dec!(0))));
    let h = harness(tickers, catalog());

    assert_eq!(h.reconciler.refresh_cap_price().await, Some(CAP_FALLBACK_PRICE));
    assert_eq!(h.reconciler.refresh_cap_price().await, Some(dec!(100)));
    assert_eq!(h.state.prices().cap_price().await, Some(dec!(100)));
}

#[tokio::test]
async fn test_cap_price_failure_keeps_previous_value() {
    let mut tickers = MockTickers::new();
    let mut seq = mockall::Sequence::new();
    tickers
        .expect_fetch_cap_price()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(Some(dec!(2.5))));
    tickers
        .expect_fetch_cap_price()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Err(anyhow::anyhow!("subgraph unavailable")));
    let h = harness(tickers, catalog());

    h.reconciler.refresh_cap_price().await;
    assert_eq!(h.reconciler.refresh_cap_price().await, None);
    assert_eq!(h.state.prices().cap_price().await, Some(dec!(2.5)));
}

// ---- Event loop ----

fn idle_tickers() -> MockTickers {
    let mut tickers = MockTickers::new();
    tickers
        .expect_fetch_tickers()
        .returning(|_| Ok(HashMap::new()));
    tickers
}

#[tokio::test(start_paused = true)]
async fn test_run_retries_until_metadata_loads() {
    let h = harness(idle_tickers(), MarketCatalog::default());
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let (_command_tx, command_rx) = mpsc::channel(4);

    let oracle = Arc::clone(&h.oracle);
    let state = Arc::clone(&h.state);
    let handle = tokio::spawn(h.reconciler.run(command_rx, shutdown_rx));

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(oracle.subscribes.load(Ordering::SeqCst), 0);

    state.set_catalog(catalog()).await;
    tokio::time::sleep(Duration::from_millis(2_100)).await;

    assert_eq!(oracle.subscribes.load(Ordering::SeqCst), 1);
    assert!(state.is_oracle_connected());

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
    assert_eq!(oracle.active.load(Ordering::SeqCst), 0);
    assert!(!state.is_oracle_connected());
}

#[tokio::test]
async fn test_run_connect_command_replaces_subscription() {
    let h = harness(idle_tickers(), catalog());
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let (command_tx, command_rx) = mpsc::channel(4);

    let oracle = Arc::clone(&h.oracle);
    let handle = tokio::spawn(h.reconciler.run(command_rx, shutdown_rx));

    command_tx.send(ReconcilerCommand::Connect).await.unwrap();
    command_tx
        .send(ReconcilerCommand::RefreshTickers(TickerKind::Latest))
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(1), async {
        while oracle.subscribes.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    assert_eq!(oracle.active.load(Ordering::SeqCst), 1);

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
    assert_eq!(oracle.active.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_run_refresh_cap_price_command() {
    let mut tickers = idle_tickers();
    tickers
        .expect_fetch_cap_price()
        .returning(|| Ok(Some(dec!(1.5))));
    let h = harness(tickers, catalog());
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let (command_tx, command_rx) = mpsc::channel(4);

    let state = Arc::clone(&h.state);
    let handle = tokio::spawn(h.reconciler.run(command_rx, shutdown_rx));

    command_tx.send(ReconcilerCommand::RefreshCapPrice).await.unwrap();

    tokio::time::timeout(Duration::from_secs(1), async {
        while state.prices().cap_price().await.is_none() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    assert_eq!(state.prices().cap_price().await, Some(dec!(1.5)));

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}
