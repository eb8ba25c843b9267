//! Price Reconciler - Oracle Push + Ticker Pull into one Price Table
//!
//! Single writer for oracle-sourced prices. Two sources feed the table:
//! 1. Pull: REST ticker snapshots overwrite each market unconditionally
//! 2. Push: oracle updates arrive over an mpsc channel and are accepted
//!    only if their own publish time is within the staleness window
//!
//! The CAP token price is pulled on request from the subgraph and falls
//! back to a fixed price when the subgraph has no positive close.
//!
//! Connection lifecycle is an explicit state machine:
//! `Disconnected → AwaitingMetadata → Connected`. Every connect attempt
//! cancels the pending retry timer and closes the open subscription
//! first; subscriptions are never additive. The feed → market map is
//! snapshotted from the catalog at connect time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rust_decimal::Decimal;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::domain::market::{FeedId, MarketId, normalize_feed_id};
use crate::domain::price::{
  CAP_FALLBACK_PRICE, Candle, ORACLE_MAX_AGE_SECS, OracleUpdate, PricePoint, Ticker, TickerKind,
};
use crate::ports::market_feed::{OracleStream, SubscriptionHandle, TickerSource};
use crate::ports::notifier::Notifier;

use super::app_state::AppState;

/// Market whose presence signals that metadata has loaded.
pub const DEFAULT_REFERENCE_MARKET: &str = "BTC-USD";

/// Delay before re-attempting a deferred connection.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Reconciler tuning.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
  /// Connection is deferred until this market is in the catalog.
  pub reference_market: MarketId,
  /// Delay between deferred connection attempts.
  pub retry_delay: Duration,
  /// Oracle staleness window in seconds.
  pub max_age_secs: u64,
  /// Interval between `latest` ticker polls.
  pub poll_interval: Duration,
  /// Market whose price drives page-title updates.
  pub focus_market: Option<MarketId>,
  /// Capacity of the oracle update channel.
  pub update_buffer: usize,
  /// Fetch the CAP price once at startup.
  pub refresh_cap_price: bool,
}

impl Default for ReconcilerConfig {
  fn default() -> Self {
    Self {
      reference_market: DEFAULT_REFERENCE_MARKET.to_string(),
      retry_delay: DEFAULT_RETRY_DELAY,
      max_age_secs: ORACLE_MAX_AGE_SECS,
      poll_interval: Duration::from_secs(5),
      focus_market: None,
      update_buffer: 1024,
      refresh_cap_price: false,
    }
  }
}

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
  Disconnected,
  AwaitingMetadata,
  Connected,
}

/// External requests accepted by `run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcilerCommand {
  /// (Re)open the oracle subscription.
  Connect,
  /// Fetch a ticker snapshot of the given kind.
  RefreshTickers(TickerKind),
  /// Re-read the CAP token price.
  RefreshCapPrice,
}

enum Connection {
  Disconnected,
  AwaitingMetadata { retry: JoinHandle<()> },
  Connected { subscription: SubscriptionHandle },
}

/// Merges oracle and ticker prices into the shared price table.
pub struct PriceReconciler<T: TickerSource, O: OracleStream, N: Notifier> {
  /// REST ticker port.
  tickers: Arc<T>,
  /// Oracle push port.
  oracle: Arc<O>,
  /// Page-title sink.
  notifier: Arc<N>,
  /// Shared state.
  state: Arc<AppState>,
  config: ReconcilerConfig,
  metrics: Option<Arc<MetricsRegistry>>,
  connection: Connection,
  /// Feed → market snapshot taken at connect time.
  feed_map: HashMap<FeedId, MarketId>,
  updates_tx: mpsc::Sender<OracleUpdate>,
  updates_rx: Option<mpsc::Receiver<OracleUpdate>>,
  /// Retry timers send the generation they were armed in.
  retry_tx: mpsc::Sender<u64>,
  retry_rx: Option<mpsc::Receiver<u64>>,
  /// Bumped on every connect attempt; stale timer firings are ignored.
  generation: u64,
}

impl<T: TickerSource, O: OracleStream, N: Notifier> PriceReconciler<T, O, N> {
  pub fn new(
    tickers: Arc<T>,
    oracle: Arc<O>,
    notifier: Arc<N>,
    state: Arc<AppState>,
    config: ReconcilerConfig,
  ) -> Self {
    let (updates_tx, updates_rx) = mpsc::channel(config.update_buffer.max(1));
    let (retry_tx, retry_rx) = mpsc::channel(4);

    Self {
      tickers,
      oracle,
      notifier,
      state,
      config,
      metrics: None,
      connection: Connection::Disconnected,
      feed_map: HashMap::new(),
      updates_tx,
      updates_rx: Some(updates_rx),
      retry_tx,
      retry_rx: Some(retry_rx),
      generation: 0,
    }
  }

  pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
    self.metrics = Some(metrics);
    self
  }

  pub fn connection_state(&self) -> ConnectionState {
    match self.connection {
      Connection::Disconnected => ConnectionState::Disconnected,
      Connection::AwaitingMetadata { .. } => ConnectionState::AwaitingMetadata,
      Connection::Connected { .. } => ConnectionState::Connected,
    }
  }

  // ── Push source ─────────────────────────────────────

  /// Open the oracle subscription, replacing any existing one.
  ///
  /// Defers (and arms the retry timer) while market metadata is missing.
  #[instrument(skip(self))]
  pub async fn connect(&mut self) -> ConnectionState {
    self.close().await;
    self.generation = self.generation.wrapping_add(1);

    let catalog = self.state.catalog().await;
    if !catalog.contains_market(&self.config.reference_market) {
      debug!(
        reference = %self.config.reference_market,
        "Market metadata not loaded, deferring oracle connection"
      );
      self.arm_retry();
      return self.connection_state();
    }

    let feed_map = catalog.feed_map();
    let mut feed_ids: Vec<FeedId> = feed_map.keys().cloned().collect();
    feed_ids.sort();

    match self.oracle.subscribe(feed_ids, self.updates_tx.clone()).await {
      Ok(subscription) => {
        info!(feeds = feed_map.len(), "Oracle subscription opened");
        self.feed_map = feed_map;
        self.connection = Connection::Connected { subscription };
        self.set_connected(true);
      }
      Err(e) => {
        warn!(error = %e, "Oracle subscription failed, retrying");
        self.count_feed_error("oracle");
        self.arm_retry();
      }
    }

    self.connection_state()
  }

  /// Cancel the retry timer and close the subscription, if any.
  ///
  /// The feed map goes with the subscription, so updates already queued
  /// for it are dropped.
  pub async fn close(&mut self) {
    self.feed_map.clear();
    match std::mem::replace(&mut self.connection, Connection::Disconnected) {
      Connection::Disconnected => {}
      Connection::AwaitingMetadata { retry } => retry.abort(),
      Connection::Connected { subscription } => {
        subscription.close().await;
        self.set_connected(false);
        debug!("Oracle subscription closed");
      }
    }
  }

  /// Apply one oracle update at wall-clock `now` (unix seconds).
  ///
  /// Returns whether the price table changed. Updates for unknown feeds
  /// and updates outside the staleness window are dropped.
  pub async fn apply_oracle_update(&self, update: &OracleUpdate, now: i64) -> bool {
    let feed = normalize_feed_id(&update.feed_id);
    let Some(market) = self.feed_map.get(&feed) else {
      debug!(feed = %feed, "Update for unmapped feed");
      return false;
    };

    let Some(price) = update.price_no_older_than(now, self.config.max_age_secs) else {
      debug!(
        market = %market,
        publish_time = update.publish_time,
        now,
        "Stale oracle update discarded"
      );
      if let Some(metrics) = &self.metrics {
        metrics.stale_oracle_updates.inc();
      }
      return false;
    };

    let point = PricePoint {
      price,
      timestamp: update.publish_time,
    };
    let previous = self.state.prices().set(market, point).await;
    self.count_price_update("oracle");
    self.maybe_set_title(market, price, previous);
    true
  }

  // ── Pull source ─────────────────────────────────────

  /// Fetch a ticker snapshot and write it to the state.
  ///
  /// `latest` overwrites prices; other kinds replace OHLC snapshots.
  /// Returns `None` on transport or parse failure.
  #[instrument(skip(self))]
  pub async fn refresh_tickers(&self, kind: &TickerKind) -> Option<HashMap<MarketId, Ticker>> {
    let tickers = match self.tickers.fetch_tickers(kind).await {
      Ok(tickers) => tickers,
      Err(e) => {
        warn!(kind = %kind, error = %e, "Ticker fetch failed");
        self.count_feed_error("ticker");
        return None;
      }
    };

    for (market, ticker) in &tickers {
      match kind {
        TickerKind::Latest => {
          let point = PricePoint {
            price: ticker.c,
            timestamp: ticker.t,
          };
          let previous = self.state.prices().set(market, point).await;
          self.count_price_update("ticker");
          self.maybe_set_title(market, ticker.c, previous);
        }
        TickerKind::Other(_) => self.state.prices().set_ohlc(market, *ticker).await,
      }
    }

    debug!(kind = %kind, markets = tickers.len(), "Tickers refreshed");
    Some(tickers)
  }

  /// Candle series for charting. `None` on failure.
  pub async fn fetch_candles(&self, market: &str, resolution: u64, end: i64) -> Option<Vec<Candle>> {
    match self.tickers.fetch_candles(market, resolution, end).await {
      Ok(candles) => Some(candles),
      Err(e) => {
        warn!(market, resolution, end, error = %e, "Candle fetch failed");
        self.count_feed_error("candles");
        None
      }
    }
  }

  /// Read the CAP token price and store it.
  ///
  /// A missing or non-positive close stores the fallback price. On
  /// failure the previous price is kept and `None` is returned.
  #[instrument(skip(self))]
  pub async fn refresh_cap_price(&self) -> Option<Decimal> {
    let close = match self.tickers.fetch_cap_price().await {
      Ok(close) => close,
      Err(e) => {
        warn!(error = %e, "CAP price fetch failed");
        self.count_feed_error("cap");
        return None;
      }
    };

    let price = close
      .filter(|p| *p > Decimal::ZERO)
      .unwrap_or(CAP_FALLBACK_PRICE);
    self.state.prices().set_cap_price(price).await;
    debug!(price = %price, fallback = close != Some(price), "CAP price refreshed");
    Some(price)
  }

  // ── Event loop ──────────────────────────────────────

  /// Run until shutdown: connect, then consume oracle updates, retry
  /// timers, commands and the ticker poll.
  ///
  /// # Errors
  /// Returns error if the loop was already started once.
  pub async fn run(
    mut self,
    mut commands: mpsc::Receiver<ReconcilerCommand>,
    mut shutdown_rx: broadcast::Receiver<()>,
  ) -> anyhow::Result<()> {
    let mut updates = self.updates_rx.take().context("Reconciler already running")?;
    let mut retries = self.retry_rx.take().context("Reconciler already running")?;

    self.connect().await;
    self.refresh_tickers(&TickerKind::Latest).await;
    if self.config.refresh_cap_price {
      self.refresh_cap_price().await;
    }

    let mut poll = tokio::time::interval_at(
      tokio::time::Instant::now() + self.config.poll_interval,
      self.config.poll_interval,
    );
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut commands_open = true;

    info!("Price reconciler started");

    loop {
      tokio::select! {
        biased;
        _ = shutdown_rx.recv() => {
          info!("Price reconciler received shutdown signal");
          break;
        }
        Some(update) = updates.recv() => {
          self.apply_oracle_update(&update, chrono::Utc::now().timestamp()).await;
        }
        Some(generation) = retries.recv() => {
          if generation == self.generation {
            self.connect().await;
          }
        }
        command = commands.recv(), if commands_open => match command {
          Some(ReconcilerCommand::Connect) => {
            self.connect().await;
          }
          Some(ReconcilerCommand::RefreshTickers(kind)) => {
            self.refresh_tickers(&kind).await;
          }
          Some(ReconcilerCommand::RefreshCapPrice) => {
            self.refresh_cap_price().await;
          }
          None => commands_open = false,
        },
        _ = poll.tick() => {
          self.refresh_tickers(&TickerKind::Latest).await;
        }
      }
    }

    self.close().await;
    info!("Price reconciler stopped");
    Ok(())
  }

  // ── Internals ───────────────────────────────────────

  fn arm_retry(&mut self) {
    let tx = self.retry_tx.clone();
    let delay = self.config.retry_delay;
    let generation = self.generation;

    let retry = tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      let _ = tx.send(generation).await;
    });
    self.connection = Connection::AwaitingMetadata { retry };
  }

  fn set_connected(&self, connected: bool) {
    self.state.set_oracle_connected(connected);
    if let Some(metrics) = &self.metrics {
      metrics.oracle_connected.set(if connected { 1.0 } else { 0.0 });
    }
  }

  fn maybe_set_title(&self, market: &str, price: Decimal, previous: Option<PricePoint>) {
    if self.config.focus_market.as_deref() != Some(market) {
      return;
    }
    if previous.is_some_and(|p| p.price == price) {
      return;
    }
    self
      .notifier
      .set_page_title(&format!("{} {}", price.normalize(), market));
  }

  fn count_price_update(&self, source: &str) {
    if let Some(metrics) = &self.metrics {
      metrics.price_updates.with_label_values(&[source]).inc();
    }
  }

  fn count_feed_error(&self, source: &str) {
    if let Some(metrics) = &self.metrics {
      metrics.feed_errors.with_label_values(&[source]).inc();
    }
  }
}
