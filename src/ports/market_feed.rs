//! Market Feed Ports - Pull and Push Price Sources
//!
//! Two independent sources feed the price table:
//! - `TickerSource`: REST snapshots of every market (pull), plus the
//!   CAP token's daily close from the subgraph
//! - `OracleStream`: signed oracle price updates (push)
//!
//! The domain never sees transport details; push updates arrive on an
//! mpsc channel owned by the price reconciler.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::domain::market::{FeedId, MarketId};
use crate::domain::price::{Candle, OracleUpdate, Ticker, TickerKind};

/// Trait for the REST ticker endpoint.
#[async_trait]
pub trait TickerSource: Send + Sync + 'static {
  /// Snapshot for every market: `GET /ticker/all?type={kind}`.
  async fn fetch_tickers(&self, kind: &TickerKind) -> anyhow::Result<HashMap<MarketId, Ticker>>;

  /// Candle series: `GET /candles/{market}?resolution=&end=`.
  async fn fetch_candles(
    &self,
    market: &str,
    resolution: u64,
    end: i64,
  ) -> anyhow::Result<Vec<Candle>>;

  /// Latest daily close of the CAP token.
  ///
  /// `Ok(None)` when the subgraph answers without day data.
  async fn fetch_cap_price(&self) -> anyhow::Result<Option<Decimal>>;
}

/// Trait for oracle push-service connections.
#[async_trait]
pub trait OracleStream: Send + Sync + 'static {
  /// Open one subscription for `feed_ids`, delivering updates on `updates`.
  ///
  /// The returned handle owns the connection; dropping or closing it
  /// stops delivery.
  async fn subscribe(
    &self,
    feed_ids: Vec<FeedId>,
    updates: mpsc::Sender<OracleUpdate>,
  ) -> anyhow::Result<SubscriptionHandle>;
}

/// Owner of a live oracle subscription task.
#[derive(Debug)]
pub struct SubscriptionHandle {
  /// Signals the task to close its socket.
  shutdown: Option<oneshot::Sender<()>>,
  /// The task delivering updates.
  task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
  /// Wrap a subscription task and its shutdown trigger.
  pub fn new(shutdown: oneshot::Sender<()>, task: JoinHandle<()>) -> Self {
    Self {
      shutdown: Some(shutdown),
      task: Some(task),
    }
  }

  /// Stop the subscription and wait for its task to exit.
  pub async fn close(mut self) {
    if let Some(tx) = self.shutdown.take() {
      let _ = tx.send(());
    }
    if let Some(task) = self.task.take() {
      if let Err(e) = task.await {
        if !e.is_cancelled() {
          warn!(error = %e, "Oracle subscription task panicked");
        }
      }
    }
  }
}

impl Drop for SubscriptionHandle {
  fn drop(&mut self) {
    if let Some(task) = self.task.take() {
      task.abort();
    }
  }
}
