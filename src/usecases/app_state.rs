//! Shared Application State - Price Table, Draft and Flags
//!
//! Owns every piece of mutable state shared between the order service,
//! the price reconciler and the health server:
//! - `PriceTable`: latest price per market, OHLC snapshots and the CAP
//!   token price
//! - Market catalog snapshot (replaced wholesale when metadata loads)
//! - Order draft and the submission-in-flight flag
//! - User orders cache and its loading flag
//!
//! Writes are whole-value replacements keyed by market id; the last
//! writer wins per key and no cross-market atomicity is provided.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::domain::market::{MarketCatalog, MarketId};
use crate::domain::order::{OrderDraft, UserOrder};
use crate::domain::price::{PricePoint, Ticker};

/// Latest known prices and OHLC snapshots, keyed by market.
#[derive(Debug, Default)]
pub struct PriceTable {
  /// Latest price per market.
  prices: RwLock<HashMap<MarketId, PricePoint>>,
  /// Aggregated OHLC snapshot per market (non-`latest` ticker kinds).
  ohlc: RwLock<HashMap<MarketId, Ticker>>,
  /// Latest CAP token daily close.
  cap: RwLock<Option<Decimal>>,
}

impl PriceTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Overwrite the price of `market`. Returns the previous point.
  pub async fn set(&self, market: &str, point: PricePoint) -> Option<PricePoint> {
    self.prices.write().await.insert(market.to_string(), point)
  }

  pub async fn get(&self, market: &str) -> Option<PricePoint> {
    self.prices.read().await.get(market).copied()
  }

  /// Price only; `None` means unknown, never zero.
  pub async fn price(&self, market: &str) -> Option<Decimal> {
    self.get(market).await.map(|p| p.price)
  }

  pub async fn len(&self) -> usize {
    self.prices.read().await.len()
  }

  pub async fn set_ohlc(&self, market: &str, ticker: Ticker) {
    self.ohlc.write().await.insert(market.to_string(), ticker);
  }

  pub async fn ohlc(&self, market: &str) -> Option<Ticker> {
    self.ohlc.read().await.get(market).copied()
  }

  pub async fn set_cap_price(&self, price: Decimal) {
    *self.cap.write().await = Some(price);
  }

  /// `None` until the first successful subgraph read.
  pub async fn cap_price(&self) -> Option<Decimal> {
    *self.cap.read().await
  }
}

/// Process-wide state passed by `Arc` to every service.
#[derive(Debug)]
pub struct AppState {
  /// Shared price table.
  prices: PriceTable,
  /// Market metadata; empty until loaded.
  catalog: RwLock<Arc<MarketCatalog>>,
  /// Order form being edited.
  draft: RwLock<OrderDraft>,
  /// Set while a draft submission is outstanding.
  submitting: AtomicBool,
  /// Cached open orders, newest first.
  user_orders: RwLock<Vec<UserOrder>>,
  /// Set while the user orders are being fetched.
  loading_orders: AtomicBool,
  /// Oracle subscription is open.
  oracle_connected: AtomicBool,
}

impl Default for AppState {
  fn default() -> Self {
    Self::new(MarketCatalog::default())
  }
}

impl AppState {
  pub fn new(catalog: MarketCatalog) -> Self {
    Self {
      prices: PriceTable::new(),
      catalog: RwLock::new(Arc::new(catalog)),
      draft: RwLock::new(OrderDraft::default()),
      submitting: AtomicBool::new(false),
      user_orders: RwLock::new(Vec::new()),
      loading_orders: AtomicBool::new(false),
      oracle_connected: AtomicBool::new(false),
    }
  }

  pub fn prices(&self) -> &PriceTable {
    &self.prices
  }

  // ── Catalog ─────────────────────────────────────────

  /// Current catalog snapshot.
  pub async fn catalog(&self) -> Arc<MarketCatalog> {
    Arc::clone(&*self.catalog.read().await)
  }

  /// Replace the catalog (market metadata loaded or refreshed).
  pub async fn set_catalog(&self, catalog: MarketCatalog) {
    *self.catalog.write().await = Arc::new(catalog);
  }

  // ── Draft ───────────────────────────────────────────

  pub async fn draft(&self) -> OrderDraft {
    self.draft.read().await.clone()
  }

  pub async fn set_draft(&self, draft: OrderDraft) {
    *self.draft.write().await = draft;
  }

  /// Return the form to its neutral state.
  pub async fn clear_draft(&self) {
    self.draft.write().await.clear();
  }

  // ── Submission flag ─────────────────────────────────

  /// Claim the submission slot. `None` if a submission is already in flight.
  ///
  /// The flag is released when the returned guard drops.
  pub fn try_begin_submission(&self) -> Option<FlagGuard<'_>> {
    FlagGuard::acquire(&self.submitting)
  }

  pub fn is_submitting(&self) -> bool {
    self.submitting.load(Ordering::Acquire)
  }

  // ── User orders ─────────────────────────────────────

  pub async fn user_orders(&self) -> Vec<UserOrder> {
    self.user_orders.read().await.clone()
  }

  pub async fn set_user_orders(&self, orders: Vec<UserOrder>) {
    *self.user_orders.write().await = orders;
  }

  /// Claim the order-loading slot. `None` if a refresh is running.
  pub fn try_begin_loading_orders(&self) -> Option<FlagGuard<'_>> {
    FlagGuard::acquire(&self.loading_orders)
  }

  pub fn is_loading_orders(&self) -> bool {
    self.loading_orders.load(Ordering::Acquire)
  }

  // ── Oracle connection ───────────────────────────────

  pub fn set_oracle_connected(&self, connected: bool) {
    self.oracle_connected.store(connected, Ordering::Release);
  }

  pub fn is_oracle_connected(&self) -> bool {
    self.oracle_connected.load(Ordering::Acquire)
  }
}

/// Holds a boolean flag set; clears it on drop.
#[derive(Debug)]
pub struct FlagGuard<'a> {
  flag: &'a AtomicBool,
}

impl<'a> FlagGuard<'a> {
  fn acquire(flag: &'a AtomicBool) -> Option<Self> {
    flag
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .ok()
      .map(|_| Self { flag })
  }
}

impl Drop for FlagGuard<'_> {
  fn drop(&mut self) {
    self.flag.store(false, Ordering::Release);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal_macros::dec;

  #[test]
  fn submission_flag_is_exclusive() {
    let state = AppState::default();
    let guard = state.try_begin_submission().unwrap();
    assert!(state.is_submitting());
    assert!(state.try_begin_submission().is_none());
    drop(guard);
    assert!(!state.is_submitting());
    assert!(state.try_begin_submission().is_some());
  }

  #[test]
  fn loading_flag_independent_of_submission() {
    let state = AppState::default();
    let _submit = state.try_begin_submission().unwrap();
    assert!(state.try_begin_loading_orders().is_some());
  }

  #[tokio::test]
  async fn price_table_last_write_wins() {
    let table = PriceTable::new();
    assert!(table.price("ETH-USD").await.is_none());

    table
      .set("ETH-USD", PricePoint { price: dec!(3000), timestamp: 10 })
      .await;
    let prev = table
      .set("ETH-USD", PricePoint { price: dec!(2990), timestamp: 5 })
      .await;

    assert_eq!(prev.map(|p| p.price), Some(dec!(3000)));
    assert_eq!(table.price("ETH-USD").await, Some(dec!(2990)));
    assert_eq!(table.len().await, 1);
  }

  #[tokio::test]
  async fn clear_draft_keeps_selection() {
    let state = AppState::default();
    state
      .set_draft(OrderDraft {
        market: "ETH-USD".into(),
        asset: "ETH".into(),
        margin: Some(dec!(1)),
        has_tp: true,
        ..OrderDraft::default()
      })
      .await;

    state.clear_draft().await;
    let draft = state.draft().await;
    assert!(draft.is_cleared());
    assert_eq!(draft.market, "ETH-USD");
  }
}
