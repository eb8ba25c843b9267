//! Order Service - Submission, Cancellation and Self-Execution
//!
//! Sequences every user-initiated contract action:
//! validate → build → value → send → wait → status check → notify.
//!
//! Draft submissions follow `Idle → Submitting → {Confirmed, Failed}`:
//! - The in-flight flag is claimed before any network call; a second
//!   submission while one is outstanding is ignored, not queued
//! - Confirmed clears the draft; Failed keeps it for a retry
//! - Cancellation, close and self-execute never touch the flag or draft
//!
//! Every terminal outcome produces exactly one notification. Nothing is
//! retried here.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use alloy::primitives::{Address, U256};
use tracing::{debug, info, instrument, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::domain::error::{OrderError, OrderResult};
use crate::domain::fees::FeeCalculator;
use crate::domain::order::{CloseRequest, NormalizedOrder, OrderBuilder, OrderDraft, OrderId};
use crate::ports::execution::{OrderContract, PendingTx};
use crate::ports::notifier::Notifier;
use crate::ports::order_store::OrderStore;

use super::app_state::AppState;

pub const MSG_ORDER_SUBMITTED: &str = "Order submitted.";
pub const MSG_CLOSE_ORDER_SUBMITTED: &str = "Close order submitted.";
pub const MSG_ORDER_CANCELLED: &str = "Order cancelled.";
pub const MSG_ORDERS_CANCELLED: &str = "Orders cancelled.";
pub const MSG_ORDER_SELF_EXECUTED: &str = "Order self-executed.";
pub const MSG_TX_REVERTED: &str = "Transaction failed.";

/// Terminal result of one contract action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
  /// Mined with status 1.
  Confirmed { tx_hash: String },
  /// Build error, send/wait error, or mined with status ≠ 1.
  Failed { reason: String },
  /// Ignored because another submission was in flight.
  Skipped,
}

impl SubmissionOutcome {
  pub fn is_confirmed(&self) -> bool {
    matches!(self, Self::Confirmed { .. })
  }

  /// Metric label.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Confirmed { .. } => "confirmed",
      Self::Failed { .. } => "failed",
      Self::Skipped => "skipped",
    }
  }
}

/// Contract entry point, used for logs and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
  SubmitOrder,
  CloseOrder,
  CancelOrder,
  CancelOrders,
  SelfExecute,
}

impl Action {
  fn as_str(self) -> &'static str {
    match self {
      Self::SubmitOrder => "submit_order",
      Self::CloseOrder => "close_order",
      Self::CancelOrder => "cancel_order",
      Self::CancelOrders => "cancel_orders",
      Self::SelfExecute => "self_execute_order",
    }
  }
}

/// Orchestrates contract actions against shared state and the UI.
///
/// Front ends share one `Arc<OrderService>` and drive it through the
/// draft setters and the submit, cancel and self-execute actions. Their
/// feedback arrives through the `Notifier`.
pub struct OrderService<C: OrderContract, S: OrderStore, N: Notifier> {
  /// Execution contract port.
  contract: Arc<C>,
  /// Order store port.
  store: Arc<S>,
  /// UI notification sink.
  notifier: Arc<N>,
  /// Shared state (draft, flags, prices, catalog).
  state: Arc<AppState>,
  /// Connected wallet; order refreshes are skipped without one.
  account: Option<Address>,
  /// Optional Prometheus metrics.
  metrics: Option<Arc<MetricsRegistry>>,
}

impl<C: OrderContract, S: OrderStore, N: Notifier> OrderService<C, S, N> {
  pub fn new(contract: Arc<C>, store: Arc<S>, notifier: Arc<N>, state: Arc<AppState>) -> Self {
    Self {
      contract,
      store,
      notifier,
      state,
      account: None,
      metrics: None,
    }
  }

  pub fn with_account(mut self, account: Address) -> Self {
    self.account = Some(account);
    self
  }

  pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
    self.metrics = Some(metrics);
    self
  }

  pub fn state(&self) -> &Arc<AppState> {
    &self.state
  }

  /// Submit the current draft.
  ///
  /// Returns `Skipped` without contacting the contract if a submission is
  /// already in flight.
  #[instrument(skip(self))]
  pub async fn submit_order(&self) -> SubmissionOutcome {
    let Some(guard) = self.state.try_begin_submission() else {
      debug!("Submission already in flight, ignoring");
      if let Some(metrics) = &self.metrics {
        metrics.submissions_skipped.inc();
      }
      return SubmissionOutcome::Skipped;
    };

    let draft = self.state.draft().await;
    let started = Instant::now();

    let outcome = match self.prepare(&draft).await {
      Ok((order, value)) => {
        info!(
          market = %order.market,
          direction = %order.direction,
          order_type = %order.order_type,
          reduce_only = order.is_reduce_only,
          "Submitting order"
        );
        let record = order.to_record();
        self
          .execute(
            Action::SubmitOrder,
            started,
            self.contract.submit_order(&record, order.tp_price, order.sl_price, value),
          )
          .await
      }
      Err(e) => self.reject(Action::SubmitOrder, started, &e),
    };

    // The draft is cleared before the flag drops so no observer sees an
    // idle state still holding the submitted draft.
    if outcome.is_confirmed() {
      self.state.clear_draft().await;
    }
    drop(guard);

    if outcome.is_confirmed() {
      self.notifier.toast_success(MSG_ORDER_SUBMITTED);
    }

    outcome
  }

  /// Close (part of) a position with a reduce-only market order.
  #[instrument(skip(self), fields(market = %request.market, size = %request.size))]
  pub async fn submit_close_order(&self, request: CloseRequest) -> SubmissionOutcome {
    let started = Instant::now();

    let outcome = match self.prepare_close(&request).await {
      Ok((order, value)) => {
        let record = order.to_record();
        self
          .execute(
            Action::CloseOrder,
            started,
            self.contract.submit_order(&record, U256::ZERO, U256::ZERO, value),
          )
          .await
      }
      Err(e) => self.reject(Action::CloseOrder, started, &e),
    };

    if outcome.is_confirmed() {
      self.notifier.toast_success(MSG_CLOSE_ORDER_SUBMITTED);
      self.notifier.hide_modal();
    }

    outcome
  }

  #[instrument(skip(self))]
  pub async fn cancel_order(&self, order_id: OrderId) -> SubmissionOutcome {
    let started = Instant::now();
    let outcome = self
      .execute(Action::CancelOrder, started, self.contract.cancel_order(order_id))
      .await;

    if outcome.is_confirmed() {
      self.notifier.toast_success(MSG_ORDER_CANCELLED);
    }
    outcome
  }

  #[instrument(skip(self), fields(count = order_ids.len()))]
  pub async fn cancel_orders(&self, order_ids: &[OrderId]) -> SubmissionOutcome {
    let started = Instant::now();
    let outcome = self
      .execute(Action::CancelOrders, started, self.contract.cancel_orders(order_ids))
      .await;

    if outcome.is_confirmed() {
      self.notifier.toast_success(MSG_ORDERS_CANCELLED);
    }
    outcome
  }

  #[instrument(skip(self))]
  pub async fn self_execute_order(&self, order_id: OrderId) -> SubmissionOutcome {
    let started = Instant::now();
    let outcome = self
      .execute(Action::SelfExecute, started, self.contract.self_execute_order(order_id))
      .await;

    if outcome.is_confirmed() {
      self.notifier.toast_success(MSG_ORDER_SELF_EXECUTED);
    }
    outcome
  }

  /// Reload the wallet's open orders, newest first.
  ///
  /// Returns `false` without a wallet, while another refresh is running, or
  /// when the read fails.
  #[instrument(skip(self))]
  pub async fn refresh_user_orders(&self) -> bool {
    let Some(account) = self.account else {
      return false;
    };
    let Some(_loading) = self.state.try_begin_loading_orders() else {
      debug!("User orders already loading");
      return false;
    };

    match self.store.get_user_orders(account).await {
      Ok(mut orders) => {
        orders.reverse();
        debug!(count = orders.len(), "User orders refreshed");
        self.state.set_user_orders(orders).await;
        true
      }
      Err(e) => {
        warn!(error = %e, "Failed to load user orders");
        false
      }
    }
  }

  // ── Internals ───────────────────────────────────────

  /// Normalize the draft and compute the attached value.
  async fn prepare(&self, draft: &OrderDraft) -> OrderResult<(NormalizedOrder, Option<U256>)> {
    let catalog = self.state.catalog().await;
    let current_price = self.state.prices().price(&draft.market).await;

    let order = OrderBuilder::new(&catalog).build(draft, current_price)?;

    let market = catalog
      .market(&order.market)
      .ok_or_else(|| OrderError::UnknownMarket(order.market.clone()))?;
    let asset = catalog
      .asset(&draft.asset)
      .ok_or_else(|| OrderError::UnknownAsset(draft.asset.clone()))?;

    let value = FeeCalculator::for_market(market).order_value(&order, asset);
    Ok((order, value))
  }

  async fn prepare_close(&self, request: &CloseRequest) -> OrderResult<(NormalizedOrder, Option<U256>)> {
    let catalog = self.state.catalog().await;

    let order = OrderBuilder::new(&catalog).build_close(request)?;

    let market = catalog
      .market(&order.market)
      .ok_or_else(|| OrderError::UnknownMarket(order.market.clone()))?;
    let asset = catalog
      .asset_by_address(&order.asset)
      .ok_or_else(|| OrderError::UnknownAsset(order.asset.to_string()))?;

    let value = FeeCalculator::for_market(market).close_value(&order, asset);
    Ok((order, value))
  }

  /// Send, wait for the receipt and map it to an outcome.
  ///
  /// Emits the error notification on failure; success notifications are
  /// left to the caller.
  async fn execute<F>(&self, action: Action, started: Instant, send: F) -> SubmissionOutcome
  where
    F: Future<Output = anyhow::Result<PendingTx>>,
  {
    let result = async {
      let pending = send.await?;
      debug!(action = action.as_str(), tx_hash = pending.tx_hash(), "Transaction sent");
      pending.wait().await
    }
    .await;

    let outcome = match result {
      Ok(receipt) if receipt.is_success() => {
        info!(action = action.as_str(), tx_hash = %receipt.tx_hash, "Transaction confirmed");
        SubmissionOutcome::Confirmed {
          tx_hash: receipt.tx_hash,
        }
      }
      Ok(receipt) => {
        warn!(
          action = action.as_str(),
          tx_hash = %receipt.tx_hash,
          status = receipt.status,
          "Transaction reverted"
        );
        self.notifier.toast_error(MSG_TX_REVERTED);
        SubmissionOutcome::Failed {
          reason: format!("receipt status {}", receipt.status),
        }
      }
      Err(e) => {
        let reason = format!("{e:#}");
        warn!(action = action.as_str(), error = %reason, "Transaction failed");
        self.notifier.toast_error(&reason);
        SubmissionOutcome::Failed { reason }
      }
    };

    self.record(action, &outcome, started);
    outcome
  }

  /// Failure before anything was sent.
  fn reject(&self, action: Action, started: Instant, error: &OrderError) -> SubmissionOutcome {
    let reason = error.to_string();
    warn!(action = action.as_str(), error = %reason, "Order rejected before submission");
    self.notifier.toast_error(&reason);

    let outcome = SubmissionOutcome::Failed { reason };
    self.record(action, &outcome, started);
    outcome
  }

  fn record(&self, action: Action, outcome: &SubmissionOutcome, started: Instant) {
    if let Some(metrics) = &self.metrics {
      let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
      metrics.record_action(action.as_str(), outcome.as_str(), elapsed_ms);
    }
  }
}
