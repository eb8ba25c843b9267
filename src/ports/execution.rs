//! Execution Contract Port - On-chain Order Management Interface
//!
//! Defines the trait for submitting, cancelling and self-executing
//! orders against the exchange's execution contracts.
//!
//! Key design decisions:
//! - Sending and confirming are separate steps: every call returns a
//!   `PendingTx` whose `wait()` resolves to the mined receipt
//! - Success is strictly `receipt.status == 1`
//! - No retries at this boundary; callers decide

use std::fmt;
use std::future::Future;

use alloy::primitives::U256;
use async_trait::async_trait;
use futures_util::future::BoxFuture;

use crate::domain::order::{OrderId, OrderRecord};

/// Receipt status for a successful transaction.
pub const RECEIPT_STATUS_SUCCESS: u64 = 1;

/// Mined transaction receipt (the fields this client reads).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
  /// Transaction hash (0x-prefixed hex).
  pub tx_hash: String,
  /// EIP-658 status: 1 = success, 0 = reverted.
  pub status: u64,
}

impl TxReceipt {
  /// Whether the transaction succeeded.
  pub fn is_success(&self) -> bool {
    self.status == RECEIPT_STATUS_SUCCESS
  }
}

/// A broadcast transaction awaiting confirmation.
pub struct PendingTx {
  /// Hash assigned at broadcast.
  tx_hash: String,
  /// Resolves once the transaction is mined.
  receipt: BoxFuture<'static, anyhow::Result<TxReceipt>>,
}

impl PendingTx {
  /// Wrap a broadcast transaction and the future yielding its receipt.
  pub fn new<F>(tx_hash: impl Into<String>, receipt: F) -> Self
  where
    F: Future<Output = anyhow::Result<TxReceipt>> + Send + 'static,
  {
    Self {
      tx_hash: tx_hash.into(),
      receipt: Box::pin(receipt),
    }
  }

  /// A transaction whose receipt is already known.
  pub fn ready(receipt: TxReceipt) -> Self {
    let tx_hash = receipt.tx_hash.clone();
    Self::new(tx_hash, async move { Ok(receipt) })
  }

  /// Hash assigned at broadcast.
  pub fn tx_hash(&self) -> &str {
    &self.tx_hash
  }

  /// Wait until the transaction is mined.
  ///
  /// # Errors
  /// Returns error if the node drops the transaction or the RPC fails.
  pub async fn wait(self) -> anyhow::Result<TxReceipt> {
    self.receipt.await
  }
}

impl fmt::Debug for PendingTx {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PendingTx")
      .field("tx_hash", &self.tx_hash)
      .finish_non_exhaustive()
  }
}

/// Trait for the exchange's order entry points.
///
/// Implementors sign and broadcast transactions. The order tuple is
/// already fully normalized; implementors only encode it.
#[async_trait]
pub trait OrderContract: Send + Sync + 'static {
  /// Submit a new order with optional TP/SL legs.
  ///
  /// `value` is the native amount attached to the transaction
  /// (`None` for token-collateralized orders).
  ///
  /// # Errors
  /// Returns error if signing, gas estimation or broadcast fails.
  async fn submit_order(
    &self,
    order: &OrderRecord,
    tp_price: U256,
    sl_price: U256,
    value: Option<U256>,
  ) -> anyhow::Result<PendingTx>;

  /// Cancel a single resting order.
  async fn cancel_order(&self, order_id: OrderId) -> anyhow::Result<PendingTx>;

  /// Cancel several resting orders in one transaction.
  async fn cancel_orders(&self, order_ids: &[OrderId]) -> anyhow::Result<PendingTx>;

  /// Execute one of the caller's own pending orders.
  async fn self_execute_order(&self, order_id: OrderId) -> anyhow::Result<PendingTx>;
}
