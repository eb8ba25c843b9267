//! Order Store Port - Read-only access to a user's on-chain orders.

use alloy::primitives::Address;
use async_trait::async_trait;

use crate::domain::order::UserOrder;

/// Trait for reading resting orders from the order store contract.
#[async_trait]
pub trait OrderStore: Send + Sync + 'static {
  /// All open orders of `user`, in contract storage order (oldest first).
  async fn get_user_orders(&self, user: Address) -> anyhow::Result<Vec<UserOrder>>;
}
