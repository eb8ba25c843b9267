//! Transaction value and execution fee accounting.
//!
//! Only orders collateralized in the native coin attach value to the
//! transaction. Token-collateralized orders are paid through the contract's
//! token-transfer path and carry no value.
//!
//! Each conditional leg (take-profit, stop-loss) funds its own execution fee,
//! so a native order with both legs pays the base fee three times.

use alloy::primitives::U256;

use super::market::{AssetSpec, Market};
use super::order::NormalizedOrder;

/// Fee rates are expressed in basis points out of this divider.
pub const BPS_DIVIDER: u64 = 10_000;

/// Value calculator bound to a market's fee rate.
#[derive(Debug, Clone, Copy)]
pub struct FeeCalculator {
    /// Fee rate in basis points.
    fee_bps: u32,
}

impl FeeCalculator {
    pub fn new(fee_bps: u32) -> Self {
        Self { fee_bps }
    }

    pub fn for_market(market: &Market) -> Self {
        Self::new(market.fee_bps)
    }

    /// `size * fee_bps / BPS_DIVIDER`, integer division.
    pub fn fee(&self, size: U256) -> U256 {
        size.saturating_mul(U256::from(self.fee_bps)) / U256::from(BPS_DIVIDER)
    }

    /// Native value for a regular submission: margin + fee, plus one fee per
    /// conditional leg. `None` for non-native assets.
    pub fn order_value(&self, order: &NormalizedOrder, asset: &AssetSpec) -> Option<U256> {
        if !asset.native {
            return None;
        }

        let fee = self.fee(order.size);
        let legs = u64::from(order.has_tp()) + u64::from(order.has_sl());

        Some(order.margin + fee + fee * U256::from(legs))
    }

    /// Native value for the close-position shorthand: base fee only.
    pub fn close_value(&self, order: &NormalizedOrder, asset: &AssetSpec) -> Option<U256> {
        asset.native.then(|| self.fee(order.size))
    }
}
