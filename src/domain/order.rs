//! Order drafts, normalized orders and the canonical on-chain record.
//!
//! Exposes two API surfaces:
//! - `OrderDraft` / `CloseRequest`: user-facing decimal inputs
//! - `NormalizedOrder` / `OrderRecord`: fixed-point values handed to the
//!   execution contract adapter

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::classifier::{self, OrderType};
use super::error::{OrderError, OrderResult};
use super::market::{Direction, MarketCatalog, MarketId};
use super::units::{self, CLOSE_SIZE_PRECISION, PRICE_DECIMALS};

/// On-chain order identifier.
pub type OrderId = u64;

// ────────────────────────────────────────────
// User inputs
// ────────────────────────────────────────────

/// Editable order form. Fields mirror what the user typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub market: MarketId,
    /// Asset symbol (`ETH`, `USDC`).
    pub asset: String,
    pub direction: Direction,
    pub margin: Option<Decimal>,
    pub size: Option<Decimal>,
    /// Trigger price (limit/stop) or protection price.
    pub price: Option<Decimal>,
    pub tp_price: Option<Decimal>,
    pub sl_price: Option<Decimal>,
    pub has_trigger: bool,
    pub has_tp: bool,
    pub has_sl: bool,
    pub is_reduce_only: bool,
    pub is_protected: bool,
}

impl OrderDraft {
    /// Reset amounts, prices and every toggle. Market, asset and direction
    /// stay selected.
    pub fn clear(&mut self) {
        self.margin = None;
        self.size = None;
        self.price = None;
        self.tp_price = None;
        self.sl_price = None;
        self.has_trigger = false;
        self.has_tp = false;
        self.has_sl = false;
        self.is_reduce_only = false;
        self.is_protected = false;
    }

    pub fn is_cleared(&self) -> bool {
        let mut probe = self.clone();
        probe.clear();
        &probe == self
    }

    fn trigger_price(&self) -> Decimal {
        self.price.unwrap_or_default()
    }
}

/// Close-position shorthand: reduce-only market order for `size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseRequest {
    pub market: MarketId,
    /// Collateral token address of the position.
    pub asset: Address,
    pub direction: Direction,
    pub size: Decimal,
}

// ────────────────────────────────────────────
// Normalized order
// ────────────────────────────────────────────

/// A draft resolved into fixed-point integers and an order type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedOrder {
    pub market: MarketId,
    pub asset: Address,
    pub direction: Direction,
    /// Margin at asset decimals (zero for reduce-only).
    pub margin: U256,
    /// Size at asset decimals.
    pub size: U256,
    /// Price at 18 decimals (zero for plain market orders).
    pub price: U256,
    pub order_type: OrderType,
    pub is_reduce_only: bool,
    /// Take-profit price at 18 decimals (zero when unset).
    pub tp_price: U256,
    /// Stop-loss price at 18 decimals (zero when unset).
    pub sl_price: U256,
}

impl NormalizedOrder {
    pub fn has_tp(&self) -> bool {
        !self.tp_price.is_zero()
    }

    pub fn has_sl(&self) -> bool {
        !self.sl_price.is_zero()
    }

    /// The canonical tuple submitted to the execution contract.
    pub fn to_record(&self) -> OrderRecord {
        OrderRecord {
            order_id: 0,
            user: Address::ZERO,
            asset: self.asset,
            market: self.market.clone(),
            margin: self.margin,
            size: self.size,
            price: self.price,
            fee: U256::ZERO,
            is_long: self.direction.is_long(),
            order_type: self.order_type,
            is_reduce_only: self.is_reduce_only,
            timestamp: 0,
            expiry: 0,
            cancel_order_id: 0,
        }
    }
}

/// Order tuple as laid out by the execution contract.
///
/// Fields the contract assigns itself (id, user, fee, timestamp, expiry,
/// cancel link) are zero on submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub order_id: OrderId,
    pub user: Address,
    pub asset: Address,
    pub market: MarketId,
    pub margin: U256,
    pub size: U256,
    pub price: U256,
    pub fee: U256,
    pub is_long: bool,
    pub order_type: OrderType,
    pub is_reduce_only: bool,
    pub timestamp: u64,
    pub expiry: u64,
    pub cancel_order_id: OrderId,
}

/// Alias for records read back from the order store.
pub type UserOrder = OrderRecord;

// ────────────────────────────────────────────
// Builder
// ────────────────────────────────────────────

/// Assembles normalized orders from drafts using catalog metadata.
pub struct OrderBuilder<'a> {
    catalog: &'a MarketCatalog,
}

impl<'a> OrderBuilder<'a> {
    pub fn new(catalog: &'a MarketCatalog) -> Self {
        Self { catalog }
    }

    /// Normalize, classify and finalize a draft.
    ///
    /// `current_price` is the latest known market price; it is only required
    /// for trigger orders.
    pub fn build(&self, draft: &OrderDraft, current_price: Option<Decimal>) -> OrderResult<NormalizedOrder> {
        let market = self
            .catalog
            .market(&draft.market)
            .ok_or_else(|| OrderError::UnknownMarket(draft.market.clone()))?;
        let asset = self
            .catalog
            .asset(&draft.asset)
            .ok_or_else(|| OrderError::UnknownAsset(draft.asset.clone()))?;

        if market.max_leverage <= Decimal::ZERO {
            return Err(OrderError::InvalidMaxLeverage(market.id.clone()));
        }

        let amounts = units::normalize_amounts(
            draft.margin.unwrap_or_default(),
            draft.size.unwrap_or_default(),
            asset,
            market.max_leverage,
        )?;

        let is_long = draft.direction.is_long();
        let trigger = draft.trigger_price();

        let order_type = if classifier::needs_current_price(draft.has_trigger, trigger) {
            let current = current_price.ok_or_else(|| OrderError::PriceUnavailable(market.id.clone()))?;
            classifier::classify(draft.has_trigger, trigger, is_long, current)
        } else {
            OrderType::Market
        };

        let price = classifier::effective_price(draft.has_trigger, draft.is_protected, trigger);

        // Reduce-only carries no new margin; applied after the clamp so the
        // clamp cannot reintroduce it.
        let margin = if draft.is_reduce_only {
            U256::ZERO
        } else {
            amounts.margin_units
        };

        Ok(NormalizedOrder {
            market: market.id.clone(),
            asset: asset.address,
            direction: draft.direction,
            margin,
            size: amounts.size_units,
            price: units::parse_units(price, PRICE_DECIMALS)?,
            order_type,
            is_reduce_only: draft.is_reduce_only,
            tp_price: units::parse_units(draft.tp_price.unwrap_or_default(), PRICE_DECIMALS)?,
            sl_price: units::parse_units(draft.sl_price.unwrap_or_default(), PRICE_DECIMALS)?,
        })
    }

    /// Build the reduce-only market order used to close a position.
    pub fn build_close(&self, request: &CloseRequest) -> OrderResult<NormalizedOrder> {
        let asset = self
            .catalog
            .asset_by_address(&request.asset)
            .ok_or_else(|| OrderError::UnknownAsset(request.asset.to_string()))?;

        let size = units::clean_size(request.size, CLOSE_SIZE_PRECISION);

        Ok(NormalizedOrder {
            market: request.market.clone(),
            asset: request.asset,
            direction: request.direction,
            margin: U256::ZERO,
            size: units::parse_units(size, asset.decimals)?,
            price: U256::ZERO,
            order_type: OrderType::Market,
            is_reduce_only: true,
            tp_price: U256::ZERO,
            sl_price: U256::ZERO,
        })
    }
}
