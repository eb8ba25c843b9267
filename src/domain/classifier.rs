//! Order type inference from trigger price vs current price.
//!
//! Checks run in a fixed order and the first match wins. A trigger equal to
//! the current price therefore classifies as Limit in both directions; that
//! ordering is business logic and must not be re-derived from symmetry.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// On-chain order type discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OrderType {
    Market = 0,
    Limit = 1,
    Stop = 2,
}

impl OrderType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Market),
            1 => Some(Self::Limit),
            2 => Some(Self::Stop),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Market => write!(f, "MARKET"),
            Self::Limit => write!(f, "LIMIT"),
            Self::Stop => write!(f, "STOP"),
        }
    }
}

/// Whether an order needs the current market price to be classified.
pub fn needs_current_price(has_trigger: bool, trigger_price: Decimal) -> bool {
    has_trigger && trigger_price > Decimal::ZERO
}

/// Decide the order type.
///
/// `current_price` is only read for trigger orders; callers may pass zero
/// when [`needs_current_price`] is false.
pub fn classify(
    has_trigger: bool,
    trigger_price: Decimal,
    is_long: bool,
    current_price: Decimal,
) -> OrderType {
    if !needs_current_price(has_trigger, trigger_price) {
        return OrderType::Market;
    }

    if (is_long && trigger_price <= current_price) || (!is_long && trigger_price >= current_price) {
        OrderType::Limit
    } else if (is_long && trigger_price >= current_price)
        || (!is_long && trigger_price <= current_price)
    {
        OrderType::Stop
    } else {
        OrderType::Market
    }
}

/// The price encoded into the order.
///
/// Market orders carry zero so a stale limit price never leaks into them.
/// That includes a trigger order whose trigger is not positive. Protected
/// orders keep their price as slippage protection.
pub fn effective_price(has_trigger: bool, is_protected: bool, price: Decimal) -> Decimal {
    if needs_current_price(has_trigger, price) || is_protected {
        price
    } else {
        Decimal::ZERO
    }
}
