//! Domain error types.

use rust_decimal::Decimal;
use thiserror::Error;

use super::market::MarketId;

/// Failures while converting human-decimal amounts to fixed-point integers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitsError {
    #[error("Negative amount: {0}")]
    Negative(Decimal),

    #[error("Amount {amount} has more fractional digits than {decimals} decimals allow")]
    ExcessPrecision { amount: Decimal, decimals: u32 },

    #[error("Amount {0} overflows 256 bits")]
    Overflow(Decimal),
}

/// Failures while decoding an oracle price.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    #[error("Oracle price {mantissa}e{exponent} is not representable")]
    Unrepresentable { mantissa: i64, exponent: i32 },
}

/// Failures while assembling an order from a draft.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("Unknown market: {0}")]
    UnknownMarket(MarketId),

    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    #[error("No current price for {0}; cannot classify a trigger order")]
    PriceUnavailable(MarketId),

    #[error("Max leverage for {0} must be positive")]
    InvalidMaxLeverage(MarketId),

    #[error(transparent)]
    Units(#[from] UnitsError),
}

pub type OrderResult<T> = Result<T, OrderError>;
