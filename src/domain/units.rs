//! Unit normalization: human decimals → fixed-point integers.
//!
//! Margin is cleaned with a ceiling and size with a floor at the asset's
//! working precision, so the posted margin never falls short of what the user
//! saw and the size never exceeds it. The leverage clamp runs on the cleaned
//! values and also rounds up.

use alloy::primitives::U256;
use rust_decimal::{Decimal, RoundingStrategy};

use super::error::UnitsError;
use super::market::AssetSpec;

/// Fixed-point decimals used for prices (trigger, TP, SL).
pub const PRICE_DECIMALS: u32 = 18;

/// Decimals kept when sizing a close-position order.
pub const CLOSE_SIZE_PRECISION: u32 = 6;

/// Round `amount` up to `precision` decimal places.
pub fn clean_margin(amount: Decimal, precision: u32) -> Decimal {
    amount.round_dp_with_strategy(precision, RoundingStrategy::ToPositiveInfinity)
}

/// Round `amount` down to `precision` decimal places.
pub fn clean_size(amount: Decimal, precision: u32) -> Decimal {
    amount.round_dp_with_strategy(precision, RoundingStrategy::ToNegativeInfinity)
}

/// `size / margin`, or `None` when margin is zero.
pub fn leverage(size: Decimal, margin: Decimal) -> Option<Decimal> {
    if margin.is_zero() {
        return None;
    }
    size.checked_div(margin)
}

/// Raise `margin` so that `size / margin` does not exceed `max_leverage`.
///
/// Zero margin skips the check; downstream validation (the execution
/// contract) rejects zero-margin opening orders.
pub fn clamp_margin(margin: Decimal, size: Decimal, max_leverage: Decimal, precision: u32) -> Decimal {
    match leverage(size, margin) {
        Some(lev) if lev > max_leverage && max_leverage > Decimal::ZERO => size
            .checked_div(max_leverage)
            .map_or(margin, |m| clean_margin(m, precision)),
        _ => margin,
    }
}

/// Convert a decimal amount to an integer scaled by `10^decimals`.
///
/// Exact: fails rather than silently truncating when `amount` carries more
/// fractional digits than `decimals`.
pub fn parse_units(amount: Decimal, decimals: u32) -> Result<U256, UnitsError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(UnitsError::Negative(amount));
    }

    let normalized = amount.normalize();
    let scale = normalized.scale();
    if scale > decimals {
        return Err(UnitsError::ExcessPrecision { amount, decimals });
    }

    let mantissa = U256::from(normalized.mantissa().unsigned_abs());
    let factor = U256::from(10u8)
        .checked_pow(U256::from(decimals - scale))
        .ok_or(UnitsError::Overflow(amount))?;

    mantissa
        .checked_mul(factor)
        .ok_or(UnitsError::Overflow(amount))
}

/// Margin and size after cleaning, clamping and scaling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAmounts {
    /// Cleaned (and possibly clamped) margin in human units.
    pub margin: Decimal,
    /// Cleaned size in human units.
    pub size: Decimal,
    /// Margin scaled to asset decimals.
    pub margin_units: U256,
    /// Size scaled to asset decimals.
    pub size_units: U256,
    /// Whether the leverage clamp raised the margin.
    pub clamped: bool,
}

/// Clean margin and size, enforce max leverage, then scale both.
pub fn normalize_amounts(
    margin: Decimal,
    size: Decimal,
    asset: &AssetSpec,
    max_leverage: Decimal,
) -> Result<NormalizedAmounts, UnitsError> {
    for amount in [margin, size] {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(UnitsError::Negative(amount));
        }
    }

    let precision = asset.working_precision;
    let cleaned_margin = clean_margin(margin, precision);
    let cleaned_size = clean_size(size, precision);

    let clamped_margin = clamp_margin(cleaned_margin, cleaned_size, max_leverage, precision);

    Ok(NormalizedAmounts {
        margin: clamped_margin,
        size: cleaned_size,
        margin_units: parse_units(clamped_margin, asset.decimals)?,
        size_units: parse_units(cleaned_size, asset.decimals)?,
        clamped: clamped_margin != cleaned_margin,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;
    use rust_decimal_macros::dec;

    #[test]
    fn test_margin_rounds_up() {
        assert_eq!(clean_margin(dec!(1.000000001), 6), dec!(1.000001));
        assert_eq!(clean_margin(dec!(1.5), 6), dec!(1.5));
    }

    #[test]
    fn test_size_rounds_down() {
        assert_eq!(clean_size(dec!(1.999999999), 6), dec!(1.999999));
        assert_eq!(clean_size(dec!(2), 6), dec!(2));
    }

    #[test]
    fn test_parse_units_scales_exactly() {
        assert_eq!(parse_units(dec!(1.5), 6).unwrap(), U256::from(1_500_000u64));
        assert_eq!(
            parse_units(dec!(2.0000000000), 18).unwrap(),
            U256::from(2_000_000_000_000_000_000u128)
        );
        assert_eq!(parse_units(Decimal::ZERO, 18).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_parse_units_rejects_excess_precision() {
        let err = parse_units(dec!(1.0000001), 6).unwrap_err();
        assert!(matches!(err, UnitsError::ExcessPrecision { decimals: 6, .. }));
    }

    #[test]
    fn test_parse_units_rejects_negative() {
        assert!(matches!(parse_units(dec!(-1), 6), Err(UnitsError::Negative(_))));
    }

    #[test]
    fn test_clamp_raises_margin_above_max_leverage() {
        // 1000 / 10 = 100x against a 50x cap → margin must become 20.
        let m = clamp_margin(dec!(10), dec!(1000), dec!(50), 10);
        assert_eq!(m, dec!(20));
    }

    #[test]
    fn test_clamp_rounds_up_inexact_division() {
        let m = clamp_margin(dec!(1), dec!(100), dec!(3), 6);
        assert_eq!(m, dec!(33.333334));
        assert!(dec!(100) / m <= dec!(3));
    }

    #[test]
    fn test_zero_margin_skips_clamp() {
        assert_eq!(clamp_margin(Decimal::ZERO, dec!(1000), dec!(50), 10), Decimal::ZERO);
        assert_eq!(leverage(dec!(1000), Decimal::ZERO), None);
    }

    #[test]
    fn test_normalize_amounts_usdc() {
        let usdc = AssetSpec::usdc(Address::repeat_byte(1));
        let n = normalize_amounts(dec!(1.000000001), dec!(1.999999999), &usdc, dec!(50)).unwrap();
        assert_eq!(n.margin, dec!(1.000001));
        assert_eq!(n.size, dec!(1.999999));
        assert_eq!(n.margin_units, U256::from(1_000_001u64));
        assert_eq!(n.size_units, U256::from(1_999_999u64));
        assert!(!n.clamped);
    }

    #[test]
    fn test_normalize_amounts_clamps_after_cleaning() {
        let eth = AssetSpec::native_eth();
        let n = normalize_amounts(dec!(0.01), dec!(10), &eth, dec!(100)).unwrap();
        assert!(n.clamped);
        assert_eq!(n.margin, dec!(0.1));
        assert_eq!(n.margin_units, U256::from(100_000_000_000_000_000u128));
    }
}
