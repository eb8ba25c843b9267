//! Price records from the ticker endpoint and the oracle push service.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::PriceError;
use super::market::FeedId;

/// Oracle updates older (or further in the future) than this are ignored.
pub const ORACLE_MAX_AGE_SECS: u64 = 60;

/// CAP token price used when the subgraph has no positive daily close.
pub const CAP_FALLBACK_PRICE: Decimal = Decimal::ONE_HUNDRED;

/// Latest known price of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: Decimal,
    /// Unix seconds of the observation.
    pub timestamp: i64,
}

/// OHLC snapshot for one market as served by the ticker endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    pub o: Decimal,
    pub h: Decimal,
    pub l: Decimal,
    pub c: Decimal,
    /// Timestamp of the close.
    pub t: i64,
}

/// One bar of a candle series.
pub type Candle = Ticker;

/// Ticker snapshot kind requested from `/ticker/all`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TickerKind {
    /// Latest close per market; feeds the price table.
    Latest,
    /// Any other aggregation (e.g. `24h`); feeds the OHLC table.
    Other(String),
}

impl TickerKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Latest => "latest",
            Self::Other(kind) => kind,
        }
    }
}

impl std::fmt::Display for TickerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A price attestation pushed by the oracle service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleUpdate {
    pub feed_id: FeedId,
    /// Price mantissa.
    pub mantissa: i64,
    /// Power-of-ten exponent (usually negative).
    pub exponent: i32,
    /// Unix seconds at which the price was published.
    pub publish_time: i64,
}

impl OracleUpdate {
    /// `mantissa × 10^exponent` as an exact decimal.
    pub fn decimal_price(&self) -> Result<Decimal, PriceError> {
        let unrepresentable = || PriceError::Unrepresentable {
            mantissa: self.mantissa,
            exponent: self.exponent,
        };

        let price = if self.exponent <= 0 {
            Decimal::try_from_i128_with_scale(i128::from(self.mantissa), self.exponent.unsigned_abs())
                .map_err(|_| unrepresentable())?
        } else {
            let factor = 10i64
                .checked_pow(self.exponent.unsigned_abs())
                .ok_or_else(unrepresentable)?;
            Decimal::from(self.mantissa)
                .checked_mul(Decimal::from(factor))
                .ok_or_else(unrepresentable)?
        };

        Ok(price.normalize())
    }

    /// The price, if the update was published within `max_age_secs` of `now`.
    pub fn price_no_older_than(&self, now: i64, max_age_secs: u64) -> Option<Decimal> {
        if now.abs_diff(self.publish_time) > max_age_secs {
            return None;
        }
        self.decimal_price().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn update(mantissa: i64, exponent: i32, publish_time: i64) -> OracleUpdate {
        OracleUpdate {
            feed_id: "f9c0".to_string(),
            mantissa,
            exponent,
            publish_time,
        }
    }

    #[test]
    fn test_negative_exponent() {
        assert_eq!(update(4_325_012_345_678, -8, 0).decimal_price().unwrap(), dec!(43250.12345678));
    }

    #[test]
    fn test_positive_exponent() {
        assert_eq!(update(12, 3, 0).decimal_price().unwrap(), dec!(12000));
    }

    #[test]
    fn test_unrepresentable_exponent() {
        assert!(update(1, -40, 0).decimal_price().is_err());
        assert!(update(1, 30, 0).decimal_price().is_err());
    }

    #[test]
    fn test_staleness_window() {
        let now = 1_700_000_000;
        assert_eq!(update(100, 0, now - 61).price_no_older_than(now, ORACLE_MAX_AGE_SECS), None);
        assert_eq!(
            update(100, 0, now - 59).price_no_older_than(now, ORACLE_MAX_AGE_SECS),
            Some(dec!(100))
        );
        assert_eq!(
            update(100, 0, now - 60).price_no_older_than(now, ORACLE_MAX_AGE_SECS),
            Some(dec!(100))
        );
    }

    #[test]
    fn test_far_future_update_rejected() {
        let now = 1_700_000_000;
        assert_eq!(update(100, 0, now + 120).price_no_older_than(now, ORACLE_MAX_AGE_SECS), None);
    }

    #[test]
    fn test_ticker_kind_str() {
        assert_eq!(TickerKind::Latest.as_str(), "latest");
        assert_eq!(TickerKind::Other("24h".to_string()).to_string(), "24h");
    }
}
