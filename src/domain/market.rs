//! Market and asset metadata.
//!
//! Markets and assets are loaded once (from config or an on-chain registry)
//! and are read-only afterwards. The catalog is the lookup surface used by
//! the order builder and by the price reconciler when mapping oracle feeds.

use std::collections::HashMap;

use alloy::primitives::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Market identifier, e.g. `BTC-USD`.
pub type MarketId = String;

/// Oracle feed identifier (hex, without `0x`).
pub type FeedId = String;

/// Working precision applied by the cleaning step for most assets.
pub const DEFAULT_WORKING_PRECISION: u32 = 10;

/// Working precision for the USDC quote asset.
pub const USDC_WORKING_PRECISION: u32 = 6;

/// Position direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Long,
    Short,
}

impl Direction {
    pub fn is_long(self) -> bool {
        matches!(self, Self::Long)
    }

    pub fn from_is_long(is_long: bool) -> Self {
        if is_long { Self::Long } else { Self::Short }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

/// A collateral asset accepted by the execution contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSpec {
    /// Display symbol (`ETH`, `USDC`).
    pub symbol: String,
    /// Token address; zero for the chain's native coin.
    pub address: Address,
    /// Token decimals used for fixed-point conversion.
    pub decimals: u32,
    /// Decimal places kept by the margin/size cleaning step.
    pub working_precision: u32,
    /// Whether the asset is paid as transaction value (gas-equivalent coin).
    pub native: bool,
}

impl AssetSpec {
    /// The chain's native coin (18 decimals, paid as tx value).
    pub fn native_eth() -> Self {
        Self {
            symbol: "ETH".to_string(),
            address: Address::ZERO,
            decimals: 18,
            working_precision: DEFAULT_WORKING_PRECISION,
            native: true,
        }
    }

    /// USDC at the given token address (6 decimals, token-transfer path).
    pub fn usdc(address: Address) -> Self {
        Self {
            symbol: "USDC".to_string(),
            address,
            decimals: 6,
            working_precision: USDC_WORKING_PRECISION,
            native: false,
        }
    }
}

/// Trading market metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Market {
    pub id: MarketId,
    /// Oracle feed id for push price updates.
    pub oracle_feed: FeedId,
    /// Fee rate in basis points of size.
    pub fee_bps: u32,
    /// Maximum size / margin ratio.
    pub max_leverage: Decimal,
}

/// Read-only lookup of markets and assets.
#[derive(Debug, Clone, Default)]
pub struct MarketCatalog {
    markets: HashMap<MarketId, Market>,
    assets: HashMap<String, AssetSpec>,
}

impl MarketCatalog {
    pub fn new(markets: Vec<Market>, assets: Vec<AssetSpec>) -> Self {
        Self {
            markets: markets.into_iter().map(|m| (m.id.clone(), m)).collect(),
            assets: assets.into_iter().map(|a| (a.symbol.clone(), a)).collect(),
        }
    }

    pub fn market(&self, id: &str) -> Option<&Market> {
        self.markets.get(id)
    }

    pub fn contains_market(&self, id: &str) -> bool {
        self.markets.contains_key(id)
    }

    pub fn markets(&self) -> impl Iterator<Item = &Market> {
        self.markets.values()
    }

    pub fn asset(&self, symbol: &str) -> Option<&AssetSpec> {
        self.assets.get(symbol)
    }

    /// Reverse lookup from token address to asset (close-position path).
    pub fn asset_by_address(&self, address: &Address) -> Option<&AssetSpec> {
        self.assets.values().find(|a| &a.address == address)
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    /// Snapshot of `feed id → market id` for every loaded market.
    pub fn feed_map(&self) -> HashMap<FeedId, MarketId> {
        self.markets
            .values()
            .map(|m| (normalize_feed_id(&m.oracle_feed), m.id.clone()))
            .collect()
    }
}

/// Lower-case a feed id and strip any `0x` prefix.
pub fn normalize_feed_id(id: &str) -> FeedId {
    id.trim_start_matches("0x").to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn catalog() -> MarketCatalog {
        MarketCatalog::new(
            vec![Market {
                id: "BTC-USD".to_string(),
                oracle_feed: "0xF9C0172B".to_string(),
                fee_bps: 10,
                max_leverage: dec!(50),
            }],
            vec![AssetSpec::native_eth(), AssetSpec::usdc(Address::repeat_byte(0x11))],
        )
    }

    #[test]
    fn test_feed_map_normalizes_ids() {
        let map = catalog().feed_map();
        assert_eq!(map.get("f9c0172b").map(String::as_str), Some("BTC-USD"));
    }

    #[test]
    fn test_asset_by_address() {
        let c = catalog();
        let usdc = c.asset_by_address(&Address::repeat_byte(0x11)).unwrap();
        assert_eq!(usdc.symbol, "USDC");
        assert_eq!(c.asset_by_address(&Address::ZERO).unwrap().symbol, "ETH");
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Long.to_string(), "LONG");
        assert_eq!(Direction::from_is_long(false), Direction::Short);
    }
}
