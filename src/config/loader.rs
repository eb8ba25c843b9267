//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! providing clear error messages for misconfiguration, and turning
//! the validated sections into the runtime types the services take.

use std::path::Path;
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tracing::info;

use super::{AppConfig, AssetConfig};
use crate::adapters::api::DataClientConfig;
use crate::adapters::chain::ContractAddresses;
use crate::domain::market::{
  AssetSpec, DEFAULT_WORKING_PRECISION, Market, MarketCatalog, USDC_WORKING_PRECISION,
};
use crate::usecases::price_reconciler::ReconcilerConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    markets = config.markets.len(),
    assets = config.assets.len(),
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content).context("Failed to parse config.toml")?;
  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Non-empty endpoints and parseable contract addresses
/// - Positive leverage and sane fee rates
/// - Unique market ids and asset symbols
/// - Working precision within token decimals
/// - A configured reference market
/// - A complete CAP subgraph pair, if any
fn validate_config(config: &AppConfig) -> Result<()> {
  // Endpoint validation
  anyhow::ensure!(!config.chain.rpc_url.is_empty(), "RPC URL must not be empty");
  anyhow::ensure!(!config.data.base_url.is_empty(), "Data base URL must not be empty");
  anyhow::ensure!(!config.oracle.ws_url.is_empty(), "Oracle WebSocket URL must not be empty");
  anyhow::ensure!(
    config.data.poll_interval_ms > 0,
    "poll_interval_ms must be positive"
  );

  for (name, addr) in [
    ("orders", &config.chain.orders),
    ("processor", &config.chain.processor),
    ("order_store", &config.chain.order_store),
  ] {
    parse_address(addr).with_context(|| format!("Invalid {name} contract address"))?;
  }

  // Asset validation
  anyhow::ensure!(!config.assets.is_empty(), "At least one asset must be configured");
  for (i, asset) in config.assets.iter().enumerate() {
    anyhow::ensure!(!asset.symbol.is_empty(), "Asset {} has empty symbol", i);
    anyhow::ensure!(
      asset.decimals <= 77,
      "Asset {} decimals {} exceed uint256 range",
      asset.symbol,
      asset.decimals
    );
    if let Some(precision) = asset.working_precision {
      anyhow::ensure!(
        precision <= asset.decimals,
        "Asset {} working_precision {} exceeds decimals {}",
        asset.symbol,
        precision,
        asset.decimals
      );
    }
    parse_address(&asset.address)
      .with_context(|| format!("Invalid address for asset {}", asset.symbol))?;
    anyhow::ensure!(
      config.assets[..i].iter().all(|a| a.symbol != asset.symbol),
      "Duplicate asset symbol {}",
      asset.symbol
    );
  }

  // Market validation
  anyhow::ensure!(!config.markets.is_empty(), "At least one market must be configured");
  for (i, market) in config.markets.iter().enumerate() {
    anyhow::ensure!(!market.id.is_empty(), "Market {} has empty id", i);
    anyhow::ensure!(
      !market.oracle_feed.is_empty(),
      "Market {} has empty oracle_feed",
      market.id
    );
    anyhow::ensure!(
      market.max_leverage > Decimal::ZERO,
      "Market {} max_leverage must be positive, got {}",
      market.id,
      market.max_leverage
    );
    anyhow::ensure!(
      market.fee_bps < 10_000,
      "Market {} fee_bps must be below 10000, got {}",
      market.id,
      market.fee_bps
    );
    anyhow::ensure!(
      config.markets[..i].iter().all(|m| m.id != market.id),
      "Duplicate market id {}",
      market.id
    );
  }

  anyhow::ensure!(
    config.markets.iter().any(|m| m.id == config.oracle.reference_market),
    "Reference market {} is not configured",
    config.oracle.reference_market
  );

  match (&config.data.cap_subgraph_url, &config.data.cap_token) {
    (None, None) => {}
    (Some(url), Some(token)) => {
      anyhow::ensure!(!url.is_empty(), "cap_subgraph_url must not be empty");
      parse_address(token).context("Invalid cap_token address")?;
    }
    _ => anyhow::bail!("cap_subgraph_url and cap_token must be set together"),
  }

  if let Some(focus) = &config.app.focus_market {
    anyhow::ensure!(
      config.markets.iter().any(|m| &m.id == focus),
      "Focus market {} is not configured",
      focus
    );
  }

  Ok(())
}

fn parse_address(value: &str) -> Result<Address> {
  value
    .trim()
    .parse::<Address>()
    .with_context(|| format!("not an address: {value}"))
}

/// Explicit precision, else the per-symbol default capped at `decimals`.
fn working_precision(asset: &AssetConfig) -> u32 {
  asset.working_precision.unwrap_or_else(|| {
    let default = if asset.symbol == "USDC" {
      USDC_WORKING_PRECISION
    } else {
      DEFAULT_WORKING_PRECISION
    };
    default.min(asset.decimals)
  })
}

/// Market catalog from the `assets` and `markets` sections.
pub fn build_catalog(config: &AppConfig) -> Result<MarketCatalog> {
  let assets = config
    .assets
    .iter()
    .map(|a| {
      Ok(AssetSpec {
        symbol: a.symbol.clone(),
        address: parse_address(&a.address)?,
        decimals: a.decimals,
        working_precision: working_precision(a),
        native: a.native,
      })
    })
    .collect::<Result<Vec<_>>>()?;

  let markets = config
    .markets
    .iter()
    .map(|m| Market {
      id: m.id.clone(),
      oracle_feed: m.oracle_feed.clone(),
      fee_bps: m.fee_bps,
      max_leverage: m.max_leverage,
    })
    .collect();

  Ok(MarketCatalog::new(markets, assets))
}

/// Exchange contract addresses from the `chain` section.
pub fn contract_addresses(config: &AppConfig) -> Result<ContractAddresses> {
  Ok(ContractAddresses {
    orders: parse_address(&config.chain.orders)?,
    processor: parse_address(&config.chain.processor)?,
    order_store: parse_address(&config.chain.order_store)?,
  })
}

/// HTTP client settings from the `data` section.
pub fn data_client_config(config: &AppConfig) -> DataClientConfig {
  DataClientConfig {
    base_url: config.data.base_url.clone(),
    timeout: Duration::from_secs(config.data.timeout_seconds),
    max_concurrent: config.data.max_concurrent,
  }
}

/// Reconciler tuning from the `data`, `oracle` and `app` sections.
pub fn reconciler_config(config: &AppConfig) -> ReconcilerConfig {
  ReconcilerConfig {
    reference_market: config.oracle.reference_market.clone(),
    retry_delay: Duration::from_millis(config.oracle.retry_delay_ms),
    max_age_secs: config.oracle.max_age_seconds,
    poll_interval: Duration::from_millis(config.data.poll_interval_ms),
    focus_market: config.app.focus_market.clone(),
    refresh_cap_price: config.data.cap_subgraph_url.is_some(),
    ..ReconcilerConfig::default()
  }
}

/// CAP subgraph URL and token address, when configured.
pub fn cap_subgraph(config: &AppConfig) -> Result<Option<(String, Address)>> {
  match (&config.data.cap_subgraph_url, &config.data.cap_token) {
    (Some(url), Some(token)) => Ok(Some((url.clone(), parse_address(token)?))),
    _ => Ok(None),
  }
}
