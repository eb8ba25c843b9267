//! Configuration Module - TOML-based Client Configuration
//!
//! Loads and validates configuration from `config.toml`.
//! All contract addresses, endpoints and market parameters are
//! externalized here - nothing is hardcoded in the domain layer.
//! The signing key is read from `WALLET_PRIVATE_KEY`, never from file.

pub mod loader;

use rust_decimal::Decimal;
use serde::Deserialize;

/// Top-level client configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before the client begins operation.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Client identity and logging.
  pub app: AppSection,
  /// RPC endpoint and contract addresses.
  pub chain: ChainConfig,
  /// Public data endpoint.
  pub data: DataConfig,
  /// Oracle price service.
  pub oracle: OracleConfig,
  /// Metrics and monitoring.
  #[serde(default)]
  pub metrics: MetricsConfig,
  /// Collateral assets.
  pub assets: Vec<AssetConfig>,
  /// Tradable markets.
  pub markets: Vec<MarketConfig>,
}

/// Client identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
  /// Human-readable client name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Market whose price is mirrored into the page title.
  #[serde(default)]
  pub focus_market: Option<String>,
  /// User order refresh interval (seconds).
  #[serde(default = "default_orders_refresh")]
  pub orders_refresh_seconds: u64,
}

/// Chain connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
  /// RPC endpoint (http(s) or ws(s)).
  pub rpc_url: String,
  /// Expected chain id; unchecked when absent.
  #[serde(default)]
  pub chain_id: Option<u64>,
  /// Orders contract address.
  pub orders: String,
  /// Processor contract address.
  pub processor: String,
  /// OrderStore contract address.
  pub order_store: String,
}

/// Data endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
  /// Base URL of the ticker/candle API.
  pub base_url: String,
  /// Request timeout in seconds.
  #[serde(default = "default_timeout")]
  pub timeout_seconds: u64,
  /// Interval between `latest` ticker polls (milliseconds).
  #[serde(default = "default_poll_interval")]
  pub poll_interval_ms: u64,
  /// Maximum concurrent requests.
  #[serde(default = "default_max_concurrent")]
  pub max_concurrent: usize,
  /// Aggregated ticker kind fetched at startup (e.g. `24h`).
  #[serde(default)]
  pub ohlc_kind: Option<String>,
  /// GraphQL subgraph serving the CAP token's day data.
  #[serde(default)]
  pub cap_subgraph_url: Option<String>,
  /// CAP token address; required with `cap_subgraph_url`.
  #[serde(default)]
  pub cap_token: Option<String>,
}

/// Oracle price service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
  /// Price service WebSocket URL.
  pub ws_url: String,
  /// Connection waits until this market is loaded.
  #[serde(default = "default_reference_market")]
  pub reference_market: String,
  /// Delay between deferred connection attempts (milliseconds).
  #[serde(default = "default_retry_delay")]
  pub retry_delay_ms: u64,
  /// Staleness window for oracle updates (seconds).
  #[serde(default = "default_max_age")]
  pub max_age_seconds: u64,
  /// Socket reconnect delay (milliseconds).
  #[serde(default = "default_reconnect_delay")]
  pub reconnect_delay_ms: u64,
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
  /// Health check endpoint port.
  #[serde(default = "default_health_port")]
  pub health_port: u16,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: default_true(),
      bind_address: default_metrics_addr(),
      health_port: default_health_port(),
    }
  }
}

/// Collateral asset configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetConfig {
  /// Display symbol (`ETH`, `USDC`).
  pub symbol: String,
  /// Token address; zero address for the native coin.
  #[serde(default = "default_zero_address")]
  pub address: String,
  /// Token decimals.
  pub decimals: u32,
  /// Cleaning precision; defaults per symbol when absent, never above
  /// `decimals`.
  #[serde(default)]
  pub working_precision: Option<u32>,
  /// Paid as transaction value.
  #[serde(default)]
  pub native: bool,
}

/// Individual market configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
  /// Market id, e.g. `BTC-USD`.
  pub id: String,
  /// Oracle feed id (hex).
  pub oracle_feed: String,
  /// Fee rate in basis points.
  pub fee_bps: u32,
  /// Maximum leverage multiplier.
  pub max_leverage: Decimal,
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_orders_refresh() -> u64 {
  15
}

fn default_timeout() -> u64 {
  30
}

fn default_poll_interval() -> u64 {
  5_000
}

fn default_max_concurrent() -> usize {
  4
}

fn default_reference_market() -> String {
  "BTC-USD".to_string()
}

fn default_retry_delay() -> u64 {
  2_000
}

fn default_max_age() -> u64 {
  60
}

fn default_reconnect_delay() -> u64 {
  5_000
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_health_port() -> u16 {
  8080
}

fn default_zero_address() -> String {
  "0x0000000000000000000000000000000000000000".to_string()
}
