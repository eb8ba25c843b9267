//! Data API Adapter
//!
//! Implements the HTTP client for the exchange's public data endpoint.
//!
//! Sub-modules:
//! - `client`: HTTP client with concurrency limit and status checks
//! - `ticker`: Ticker snapshots and candle series
//! - `types`: Response type definitions

pub mod client;
pub mod ticker;
pub mod types;

pub use client::{DataClient, DataClientConfig};
pub use ticker::RestTickerSource;
