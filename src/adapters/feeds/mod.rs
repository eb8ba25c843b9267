//! Market Data Feed Adapters - Real-time Price Streaming
//!
//! Provides the WebSocket push subscription to the oracle price
//! service, with per-subscription socket reconnects.

pub mod oracle_ws;

pub use oracle_ws::PythOracleStream;
