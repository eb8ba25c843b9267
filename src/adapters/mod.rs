//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP clients, WebSockets, blockchain RPC).
//! Each sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `api`: Public data endpoint (tickers, candles)
//! - `chain`: Execution and order store contracts via alloy-rs
//! - `feeds`: Oracle price service WebSocket
//! - `metrics`: Prometheus metrics export and health checks
//! - `ui`: UI notification fan-out

pub mod api;
pub mod chain;
pub mod feeds;
pub mod metrics;
pub mod ui;
