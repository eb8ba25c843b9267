//! Perpetuals Order Client - Library Root
//!
//! Order construction and price reconciliation for an on-chain
//! perpetuals exchange. Re-exports all modules for the service binary,
//! integration tests and benchmarks.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
