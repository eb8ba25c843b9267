//! Chain Adapters - On-chain Order Execution
//!
//! Provides on-chain access via alloy-rs 0.9 for:
//! - Signing RPC provider management
//! - Orders / Processor / OrderStore contract bindings

pub mod contracts;
pub mod provider;

pub use contracts::{ContractAddresses, OrderContracts};
pub use provider::ChainProvider;
