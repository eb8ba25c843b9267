//! Use Cases Layer - Application Orchestration
//!
//! Orchestrates domain logic through port interfaces:
//! - `OrderService`: order submission, close, cancel and self-execution
//! - `PriceReconciler`: oracle + ticker price reconciliation loop
//! - `AppState`: shared price table, draft and flags

pub mod app_state;
pub mod order_service;
pub mod price_reconciler;

pub use app_state::{AppState, PriceTable};
pub use order_service::{OrderService, SubmissionOutcome};
pub use price_reconciler::{ConnectionState, PriceReconciler, ReconcilerCommand, ReconcilerConfig};
