//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the domain/usecases layer
//! requires from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `OrderContract`: Order submission, cancellation and self-execution
//! - `OrderStore`: Read-only view of a user's on-chain orders
//! - `TickerSource` / `OracleStream`: Pull and push price sources
//! - `Notifier`: UI side effects (toasts, modal, page title)

pub mod execution;
pub mod market_feed;
pub mod notifier;
pub mod order_store;
