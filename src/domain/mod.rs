//! Domain layer - Order construction rules and price records.
//!
//! Pure logic for the perpetuals client: unit normalization, order type
//! inference, order assembly, fee/value accounting, and oracle price
//! decoding. No I/O happens here (hexagonal architecture inner ring).

pub mod classifier;
pub mod error;
pub mod fees;
pub mod market;
pub mod order;
pub mod price;
pub mod units;

// Re-export core types for convenience
pub use classifier::OrderType;
pub use error::{OrderError, PriceError, UnitsError};
pub use fees::FeeCalculator;
pub use market::{AssetSpec, Direction, Market, MarketCatalog, MarketId};
pub use order::{CloseRequest, NormalizedOrder, OrderBuilder, OrderDraft, OrderId, OrderRecord, UserOrder};
pub use price::{OracleUpdate, PricePoint, Ticker, TickerKind};
