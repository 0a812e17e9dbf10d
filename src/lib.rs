//! # perp-exec
//!
//! Multi-venue perpetual-futures trading execution core. Translates
//! discrete trading decisions into correctly signed, venue-specific orders
//! on eight perpetual-futures exchanges, while keeping a locally-consistent
//! view of orders, fills, and positions reconciled against each venue's
//! trade history.
//!
//! The building blocks:
//! - [`venue`]: one driver per exchange behind the [`venue::VenueDriver`]
//!   capability contract (balances, positions, orders, precision, history)
//! - [`sync`]: background reconciliation of venue fills into the store
//! - [`rebuild`]: FIFO rebuild of closed positions from a trade stream
//! - [`executor`]: decision execution with code-enforced risk gates
//! - [`monitor`]: peak-tracking emergency drawdown closes
//! - [`trader`]: the trading loop and the composing facade

/// Trader and credential configuration
pub mod config;
/// Core constants and venue tables
pub mod constants;
/// Error types
pub mod error;
/// Decision execution and risk gates
pub mod executor;
/// Data model
pub mod model;
/// Drawdown monitor
pub mod monitor;
/// Decision-producer interface
pub mod producer;
/// Commonly used re-exports
pub mod prelude;
/// Request pacing
pub mod rate_limit;
/// FIFO position rebuilder
pub mod rebuild;
/// Store interface and in-memory store
pub mod store;
/// Strategy-engine interface
pub mod strategy;
/// Fill normalization and sync workers
pub mod sync;
/// Trade-event hook
pub mod telemetry;
/// Trading loop and facade
pub mod trader;
/// Venue drivers
pub mod venue;

pub use config::{TraderConfig, VenueCredentials};
pub use error::ExecError;
pub use model::{
    AccountBalance, ClosedPnlRecord, Decision, DecisionOutcome, EquitySnapshot, OpenPosition,
    OrderAction, OrderResult, OrderStatus, PositionSide, SymbolPrecision, TradeRecord, TradeSide,
    TraderFill, TraderOrder, VenueKind, VenuePosition,
};
pub use trader::AutoTrader;
pub use venue::{VenueDriver, build_driver};
