//! Data model for the execution core

/// Account balance snapshot
pub mod balance;
/// Trading context assembled per cycle
pub mod context;
/// Decisions and execution outcomes
pub mod decision;
/// Orders, fills, and status reports
pub mod order;
/// Positions: venue snapshots, local rows, closed round-trips
pub mod position;
/// Precision rules and rounding
pub mod precision;
/// Canonical trade records
pub mod trade;
/// Shared enumerations
pub mod types;

pub use balance::AccountBalance;
pub use context::{EquitySnapshot, PositionInfo, TradingContext, leveraged_pnl_pct};
pub use decision::{Decision, DecisionOutcome, sort_for_execution};
pub use order::{
    OrderResult, OrderStatusInfo, PendingOrder, PendingOrderKind, TraderFill, TraderOrder,
};
pub use position::{ClosedPnlRecord, OpenPosition, OpenTradeEntry, PositionStatus, VenuePosition};
pub use precision::SymbolPrecision;
pub use trade::TradeRecord;
pub use types::{CloseType, OrderAction, OrderStatus, PositionSide, TradeSide, VenueKind};
