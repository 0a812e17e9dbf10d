//! Automatic trader: context assembly, trading loop, facade

/// Facade and main loop
pub mod auto_trader;
/// Per-cycle context assembly
pub mod context;

pub use auto_trader::AutoTrader;
pub use context::{FirstSeenMap, build_trading_context};
