//! Per-cycle trading context assembled for the decision producer

use crate::model::balance::AccountBalance;
use crate::model::types::PositionSide;
use pretty_simple_display::{DebugPretty, DisplaySimple};
use serde::{Deserialize, Serialize};

/// One open position as presented to the decision producer
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct PositionInfo {
    /// Canonical symbol
    pub symbol: String,
    /// long / short
    pub side: PositionSide,
    /// Base-asset size, positive
    pub quantity: f64,
    /// Average entry price
    pub entry_price: f64,
    /// Current mark price
    pub mark_price: f64,
    /// Unrealized PnL, quote units
    pub unrealized_pnl: f64,
    /// Unrealized PnL over margin used, percent (leveraged)
    pub unrealized_pnl_pct: f64,
    /// Position leverage
    pub leverage: u32,
    /// Liquidation price when known
    pub liquidation_price: f64,
    /// Best-known entry time, UTC ms
    pub entry_time: i64,
    /// Highest unrealized PnL percent seen while open
    pub peak_pnl_pct: f64,
}

/// Everything the producer sees for one cycle
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct TradingContext {
    /// Cycle number (monotonic per trader)
    pub cycle_number: u64,
    /// UTC ms at context-build time
    pub timestamp: i64,
    /// Account balance snapshot
    pub balance: AccountBalance,
    /// Open positions with computed percentages
    pub positions: Vec<PositionInfo>,
    /// Candidate symbols from the strategy engine
    pub candidate_symbols: Vec<String>,
    /// Realized PnL accumulated since the last daily reset
    pub daily_pnl: f64,
    /// Total margin in use, percent of equity
    pub margin_used_pct: f64,
}

impl TradingContext {
    /// Count of open positions (capacity gate input)
    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    /// Find a position by symbol and side
    pub fn position(&self, symbol: &str, side: PositionSide) -> Option<&PositionInfo> {
        self.positions
            .iter()
            .find(|p| p.symbol == symbol && p.side == side)
    }
}

/// Immutable per-cycle equity snapshot persisted to the store
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct EquitySnapshot {
    /// Owning trader id
    pub trader_id: String,
    /// UTC ms
    pub timestamp: i64,
    /// Wallet balance plus unrealized PnL
    pub total_equity: f64,
    /// Wallet balance
    pub balance: f64,
    /// Unrealized PnL across positions
    pub unrealized_pnl: f64,
    /// Number of open positions
    pub position_count: usize,
    /// Margin in use, percent of equity
    pub margin_used_pct: f64,
}

/// Leveraged PnL percentage relative to entry.
///
/// long: `(mark-entry)/entry * leverage * 100`; short mirrors it.
pub fn leveraged_pnl_pct(side: PositionSide, entry: f64, mark: f64, leverage: u32) -> f64 {
    if entry <= 0.0 {
        return 0.0;
    }
    let raw = match side {
        PositionSide::Short => (entry - mark) / entry,
        _ => (mark - entry) / entry,
    };
    raw * leverage as f64 * 100.0
}
