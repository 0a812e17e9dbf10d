//! Store interface
//!
//! Persistence is abstract: the core writes orders, fills, positions,
//! decision records, and equity snapshots through this trait and never
//! assumes a backend. Each operation is atomic at the store's own
//! granularity; there are no cross-operation transactions, and the sync
//! workers are responsible for converging any eventual inconsistency.

/// In-memory store implementation
pub mod memory;
/// Idempotent trade-to-position processor
pub mod position_builder;

use crate::error::ExecError;
use crate::model::{ClosedPnlRecord, EquitySnapshot, OpenPosition, PositionSide, TraderFill,
    TraderOrder, VenueKind};
use crate::producer::DecisionRecord;
use pretty_simple_display::{DebugPretty, DisplaySimple};
use serde::{Deserialize, Serialize};

pub use memory::MemoryStore;
pub use position_builder::PositionBuilder;

/// Aggregate statistics over closed positions
#[derive(DebugPretty, DisplaySimple, Clone, Default, Serialize, Deserialize)]
pub struct FullStats {
    /// Closed round-trips counted
    pub total_trades: u64,
    /// Trades with positive PnL
    pub winning_trades: u64,
    /// Trades with negative PnL
    pub losing_trades: u64,
    /// Sum of realized PnL
    pub total_pnl: f64,
    /// Sum of fees
    pub total_fees: f64,
    /// Win rate in percent
    pub win_rate: f64,
    /// Gross profit over gross loss
    pub profit_factor: f64,
}

/// Persistence surface consumed by the core.
///
/// Implementations must be safe for concurrent use: the trading loop, the
/// drawdown monitor, and one sync worker per venue all hold the same
/// handle.
pub trait Store: Send + Sync {
    // ---- orders ----

    /// Insert an order row; replaces an existing row with the same
    /// `(exchange_id, order_id)`.
    fn insert_order(&self, order: TraderOrder) -> Result<(), ExecError>;

    /// Update fill columns on an order row
    fn update_order_fill(
        &self,
        exchange_id: VenueKind,
        order_id: &str,
        avg_fill_price: f64,
        executed_qty: f64,
        commission: f64,
    ) -> Result<(), ExecError>;

    /// Fetch one order row
    fn get_order(
        &self,
        exchange_id: VenueKind,
        order_id: &str,
    ) -> Result<Option<TraderOrder>, ExecError>;

    // ---- fills ----

    /// Insert a fill; returns false (and writes nothing) when a row with
    /// the same `(exchange_id, trade_id)` already exists.
    fn insert_fill(&self, fill: TraderFill) -> Result<bool, ExecError>;

    /// Whether a fill is already recorded
    fn has_fill(&self, exchange_id: VenueKind, trade_id: &str) -> Result<bool, ExecError>;

    /// Most recent fills for a trader, newest first
    fn get_recent_trades(&self, trader_id: &str, limit: usize)
    -> Result<Vec<TraderFill>, ExecError>;

    // ---- positions ----

    /// Create an open-position row
    fn create_open_position(&self, position: OpenPosition) -> Result<(), ExecError>;

    /// Open position for `(trader, symbol, side)` if any
    fn get_open_position_by_symbol(
        &self,
        trader_id: &str,
        symbol: &str,
        side: PositionSide,
    ) -> Result<Option<OpenPosition>, ExecError>;

    /// Replace an open-position row (same identity)
    fn update_open_position(&self, position: OpenPosition) -> Result<(), ExecError>;

    /// Drop every open-position row for a trader
    fn delete_all_open_positions(&self, trader_id: &str) -> Result<(), ExecError>;

    /// Append a closed round-trip
    fn insert_closed_position(
        &self,
        trader_id: &str,
        record: ClosedPnlRecord,
    ) -> Result<(), ExecError>;

    /// Closed round-trips, oldest first
    fn get_closed_positions(&self, trader_id: &str) -> Result<Vec<ClosedPnlRecord>, ExecError>;

    /// Aggregate stats over closed positions
    fn get_full_stats(&self, trader_id: &str) -> Result<FullStats, ExecError>;

    // ---- decisions ----

    /// Persist a cycle record
    fn log_decision(&self, record: DecisionRecord) -> Result<(), ExecError>;

    /// Highest cycle number recorded for a trader; 0 when none
    fn get_last_cycle_number(&self, trader_id: &str) -> Result<u64, ExecError>;

    // ---- equity ----

    /// Persist an equity snapshot
    fn save_equity(&self, snapshot: EquitySnapshot) -> Result<(), ExecError>;

    // ---- trader metadata ----

    /// Recorded initial balance, if any
    fn get_initial_balance(&self, trader_id: &str) -> Result<Option<f64>, ExecError>;

    /// Record the initial balance
    fn set_initial_balance(&self, trader_id: &str, balance: f64) -> Result<(), ExecError>;
}

/// Compute aggregate stats from a closed-position list
pub fn stats_of(records: &[ClosedPnlRecord]) -> FullStats {
    let total_trades = records.len() as u64;
    let winning = records.iter().filter(|r| r.realized_pnl > 0.0).count() as u64;
    let losing = records.iter().filter(|r| r.realized_pnl < 0.0).count() as u64;
    let gross_profit: f64 = records
        .iter()
        .filter(|r| r.realized_pnl > 0.0)
        .map(|r| r.realized_pnl)
        .sum();
    let gross_loss: f64 = records
        .iter()
        .filter(|r| r.realized_pnl < 0.0)
        .map(|r| r.realized_pnl.abs())
        .sum();
    FullStats {
        total_trades,
        winning_trades: winning,
        losing_trades: losing,
        total_pnl: records.iter().map(|r| r.realized_pnl).sum(),
        total_fees: records.iter().map(|r| r.fee).sum(),
        win_rate: if total_trades > 0 {
            winning as f64 / total_trades as f64 * 100.0
        } else {
            0.0
        },
        profit_factor: if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        },
    }
}
