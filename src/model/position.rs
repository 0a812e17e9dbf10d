//! Position structures: venue snapshots, local open positions, closed round-trips

use crate::model::types::{CloseType, PositionSide, VenueKind};
use pretty_simple_display::{DebugPretty, DisplaySimple};
use serde::{Deserialize, Serialize};

/// Position as reported by a venue, already normalized.
///
/// `position_amt` is always positive; direction is in `side`.
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct VenuePosition {
    /// Canonical symbol
    pub symbol: String,
    /// long / short
    pub side: PositionSide,
    /// Base-asset size, positive
    pub position_amt: f64,
    /// Average entry price
    pub entry_price: f64,
    /// Venue mark price
    pub mark_price: f64,
    /// Venue-computed unrealized PnL, quote units
    pub unrealized_profit: f64,
    /// Position leverage
    pub leverage: u32,
    /// Estimated liquidation price; 0 when the venue omits it
    pub liquidation_price: f64,
    /// Position creation time when the venue exposes it, UTC ms
    pub created_time: Option<i64>,
}

impl VenuePosition {
    /// Margin consumed by this position at its leverage
    pub fn margin_used(&self) -> f64 {
        if self.leverage == 0 {
            return 0.0;
        }
        self.position_amt * self.entry_price / self.leverage as f64
    }
}

/// Locally tracked open position keyed by `(trader, venue, symbol, side)`
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct OpenPosition {
    /// Owning trader id
    pub trader_id: String,
    /// Venue this position lives on
    pub exchange_id: VenueKind,
    /// Canonical symbol
    pub symbol: String,
    /// long / short
    pub side: PositionSide,
    /// Base-asset size
    pub quantity: f64,
    /// Quantity-weighted entry price
    pub entry_price: f64,
    /// Exchange order id of the opening order
    pub entry_order_id: String,
    /// UTC ms of the first entry fill
    pub entry_time: i64,
    /// Leverage at entry
    pub leverage: u32,
    /// cross / isolated at entry
    pub is_cross_margin: bool,
    /// OPEN until fully consumed by closes
    pub status: PositionStatus,
    /// Where the row came from (sync worker, executor, rebuild)
    pub source: String,
}

/// Lifecycle of a locally tracked position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    /// Still open on the venue
    Open,
    /// Fully closed
    Closed,
}

/// Snapshot of a completed round-trip
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct ClosedPnlRecord {
    /// Canonical symbol
    pub symbol: String,
    /// Book that was closed
    pub side: PositionSide,
    /// Quantity-weighted entry price across consumed lots
    pub entry_price: f64,
    /// Exit fill price
    pub exit_price: f64,
    /// Closed base-asset quantity
    pub quantity: f64,
    /// Realized PnL, quote units
    pub realized_pnl: f64,
    /// Entry fees (prorated) plus exit fee
    pub fee: f64,
    /// UTC ms of the earliest consumed entry
    pub entry_time: i64,
    /// UTC ms of the closing fill
    pub exit_time: i64,
    /// How the close happened
    pub close_type: CloseType,
}

/// FIFO bookkeeping entry for one opening fill (in-memory only).
///
/// `quantity` is consumed during matching; `original_quantity` stays fixed
/// so fees prorate against the full lot.
#[derive(Debug, Clone)]
pub struct OpenTradeEntry {
    /// Entry fill price
    pub price: f64,
    /// Remaining unmatched quantity
    pub quantity: f64,
    /// Quantity at fill time
    pub original_quantity: f64,
    /// Entry fee for the full lot
    pub fee: f64,
    /// UTC ms of the fill
    pub time: i64,
    /// Venue trade id of the fill
    pub trade_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_margin_used() {
        let p = VenuePosition {
            symbol: "BTCUSDT".into(),
            side: PositionSide::Long,
            position_amt: 0.5,
            entry_price: 60_000.0,
            mark_price: 61_000.0,
            unrealized_profit: 500.0,
            leverage: 10,
            liquidation_price: 54_500.0,
            created_time: None,
        };
        assert!((p.margin_used() - 3_000.0).abs() < 1e-9);
    }
}
