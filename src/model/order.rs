//! Order results, status reports, and locally recorded orders/fills

use crate::model::types::{OrderAction, OrderStatus, PositionSide, TradeSide, VenueKind};
use pretty_simple_display::{DebugPretty, DisplaySimple};
use serde::{Deserialize, Serialize};

/// Result of placing an order on a venue
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    /// Exchange order id; empty for `NoPosition` no-ops
    pub order_id: String,
    /// Canonical symbol
    pub symbol: String,
    /// Status right after placement
    pub status: OrderStatus,
    /// Quantity sent, base-asset units
    pub quantity: f64,
    /// Average fill price when the venue returns it immediately
    pub avg_price: f64,
}

impl OrderResult {
    /// A successful no-op for a close with nothing to close
    pub fn no_position(symbol: &str) -> Self {
        Self {
            order_id: String::new(),
            symbol: symbol.to_string(),
            status: OrderStatus::NoPosition,
            quantity: 0.0,
            avg_price: 0.0,
        }
    }
}

/// Normalized answer from `get_order_status`
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct OrderStatusInfo {
    /// Exchange order id
    pub order_id: String,
    /// Current state
    pub status: OrderStatus,
    /// Average fill price so far
    pub avg_price: f64,
    /// Executed base-asset quantity so far
    pub executed_qty: f64,
    /// Commission accumulated so far, quote units
    pub commission: f64,
}

/// Kinds of resting orders returned by `get_open_orders`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingOrderKind {
    /// Stop-loss trigger order
    StopLoss,
    /// Take-profit trigger order
    TakeProfit,
    /// Plain resting limit order
    Limit,
}

/// One pending order on the venue
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct PendingOrder {
    /// Exchange order id
    pub order_id: String,
    /// Canonical symbol
    pub symbol: String,
    /// Kind of resting order
    pub kind: PendingOrderKind,
    /// Order side
    pub side: TradeSide,
    /// Trigger or limit price
    pub price: f64,
    /// Order quantity, base-asset units
    pub quantity: f64,
}

/// Locally recorded order row
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct TraderOrder {
    /// Owning trader id
    pub trader_id: String,
    /// Venue
    pub exchange_id: VenueKind,
    /// Exchange order id
    pub order_id: String,
    /// Canonical symbol
    pub symbol: String,
    /// Side of the order
    pub side: TradeSide,
    /// Book the order works on
    pub position_side: PositionSide,
    /// Derived intent
    pub order_action: OrderAction,
    /// Order status
    pub status: OrderStatus,
    /// Average fill price
    pub avg_fill_price: f64,
    /// Executed quantity
    pub executed_qty: f64,
    /// Commission paid
    pub commission: f64,
    /// UTC ms the order was recorded
    pub created_at: i64,
}

/// Locally recorded fill row, deduped by `(exchange_id, trade_id)`
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct TraderFill {
    /// Owning trader id
    pub trader_id: String,
    /// Venue
    pub exchange_id: VenueKind,
    /// Venue trade id
    pub trade_id: String,
    /// Exchange order id the fill belongs to
    pub order_id: String,
    /// Canonical symbol
    pub symbol: String,
    /// Fill side
    pub side: TradeSide,
    /// Fill price
    pub price: f64,
    /// Fill quantity, base-asset units
    pub quantity: f64,
    /// Realized PnL attributed to the fill
    pub realized_pnl: f64,
    /// Fee paid
    pub fee: f64,
    /// UTC ms of the fill
    pub time: i64,
}
