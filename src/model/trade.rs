//! Canonical trade (fill) records

use crate::model::types::{OrderAction, PositionSide, TradeSide};
use pretty_simple_display::{DebugPretty, DisplaySimple};
use serde::{Deserialize, Serialize};

/// One normalized fill, venue-independent.
///
/// Quantity is always positive base-asset units; direction lives in `side`
/// and `position_side`. A non-zero `realized_pnl` marks a closing trade.
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Venue-unique trade identifier (suffixed `_close`/`_open` for splits)
    pub trade_id: String,
    /// Canonical symbol
    pub symbol: String,
    /// Taker direction
    pub side: TradeSide,
    /// Book the fill belongs to; `Both` in one-way mode
    pub position_side: PositionSide,
    /// Derived intent, see the normalizer rules
    pub order_action: OrderAction,
    /// Fill price
    pub price: f64,
    /// Base-asset quantity, always positive
    pub quantity: f64,
    /// Realized PnL attributed to this fill; non-zero means closing
    pub realized_pnl: f64,
    /// Fee paid, quote units
    pub fee: f64,
    /// UTC millisecond timestamp
    pub time: i64,
}

impl TradeRecord {
    /// Whether the fill reduces an existing position
    pub fn is_closing(&self) -> bool {
        self.realized_pnl != 0.0 || self.order_action.is_close()
    }

    /// Key used to group fills into per-book FIFO queues
    pub fn book_key(&self) -> Option<String> {
        let side = match self.order_action {
            OrderAction::OpenLong | OrderAction::CloseLong => PositionSide::Long,
            OrderAction::OpenShort | OrderAction::CloseShort => PositionSide::Short,
            _ => return None,
        };
        Some(format!("{}|{}", self.symbol, side.as_str()))
    }
}

/// Sort trades ascending by timestamp, preserving venue order for ties.
pub fn sort_by_time(trades: &mut [TradeRecord]) {
    trades.sort_by_key(|t| t.time);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_key() {
        let t = TradeRecord {
            trade_id: "1".into(),
            symbol: "ETHUSDT".into(),
            side: TradeSide::Sell,
            position_side: PositionSide::Long,
            order_action: OrderAction::CloseLong,
            price: 3600.0,
            quantity: 0.1,
            realized_pnl: 10.0,
            fee: 0.5,
            time: 1_700_000_000_000,
        };
        assert_eq!(t.book_key().as_deref(), Some("ETHUSDT|LONG"));
        assert!(t.is_closing());
    }

    #[test]
    fn test_sort_stable_on_equal_time() {
        let mk = |id: &str, time: i64| TradeRecord {
            trade_id: id.into(),
            symbol: "BTCUSDT".into(),
            side: TradeSide::Buy,
            position_side: PositionSide::Long,
            order_action: OrderAction::OpenLong,
            price: 50_000.0,
            quantity: 0.01,
            realized_pnl: 0.0,
            fee: 0.1,
            time,
        };
        let mut trades = vec![mk("b", 2), mk("a1", 1), mk("a2", 1)];
        sort_by_time(&mut trades);
        let ids: Vec<&str> = trades.iter().map(|t| t.trade_id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2", "b"]);
    }
}
