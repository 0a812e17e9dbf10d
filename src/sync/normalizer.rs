//! Trade normalizer
//!
//! Turns venue fill payloads into canonical [`TradeRecord`]s. The drivers
//! parse their wire formats and feed the fields through these rules so the
//! action-derivation logic lives in exactly one place.

use crate::model::types::{OrderAction, PositionSide, TradeSide};
use crate::model::TradeRecord;

/// Derive the order action for a fill in explicit hedge mode.
///
/// The venue tells us which book the fill belongs to; the side alone
/// determines open vs close.
pub fn hedge_action(position_side: PositionSide, side: TradeSide) -> Option<OrderAction> {
    match (position_side, side) {
        (PositionSide::Long, TradeSide::Buy) => Some(OrderAction::OpenLong),
        (PositionSide::Long, TradeSide::Sell) => Some(OrderAction::CloseLong),
        (PositionSide::Short, TradeSide::Sell) => Some(OrderAction::OpenShort),
        (PositionSide::Short, TradeSide::Buy) => Some(OrderAction::CloseShort),
        (PositionSide::Both, _) => None,
    }
}

/// Derive the order action in one-way mode from realized PnL.
///
/// A non-zero PnL marks a closing fill, and the direction flips: a BUY that
/// realizes PnL closed a short, a SELL closed a long.
pub fn oneway_action(side: TradeSide, realized_pnl: f64) -> OrderAction {
    if realized_pnl != 0.0 {
        match side {
            TradeSide::Buy => OrderAction::CloseShort,
            TradeSide::Sell => OrderAction::CloseLong,
        }
    } else {
        match side {
            TradeSide::Buy => OrderAction::OpenLong,
            TradeSide::Sell => OrderAction::OpenShort,
        }
    }
}

/// Resolve a fill's action from whatever the venue gave us: explicit
/// hedge-mode side when present, realized-PnL inference otherwise.
pub fn resolve_action(
    position_side: PositionSide,
    side: TradeSide,
    realized_pnl: f64,
) -> OrderAction {
    hedge_action(position_side, side).unwrap_or_else(|| oneway_action(side, realized_pnl))
}

/// Normalize a fill where only the signed position size *before* the trade
/// is known (Lighter). A sign flip is split into a synthetic close+open
/// pair at the same timestamp with fees prorated by quantity.
pub fn from_position_before(
    trade_id: &str,
    symbol: &str,
    side: TradeSide,
    price: f64,
    quantity: f64,
    realized_pnl: f64,
    fee: f64,
    time: i64,
    position_before: f64,
) -> Vec<TradeRecord> {
    let signed_qty = match side {
        TradeSide::Buy => quantity,
        TradeSide::Sell => -quantity,
    };
    let position_after = position_before + signed_qty;

    let record = |id: String, action: OrderAction, qty: f64, pnl: f64, fee: f64| TradeRecord {
        trade_id: id,
        symbol: symbol.to_string(),
        side,
        position_side: action.position_side().unwrap_or(PositionSide::Both),
        order_action: action,
        price,
        quantity: qty,
        realized_pnl: pnl,
        fee,
        time,
    };

    // Same sign on both ends (or flat before): a plain open or close.
    let crosses_zero = position_before != 0.0
        && position_after != 0.0
        && position_before.signum() != position_after.signum();

    if !crosses_zero {
        let action = if position_before == 0.0 || position_before.signum() == signed_qty.signum() {
            match side {
                TradeSide::Buy => OrderAction::OpenLong,
                TradeSide::Sell => OrderAction::OpenShort,
            }
        } else {
            match side {
                TradeSide::Buy => OrderAction::CloseShort,
                TradeSide::Sell => OrderAction::CloseLong,
            }
        };
        return vec![record(
            trade_id.to_string(),
            action,
            quantity,
            realized_pnl,
            fee,
        )];
    }

    // Sign flip: close the old book entirely, open the rest on the other.
    let close_qty = position_before.abs();
    let open_qty = quantity - close_qty;
    let (close_action, open_action) = match side {
        TradeSide::Buy => (OrderAction::CloseShort, OrderAction::OpenLong),
        TradeSide::Sell => (OrderAction::CloseLong, OrderAction::OpenShort),
    };
    vec![
        record(
            format!("{trade_id}_close"),
            close_action,
            close_qty,
            realized_pnl,
            fee * (close_qty / quantity),
        ),
        record(
            format!("{trade_id}_open"),
            open_action,
            open_qty,
            0.0,
            fee * (open_qty / quantity),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hedge_action_table() {
        assert_eq!(
            hedge_action(PositionSide::Long, TradeSide::Buy),
            Some(OrderAction::OpenLong)
        );
        assert_eq!(
            hedge_action(PositionSide::Long, TradeSide::Sell),
            Some(OrderAction::CloseLong)
        );
        assert_eq!(
            hedge_action(PositionSide::Short, TradeSide::Sell),
            Some(OrderAction::OpenShort)
        );
        assert_eq!(
            hedge_action(PositionSide::Short, TradeSide::Buy),
            Some(OrderAction::CloseShort)
        );
        assert_eq!(hedge_action(PositionSide::Both, TradeSide::Buy), None);
    }

    #[test]
    fn test_oneway_close_flips_direction() {
        assert_eq!(oneway_action(TradeSide::Buy, 5.0), OrderAction::CloseShort);
        assert_eq!(oneway_action(TradeSide::Sell, -2.0), OrderAction::CloseLong);
        assert_eq!(oneway_action(TradeSide::Buy, 0.0), OrderAction::OpenLong);
        assert_eq!(oneway_action(TradeSide::Sell, 0.0), OrderAction::OpenShort);
    }

    #[test]
    fn test_position_before_plain_open() {
        let recs = from_position_before(
            "t1", "BTCUSDT", TradeSide::Buy, 50_000.0, 0.5, 0.0, 1.0, 1000, 0.0,
        );
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].order_action, OrderAction::OpenLong);
        assert_eq!(recs[0].quantity, 0.5);
    }

    #[test]
    fn test_position_before_plain_close() {
        // Short 0.5, buy back 0.3: stays short, plain close.
        let recs = from_position_before(
            "t2", "BTCUSDT", TradeSide::Buy, 50_000.0, 0.3, 12.0, 1.0, 1000, -0.5,
        );
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].order_action, OrderAction::CloseShort);
        assert_eq!(recs[0].realized_pnl, 12.0);
    }

    #[test]
    fn test_sign_flip_splits_with_prorated_fees() {
        // Long 0.2, sell 0.5: closes the long, opens a 0.3 short.
        let recs = from_position_before(
            "t3", "ETHUSDT", TradeSide::Sell, 3000.0, 0.5, 8.0, 1.0, 2000, 0.2,
        );
        assert_eq!(recs.len(), 2);

        let close = &recs[0];
        assert_eq!(close.trade_id, "t3_close");
        assert_eq!(close.order_action, OrderAction::CloseLong);
        assert!((close.quantity - 0.2).abs() < 1e-9);
        assert!((close.fee - 1.0 * 0.2 / 0.5).abs() < 1e-9);
        assert_eq!(close.realized_pnl, 8.0);

        let open = &recs[1];
        assert_eq!(open.trade_id, "t3_open");
        assert_eq!(open.order_action, OrderAction::OpenShort);
        assert!((open.quantity - 0.3).abs() < 1e-9);
        assert!((open.fee - 1.0 * 0.3 / 0.5).abs() < 1e-9);
        assert_eq!(open.realized_pnl, 0.0);
        assert_eq!(open.time, close.time);
    }
}
