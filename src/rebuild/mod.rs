//! Position rebuilder
//!
//! Folds an ordered trade stream into closed round-trip records plus the
//! residual open lots per `(symbol, side)` book. Matching is strict FIFO:
//! the earliest entry is consumed first, never averaged across lots.

use crate::constants::QTY_EPSILON;
use crate::model::types::{CloseType, OrderAction, PositionSide};
use crate::model::{ClosedPnlRecord, OpenTradeEntry, TradeRecord};
use std::collections::HashMap;
use std::collections::VecDeque;
use tracing::debug;

/// Residual state of one book after a rebuild
#[derive(Debug, Default)]
pub struct BookState {
    /// Unmatched entry lots, oldest first
    pub entries: VecDeque<OpenTradeEntry>,
    /// Total unmatched quantity
    pub total_qty: f64,
}

/// Output of a rebuild pass
#[derive(Debug, Default)]
pub struct RebuildResult {
    /// Completed round-trips in close order
    pub closed: Vec<ClosedPnlRecord>,
    /// Residual open lots keyed by `symbol|SIDE`
    pub open_books: HashMap<String, BookState>,
}

/// Rebuild closed positions from an arbitrary trade list.
///
/// Trades are stable-sorted by time first, so venue streams may arrive in
/// any order. Trades whose book cannot be determined (hold/wait actions,
/// `Both` with no PnL signal) are skipped.
pub fn rebuild(trades: &[TradeRecord]) -> RebuildResult {
    let mut sorted: Vec<&TradeRecord> = trades.iter().collect();
    sorted.sort_by_key(|t| t.time);

    let mut result = RebuildResult::default();
    for trade in sorted {
        let Some(key) = trade.book_key() else {
            debug!("skipping trade {} with undetermined book", trade.trade_id);
            continue;
        };
        let book = result.open_books.entry(key).or_default();
        if trade.order_action.is_close() || trade.realized_pnl != 0.0 {
            if let Some(record) = close_against(book, trade) {
                result.closed.push(record);
            }
        } else {
            book.entries.push_back(OpenTradeEntry {
                price: trade.price,
                quantity: trade.quantity,
                original_quantity: trade.quantity,
                fee: trade.fee,
                time: trade.time,
                trade_id: trade.trade_id.clone(),
            });
            book.total_qty += trade.quantity;
        }
    }
    result
}

/// Match one closing trade against a book's FIFO queue.
fn close_against(book: &mut BookState, trade: &TradeRecord) -> Option<ClosedPnlRecord> {
    let side = match trade.order_action {
        OrderAction::CloseShort => PositionSide::Short,
        _ => PositionSide::Long,
    };

    let mut remaining = trade.quantity;
    let mut matched_qty = 0.0;
    let mut weighted_sum = 0.0;
    let mut entry_fee = 0.0;
    let mut entry_time = 0i64;

    while remaining > QTY_EPSILON {
        let Some(head) = book.entries.front_mut() else {
            break;
        };
        let consumed = remaining.min(head.quantity);
        weighted_sum += head.price * consumed;
        entry_fee += head.fee * (consumed / head.original_quantity);
        if entry_time == 0 {
            entry_time = head.time;
        }
        head.quantity -= consumed;
        remaining -= consumed;
        matched_qty += consumed;
        book.total_qty -= consumed;
        if head.quantity <= QTY_EPSILON {
            book.entries.pop_front();
        }
    }

    let (entry_price, qty, entry_time) = if matched_qty > QTY_EPSILON && remaining <= QTY_EPSILON {
        (weighted_sum / matched_qty, matched_qty, entry_time)
    } else if matched_qty > QTY_EPSILON {
        // Partial history: price the matched part, keep the trade's qty.
        (weighted_sum / matched_qty, trade.quantity, entry_time)
    } else {
        // History starts mid-position: back-solve the entry from the PnL.
        // long: pnl = (exit - entry) * qty; short mirrors it.
        let per_unit = if trade.quantity > 0.0 {
            trade.realized_pnl / trade.quantity
        } else {
            0.0
        };
        let entry = match side {
            PositionSide::Short => trade.price + per_unit,
            _ => trade.price - per_unit,
        };
        (entry, trade.quantity, trade.time)
    };

    if entry_price <= 0.0 || trade.price <= 0.0 || qty <= 0.0 {
        debug!(
            "dropping unreconstructable close {} (entry {}, exit {}, qty {})",
            trade.trade_id, entry_price, trade.price, qty
        );
        return None;
    }

    Some(ClosedPnlRecord {
        symbol: trade.symbol.clone(),
        side,
        entry_price,
        exit_price: trade.price,
        quantity: qty,
        realized_pnl: trade.realized_pnl,
        fee: entry_fee + trade.fee,
        entry_time,
        exit_time: trade.time,
        close_type: CloseType::Unknown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::TradeSide;

    fn trade(
        id: &str,
        action: OrderAction,
        price: f64,
        qty: f64,
        pnl: f64,
        fee: f64,
        time: i64,
    ) -> TradeRecord {
        let side = match action {
            OrderAction::OpenLong | OrderAction::CloseShort => TradeSide::Buy,
            _ => TradeSide::Sell,
        };
        TradeRecord {
            trade_id: id.into(),
            symbol: "ETHUSDT".into(),
            side,
            position_side: action.position_side().unwrap_or(PositionSide::Both),
            order_action: action,
            price,
            quantity: qty,
            realized_pnl: pnl,
            fee,
            time,
        }
    }

    #[test]
    fn test_flat_round_trip_long() {
        let trades = vec![
            trade("o1", OrderAction::OpenLong, 3500.0, 0.1, 0.0, 0.5, 1000),
            trade("c1", OrderAction::CloseLong, 3600.0, 0.1, 10.0, 0.5, 2000),
        ];
        let result = rebuild(&trades);
        assert_eq!(result.closed.len(), 1);
        let r = &result.closed[0];
        assert!((r.entry_price - 3500.0).abs() < 1e-9);
        assert!((r.exit_price - 3600.0).abs() < 1e-9);
        assert!((r.quantity - 0.1).abs() < 1e-9);
        assert!((r.realized_pnl - 10.0).abs() < 1e-9);
        assert!((r.fee - 1.0).abs() < 1e-9);
        assert_eq!(r.entry_time, 1000);
        assert_eq!(r.exit_time, 2000);
        assert_eq!(r.close_type, CloseType::Unknown);

        // Queue fully consumed.
        let book = &result.open_books["ETHUSDT|LONG"];
        assert!(book.entries.is_empty());
        assert!(book.total_qty.abs() < QTY_EPSILON);
    }

    #[test]
    fn test_partial_close_leaves_residual() {
        let trades = vec![
            trade("o1", OrderAction::OpenLong, 100.0, 10.0, 0.0, 2.0, 1000),
            trade("c1", OrderAction::CloseLong, 105.0, 3.0, 15.0, 0.6, 2000),
        ];
        let result = rebuild(&trades);
        assert_eq!(result.closed.len(), 1);
        let r = &result.closed[0];
        assert!((r.quantity - 3.0).abs() < 1e-9);
        assert!((r.entry_price - 100.0).abs() < 1e-9);
        // Entry fee prorated 3/10 of 2.0 plus the exit fee.
        assert!((r.fee - (2.0 * 0.3 + 0.6)).abs() < 1e-9);

        let book = &result.open_books["ETHUSDT|LONG"];
        assert_eq!(book.entries.len(), 1);
        assert!((book.total_qty - 7.0).abs() < 1e-9);
        assert!((book.entries[0].quantity - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_fifo_weighted_entry_across_lots() {
        // Two lots at 100 and 110; close consumes all of the first and
        // half of the second: entry = (100*1 + 110*1) / 2.
        let trades = vec![
            trade("o1", OrderAction::OpenLong, 100.0, 1.0, 0.0, 1.0, 1000),
            trade("o2", OrderAction::OpenLong, 110.0, 2.0, 0.0, 2.0, 1500),
            trade("c1", OrderAction::CloseLong, 120.0, 2.0, 30.0, 0.8, 2000),
        ];
        let result = rebuild(&trades);
        assert_eq!(result.closed.len(), 1);
        let r = &result.closed[0];
        let expected_entry = (100.0 * 1.0 + 110.0 * 1.0) / 2.0;
        assert!((r.entry_price - expected_entry).abs() < 1e-9);
        // First lot's full fee, half the second's, plus exit fee.
        assert!((r.fee - (1.0 + 1.0 + 0.8)).abs() < 1e-9);
        assert_eq!(r.entry_time, 1000);

        let book = &result.open_books["ETHUSDT|LONG"];
        assert!((book.total_qty - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_back_solve_on_missing_history() {
        // No opening trade recorded; entry reconstructs from PnL.
        let trades = vec![trade("c1", OrderAction::CloseLong, 3600.0, 0.1, 10.0, 0.5, 2000)];
        let result = rebuild(&trades);
        assert_eq!(result.closed.len(), 1);
        let r = &result.closed[0];
        // entry = exit - pnl/qty = 3600 - 100.
        assert!((r.entry_price - 3500.0).abs() < 1e-9);
        assert_eq!(r.entry_time, 2000);
    }

    #[test]
    fn test_back_solve_short() {
        let trades = vec![trade("c1", OrderAction::CloseShort, 90.0, 2.0, 20.0, 0.2, 2000)];
        let result = rebuild(&trades);
        assert_eq!(result.closed.len(), 1);
        // short: entry = exit + pnl/qty = 90 + 10.
        assert!((result.closed[0].entry_price - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_pnl_conservation() {
        let trades = vec![
            trade("o1", OrderAction::OpenLong, 100.0, 5.0, 0.0, 1.0, 1000),
            trade("c1", OrderAction::CloseLong, 110.0, 2.0, 20.0, 0.4, 2000),
            trade("o2", OrderAction::OpenShort, 200.0, 1.0, 0.0, 0.5, 2500),
            trade("c2", OrderAction::CloseLong, 95.0, 3.0, -15.0, 0.6, 3000),
            trade("c3", OrderAction::CloseShort, 190.0, 1.0, 10.0, 0.3, 3500),
        ];
        let result = rebuild(&trades);
        let input_pnl: f64 = trades.iter().map(|t| t.realized_pnl).sum();
        let output_pnl: f64 = result.closed.iter().map(|r| r.realized_pnl).sum();
        assert!((input_pnl - output_pnl).abs() < 1e-2);
        assert_eq!(result.closed.len(), 3);
    }

    #[test]
    fn test_sorts_by_time_before_matching() {
        // Close arrives before open in the input vector.
        let trades = vec![
            trade("c1", OrderAction::CloseLong, 3600.0, 0.1, 10.0, 0.5, 2000),
            trade("o1", OrderAction::OpenLong, 3500.0, 0.1, 0.0, 0.5, 1000),
        ];
        let result = rebuild(&trades);
        assert_eq!(result.closed.len(), 1);
        assert!((result.closed[0].entry_price - 3500.0).abs() < 1e-9);
        assert_eq!(result.closed[0].entry_time, 1000);
    }

    #[test]
    fn test_invalid_close_dropped() {
        // Zero exit price cannot form a valid record.
        let trades = vec![trade("c1", OrderAction::CloseLong, 0.0, 1.0, 5.0, 0.1, 1000)];
        let result = rebuild(&trades);
        assert!(result.closed.is_empty());
    }

    #[test]
    fn test_independent_books() {
        let trades = vec![
            trade("o1", OrderAction::OpenLong, 100.0, 1.0, 0.0, 0.1, 1000),
            trade("o2", OrderAction::OpenShort, 100.0, 2.0, 0.0, 0.2, 1100),
            trade("c1", OrderAction::CloseShort, 95.0, 2.0, 10.0, 0.2, 2000),
        ];
        let result = rebuild(&trades);
        assert_eq!(result.closed.len(), 1);
        assert_eq!(result.closed[0].side, PositionSide::Short);
        // The long book is untouched.
        assert!((result.open_books["ETHUSDT|LONG"].total_qty - 1.0).abs() < 1e-9);
        assert!(result.open_books["ETHUSDT|SHORT"].total_qty.abs() < QTY_EPSILON);
    }
}
