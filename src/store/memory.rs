//! In-memory store
//!
//! Backs tests and embedded runs. Every table is a map under one RwLock
//! per table, so each operation is atomic on its own, matching the
//! concurrency contract of the trait.

use crate::error::ExecError;
use crate::model::{ClosedPnlRecord, EquitySnapshot, OpenPosition, PositionSide, PositionStatus,
    TraderFill, TraderOrder, VenueKind};
use crate::producer::DecisionRecord;
use crate::store::{FullStats, Store, stats_of};
use std::collections::HashMap;
use std::sync::RwLock;

/// Map-backed store
#[derive(Default)]
pub struct MemoryStore {
    orders: RwLock<HashMap<(VenueKind, String), TraderOrder>>,
    fills: RwLock<HashMap<(VenueKind, String), TraderFill>>,
    open_positions: RwLock<HashMap<(String, String, PositionSide), OpenPosition>>,
    closed_positions: RwLock<HashMap<String, Vec<ClosedPnlRecord>>>,
    decisions: RwLock<HashMap<String, Vec<DecisionRecord>>>,
    equity: RwLock<Vec<EquitySnapshot>>,
    initial_balances: RwLock<HashMap<String, f64>>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded fills (test helper)
    pub fn fill_count(&self) -> usize {
        self.fills.read().unwrap().len()
    }

    /// All equity snapshots, in insertion order (test helper)
    pub fn equity_snapshots(&self) -> Vec<EquitySnapshot> {
        self.equity.read().unwrap().clone()
    }

    /// All decision records for a trader (test helper)
    pub fn decision_records(&self, trader_id: &str) -> Vec<DecisionRecord> {
        self.decisions
            .read()
            .unwrap()
            .get(trader_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl Store for MemoryStore {
    fn insert_order(&self, order: TraderOrder) -> Result<(), ExecError> {
        self.orders
            .write()
            .unwrap()
            .insert((order.exchange_id, order.order_id.clone()), order);
        Ok(())
    }

    fn update_order_fill(
        &self,
        exchange_id: VenueKind,
        order_id: &str,
        avg_fill_price: f64,
        executed_qty: f64,
        commission: f64,
    ) -> Result<(), ExecError> {
        let mut orders = self.orders.write().unwrap();
        if let Some(order) = orders.get_mut(&(exchange_id, order_id.to_string())) {
            order.avg_fill_price = avg_fill_price;
            order.executed_qty = executed_qty;
            order.commission = commission;
        }
        Ok(())
    }

    fn get_order(
        &self,
        exchange_id: VenueKind,
        order_id: &str,
    ) -> Result<Option<TraderOrder>, ExecError> {
        Ok(self
            .orders
            .read()
            .unwrap()
            .get(&(exchange_id, order_id.to_string()))
            .cloned())
    }

    fn insert_fill(&self, fill: TraderFill) -> Result<bool, ExecError> {
        let mut fills = self.fills.write().unwrap();
        let key = (fill.exchange_id, fill.trade_id.clone());
        if fills.contains_key(&key) {
            return Ok(false);
        }
        fills.insert(key, fill);
        Ok(true)
    }

    fn has_fill(&self, exchange_id: VenueKind, trade_id: &str) -> Result<bool, ExecError> {
        Ok(self
            .fills
            .read()
            .unwrap()
            .contains_key(&(exchange_id, trade_id.to_string())))
    }

    fn get_recent_trades(
        &self,
        trader_id: &str,
        limit: usize,
    ) -> Result<Vec<TraderFill>, ExecError> {
        let mut fills: Vec<TraderFill> = self
            .fills
            .read()
            .unwrap()
            .values()
            .filter(|f| f.trader_id == trader_id)
            .cloned()
            .collect();
        fills.sort_by_key(|f| std::cmp::Reverse(f.time));
        fills.truncate(limit);
        Ok(fills)
    }

    fn create_open_position(&self, position: OpenPosition) -> Result<(), ExecError> {
        let key = (
            position.trader_id.clone(),
            position.symbol.clone(),
            position.side,
        );
        self.open_positions.write().unwrap().insert(key, position);
        Ok(())
    }

    fn get_open_position_by_symbol(
        &self,
        trader_id: &str,
        symbol: &str,
        side: PositionSide,
    ) -> Result<Option<OpenPosition>, ExecError> {
        Ok(self
            .open_positions
            .read()
            .unwrap()
            .get(&(trader_id.to_string(), symbol.to_string(), side))
            .filter(|p| p.status == PositionStatus::Open)
            .cloned())
    }

    fn update_open_position(&self, position: OpenPosition) -> Result<(), ExecError> {
        self.create_open_position(position)
    }

    fn delete_all_open_positions(&self, trader_id: &str) -> Result<(), ExecError> {
        self.open_positions
            .write()
            .unwrap()
            .retain(|(t, _, _), _| t != trader_id);
        Ok(())
    }

    fn insert_closed_position(
        &self,
        trader_id: &str,
        record: ClosedPnlRecord,
    ) -> Result<(), ExecError> {
        self.closed_positions
            .write()
            .unwrap()
            .entry(trader_id.to_string())
            .or_default()
            .push(record);
        Ok(())
    }

    fn get_closed_positions(&self, trader_id: &str) -> Result<Vec<ClosedPnlRecord>, ExecError> {
        let mut records = self
            .closed_positions
            .read()
            .unwrap()
            .get(trader_id)
            .cloned()
            .unwrap_or_default();
        records.sort_by_key(|r| r.exit_time);
        Ok(records)
    }

    fn get_full_stats(&self, trader_id: &str) -> Result<FullStats, ExecError> {
        Ok(stats_of(&self.get_closed_positions(trader_id)?))
    }

    fn log_decision(&self, record: DecisionRecord) -> Result<(), ExecError> {
        self.decisions
            .write()
            .unwrap()
            .entry(record.trader_id.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    fn get_last_cycle_number(&self, trader_id: &str) -> Result<u64, ExecError> {
        Ok(self
            .decisions
            .read()
            .unwrap()
            .get(trader_id)
            .and_then(|records| records.iter().map(|r| r.cycle_number).max())
            .unwrap_or(0))
    }

    fn save_equity(&self, snapshot: EquitySnapshot) -> Result<(), ExecError> {
        self.equity.write().unwrap().push(snapshot);
        Ok(())
    }

    fn get_initial_balance(&self, trader_id: &str) -> Result<Option<f64>, ExecError> {
        Ok(self.initial_balances.read().unwrap().get(trader_id).copied())
    }

    fn set_initial_balance(&self, trader_id: &str, balance: f64) -> Result<(), ExecError> {
        self.initial_balances
            .write()
            .unwrap()
            .insert(trader_id.to_string(), balance);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::TradeSide;

    fn fill(trade_id: &str, time: i64) -> TraderFill {
        TraderFill {
            trader_id: "t1".into(),
            exchange_id: VenueKind::Binance,
            trade_id: trade_id.into(),
            order_id: "o1".into(),
            symbol: "BTCUSDT".into(),
            side: TradeSide::Buy,
            price: 50_000.0,
            quantity: 0.1,
            realized_pnl: 0.0,
            fee: 0.5,
            time,
        }
    }

    #[test]
    fn test_fill_dedupe() {
        let store = MemoryStore::new();
        assert!(store.insert_fill(fill("T1", 1)).unwrap());
        assert!(!store.insert_fill(fill("T1", 1)).unwrap());
        assert!(store.insert_fill(fill("T2", 2)).unwrap());
        assert_eq!(store.fill_count(), 2);
        assert!(store.has_fill(VenueKind::Binance, "T1").unwrap());
        assert!(!store.has_fill(VenueKind::Bybit, "T1").unwrap());
    }

    #[test]
    fn test_recent_trades_newest_first() {
        let store = MemoryStore::new();
        store.insert_fill(fill("a", 100)).unwrap();
        store.insert_fill(fill("b", 300)).unwrap();
        store.insert_fill(fill("c", 200)).unwrap();
        let recent = store.get_recent_trades("t1", 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].trade_id, "b");
        assert_eq!(recent[1].trade_id, "c");
    }

    #[test]
    fn test_cycle_number_resume() {
        let store = MemoryStore::new();
        assert_eq!(store.get_last_cycle_number("t1").unwrap(), 0);
        store
            .log_decision(DecisionRecord::new("t1", 7, 1000))
            .unwrap();
        store
            .log_decision(DecisionRecord::new("t1", 9, 2000))
            .unwrap();
        assert_eq!(store.get_last_cycle_number("t1").unwrap(), 9);
    }

    #[test]
    fn test_open_position_identity() {
        let store = MemoryStore::new();
        let pos = OpenPosition {
            trader_id: "t1".into(),
            exchange_id: VenueKind::Binance,
            symbol: "ETHUSDT".into(),
            side: PositionSide::Long,
            quantity: 1.0,
            entry_price: 3000.0,
            entry_order_id: "o1".into(),
            entry_time: 1000,
            leverage: 10,
            is_cross_margin: true,
            status: PositionStatus::Open,
            source: "test".into(),
        };
        store.create_open_position(pos.clone()).unwrap();
        assert!(
            store
                .get_open_position_by_symbol("t1", "ETHUSDT", PositionSide::Long)
                .unwrap()
                .is_some()
        );
        assert!(
            store
                .get_open_position_by_symbol("t1", "ETHUSDT", PositionSide::Short)
                .unwrap()
                .is_none()
        );

        let mut closed = pos;
        closed.status = PositionStatus::Closed;
        store.update_open_position(closed).unwrap();
        assert!(
            store
                .get_open_position_by_symbol("t1", "ETHUSDT", PositionSide::Long)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_stats() {
        let store = MemoryStore::new();
        for (pnl, fee) in [(10.0, 1.0), (-5.0, 1.0), (20.0, 2.0)] {
            store
                .insert_closed_position(
                    "t1",
                    ClosedPnlRecord {
                        symbol: "BTCUSDT".into(),
                        side: PositionSide::Long,
                        entry_price: 100.0,
                        exit_price: 110.0,
                        quantity: 1.0,
                        realized_pnl: pnl,
                        fee,
                        entry_time: 1,
                        exit_time: 2,
                        close_type: crate::model::CloseType::Unknown,
                    },
                )
                .unwrap();
        }
        let stats = store.get_full_stats("t1").unwrap();
        assert_eq!(stats.total_trades, 3);
        assert_eq!(stats.winning_trades, 2);
        assert_eq!(stats.losing_trades, 1);
        assert!((stats.total_pnl - 25.0).abs() < 1e-9);
        assert!((stats.win_rate - 66.666).abs() < 0.01);
        assert!((stats.profit_factor - 6.0).abs() < 1e-9);
    }
}
