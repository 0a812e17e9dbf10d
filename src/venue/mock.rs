//! Scriptable in-memory venue for unit tests

use crate::error::ExecError;
use crate::model::{
    AccountBalance, ClosedPnlRecord, OrderResult, OrderStatus, OrderStatusInfo, PendingOrder,
    PositionSide, TradeRecord, VenueKind, VenuePosition,
};
use crate::venue::VenueDriver;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Scripted driver: tests set balances, positions, prices, and trade
/// streams, and inspect the calls the core made.
pub struct MockVenue {
    venue: VenueKind,
    balance: Mutex<AccountBalance>,
    positions: Mutex<Vec<VenuePosition>>,
    prices: Mutex<HashMap<String, f64>>,
    trades: Mutex<Vec<TradeRecord>>,
    open_calls: Mutex<Vec<(String, f64, u32, PositionSide)>>,
    close_calls: Mutex<Vec<(String, f64, PositionSide)>>,
    next_order_id: Mutex<u64>,
    fail_orders: Mutex<bool>,
}

impl MockVenue {
    /// Fresh mock with a healthy default balance
    pub fn new(venue: VenueKind) -> Self {
        Self {
            venue,
            balance: Mutex::new(AccountBalance {
                total_equity: 10_000.0,
                total_wallet_balance: 10_000.0,
                available_balance: 10_000.0,
                total_unrealized_profit: 0.0,
            }),
            positions: Mutex::new(Vec::new()),
            prices: Mutex::new(HashMap::new()),
            trades: Mutex::new(Vec::new()),
            open_calls: Mutex::new(Vec::new()),
            close_calls: Mutex::new(Vec::new()),
            next_order_id: Mutex::new(1),
            fail_orders: Mutex::new(false),
        }
    }

    /// Script the balance
    pub async fn set_balance(&self, balance: AccountBalance) {
        *self.balance.lock().await = balance;
    }

    /// Script open positions
    pub async fn set_positions(&self, positions: Vec<VenuePosition>) {
        *self.positions.lock().await = positions;
    }

    /// Script a market price
    pub async fn set_price(&self, symbol: &str, price: f64) {
        self.prices.lock().await.insert(symbol.to_string(), price);
    }

    /// Script the trade history
    pub async fn set_trades(&self, trades: Vec<TradeRecord>) {
        *self.trades.lock().await = trades;
    }

    /// Make order placement fail
    pub async fn fail_orders(&self, fail: bool) {
        *self.fail_orders.lock().await = fail;
    }

    /// How many closes were issued
    pub async fn close_calls(&self) -> usize {
        self.close_calls.lock().await.len()
    }

    /// All close calls `(symbol, qty, side)`
    pub async fn close_call_details(&self) -> Vec<(String, f64, PositionSide)> {
        self.close_calls.lock().await.clone()
    }

    /// How many opens were issued
    pub async fn open_calls(&self) -> usize {
        self.open_calls.lock().await.len()
    }

    /// All open calls `(symbol, qty, leverage, side)`
    pub async fn open_call_details(&self) -> Vec<(String, f64, u32, PositionSide)> {
        self.open_calls.lock().await.clone()
    }

    async fn next_id(&self) -> String {
        let mut id = self.next_order_id.lock().await;
        *id += 1;
        format!("mock-{}", *id - 1)
    }

    async fn order_result(&self, symbol: &str, qty: f64) -> Result<OrderResult, ExecError> {
        if *self.fail_orders.lock().await {
            return Err(ExecError::Venue {
                code: "-2019".into(),
                message: "Margin is insufficient.".into(),
            });
        }
        Ok(OrderResult {
            order_id: self.next_id().await,
            symbol: symbol.to_string(),
            status: OrderStatus::Filled,
            quantity: qty,
            avg_price: self
                .prices
                .lock()
                .await
                .get(symbol)
                .copied()
                .unwrap_or(100.0),
        })
    }
}

#[async_trait]
impl VenueDriver for MockVenue {
    fn venue(&self) -> VenueKind {
        self.venue
    }

    async fn get_balance(&self) -> Result<AccountBalance, ExecError> {
        Ok(self.balance.lock().await.clone())
    }

    async fn get_positions(&self) -> Result<Vec<VenuePosition>, ExecError> {
        Ok(self.positions.lock().await.clone())
    }

    async fn open_long(
        &self,
        symbol: &str,
        qty: f64,
        leverage: u32,
    ) -> Result<OrderResult, ExecError> {
        let result = self.order_result(symbol, qty).await?;
        self.open_calls
            .lock()
            .await
            .push((symbol.to_string(), qty, leverage, PositionSide::Long));
        Ok(result)
    }

    async fn open_short(
        &self,
        symbol: &str,
        qty: f64,
        leverage: u32,
    ) -> Result<OrderResult, ExecError> {
        let result = self.order_result(symbol, qty).await?;
        self.open_calls
            .lock()
            .await
            .push((symbol.to_string(), qty, leverage, PositionSide::Short));
        Ok(result)
    }

    async fn close_long(&self, symbol: &str, qty: f64) -> Result<OrderResult, ExecError> {
        let mut qty = qty;
        if qty <= 0.0 {
            qty = self
                .positions
                .lock()
                .await
                .iter()
                .find(|p| p.symbol == symbol && p.side == PositionSide::Long)
                .map(|p| p.position_amt)
                .unwrap_or(0.0);
        }
        if qty <= 0.0 {
            return Ok(OrderResult::no_position(symbol));
        }
        let result = self.order_result(symbol, qty).await?;
        self.close_calls
            .lock()
            .await
            .push((symbol.to_string(), qty, PositionSide::Long));
        Ok(result)
    }

    async fn close_short(&self, symbol: &str, qty: f64) -> Result<OrderResult, ExecError> {
        let mut qty = qty;
        if qty <= 0.0 {
            qty = self
                .positions
                .lock()
                .await
                .iter()
                .find(|p| p.symbol == symbol && p.side == PositionSide::Short)
                .map(|p| p.position_amt)
                .unwrap_or(0.0);
        }
        if qty <= 0.0 {
            return Ok(OrderResult::no_position(symbol));
        }
        let result = self.order_result(symbol, qty).await?;
        self.close_calls
            .lock()
            .await
            .push((symbol.to_string(), qty, PositionSide::Short));
        Ok(result)
    }

    async fn set_leverage(&self, _symbol: &str, _leverage: u32) -> Result<(), ExecError> {
        Ok(())
    }

    async fn set_margin_mode(&self, _symbol: &str, _is_cross: bool) -> Result<(), ExecError> {
        Ok(())
    }

    async fn get_market_price(&self, symbol: &str) -> Result<f64, ExecError> {
        self.prices
            .lock()
            .await
            .get(symbol)
            .copied()
            .ok_or_else(|| ExecError::UnknownSymbol(symbol.to_string()))
    }

    async fn set_stop_loss(
        &self,
        _symbol: &str,
        _side: PositionSide,
        _qty: f64,
        _trigger: f64,
    ) -> Result<(), ExecError> {
        Ok(())
    }

    async fn set_take_profit(
        &self,
        _symbol: &str,
        _side: PositionSide,
        _qty: f64,
        _trigger: f64,
    ) -> Result<(), ExecError> {
        Ok(())
    }

    async fn cancel_stop_orders(&self, _symbol: &str) -> Result<(), ExecError> {
        Ok(())
    }

    async fn cancel_all_orders(&self, _symbol: &str) -> Result<(), ExecError> {
        Ok(())
    }

    async fn format_quantity(&self, _symbol: &str, qty: f64) -> Result<String, ExecError> {
        Ok(format!("{qty}"))
    }

    async fn get_order_status(
        &self,
        _symbol: &str,
        order_id: &str,
    ) -> Result<OrderStatusInfo, ExecError> {
        Ok(OrderStatusInfo {
            order_id: order_id.to_string(),
            status: OrderStatus::Filled,
            avg_price: 100.0,
            executed_qty: 1.0,
            commission: 0.1,
        })
    }

    async fn get_trades(
        &self,
        start_time: i64,
        _limit: u32,
    ) -> Result<Vec<TradeRecord>, ExecError> {
        Ok(self
            .trades
            .lock()
            .await
            .iter()
            .filter(|t| t.time >= start_time)
            .cloned()
            .collect())
    }

    async fn get_closed_pnl(
        &self,
        _start_time: i64,
        _limit: u32,
    ) -> Result<Vec<ClosedPnlRecord>, ExecError> {
        Ok(Vec::new())
    }

    async fn get_open_orders(&self, _symbol: &str) -> Result<Vec<PendingOrder>, ExecError> {
        Ok(Vec::new())
    }

    fn trade_limit(&self) -> u32 {
        1000
    }
}
