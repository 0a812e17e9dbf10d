//! Shared scriptable stand-ins for the lifecycle and execution suites

use async_trait::async_trait;
use perp_exec::error::ExecError;
use perp_exec::model::context::TradingContext;
use perp_exec::model::{
    AccountBalance, ClosedPnlRecord, Decision, OrderResult, OrderStatus, OrderStatusInfo,
    PendingOrder, PositionSide, TradeRecord, VenueKind, VenuePosition,
};
use perp_exec::producer::{DecisionProducer, ProducerResponse};
use perp_exec::strategy::{CoinInfo, StrategyConfig, StrategyEngine};
use perp_exec::venue::VenueDriver;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Scriptable venue driver shared by the non-mockito suites
pub struct ScriptedVenue {
    venue: VenueKind,
    pub balance: Mutex<AccountBalance>,
    pub positions: Mutex<Vec<VenuePosition>>,
    pub prices: Mutex<HashMap<String, f64>>,
    pub trades: Mutex<Vec<TradeRecord>>,
    open_calls: Mutex<Vec<(String, f64, u32)>>,
    close_calls: Mutex<Vec<(String, f64, PositionSide)>>,
    orders_placed: AtomicUsize,
    next_id: AtomicUsize,
}

impl ScriptedVenue {
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
            prices: Mutex::new(HashMap::from([("BTCUSDT".to_string(), 50_000.0)])),
            trades: Mutex::new(Vec::new()),
            open_calls: Mutex::new(Vec::new()),
            close_calls: Mutex::new(Vec::new()),
            orders_placed: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
        }
    }

    /// Orders placed so far (opens and closes)
    pub fn orders_placed(&self) -> usize {
        self.orders_placed.load(Ordering::SeqCst)
    }

    /// Every open call as `(symbol, qty, leverage)`
    pub async fn open_call_details(&self) -> Vec<(String, f64, u32)> {
        self.open_calls.lock().await.clone()
    }

    /// Every close call as `(symbol, qty, side)`
    pub async fn close_call_details(&self) -> Vec<(String, f64, PositionSide)> {
        self.close_calls.lock().await.clone()
    }

    fn place(&self, symbol: &str, qty: f64) -> OrderResult {
        self.orders_placed.fetch_add(1, Ordering::SeqCst);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        OrderResult {
            order_id: format!("scripted-{id}"),
            symbol: symbol.to_string(),
            status: OrderStatus::Filled,
            quantity: qty,
            avg_price: 0.0,
        }
    }
}

#[async_trait]
impl VenueDriver for ScriptedVenue {
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
        self.open_calls
            .lock()
            .await
            .push((symbol.to_string(), qty, leverage));
        Ok(self.place(symbol, qty))
    }

    async fn open_short(
        &self,
        symbol: &str,
        qty: f64,
        leverage: u32,
    ) -> Result<OrderResult, ExecError> {
        self.open_calls
            .lock()
            .await
            .push((symbol.to_string(), qty, leverage));
        Ok(self.place(symbol, qty))
    }

    async fn close_long(&self, symbol: &str, qty: f64) -> Result<OrderResult, ExecError> {
        let open = self
            .positions
            .lock()
            .await
            .iter()
            .find(|p| p.symbol == symbol && p.side == PositionSide::Long)
            .map(|p| p.position_amt)
            .unwrap_or(0.0);
        let qty = if qty > 0.0 { qty } else { open };
        if qty <= 0.0 {
            return Ok(OrderResult::no_position(symbol));
        }
        self.close_calls
            .lock()
            .await
            .push((symbol.to_string(), qty, PositionSide::Long));
        Ok(self.place(symbol, qty))
    }

    async fn close_short(&self, symbol: &str, qty: f64) -> Result<OrderResult, ExecError> {
        let open = self
            .positions
            .lock()
            .await
            .iter()
            .find(|p| p.symbol == symbol && p.side == PositionSide::Short)
            .map(|p| p.position_amt)
            .unwrap_or(0.0);
        let qty = if qty > 0.0 { qty } else { open };
        if qty <= 0.0 {
            return Ok(OrderResult::no_position(symbol));
        }
        self.close_calls
            .lock()
            .await
            .push((symbol.to_string(), qty, PositionSide::Short));
        Ok(self.place(symbol, qty))
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
            avg_price: 50_000.0,
            executed_qty: 0.1,
            commission: 0.05,
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

/// Producer that hands out a fixed decision list every cycle
pub struct FixedProducer {
    pub decisions: Vec<Decision>,
    pub calls: AtomicUsize,
}

impl FixedProducer {
    pub fn new(decisions: Vec<Decision>) -> Self {
        Self {
            decisions,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionProducer for FixedProducer {
    async fn get_full_decision(
        &self,
        _context: &TradingContext,
        _strategy_prompt: &str,
        _bias: &str,
    ) -> Result<ProducerResponse, ExecError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProducerResponse {
            system_prompt: "system".into(),
            user_prompt: "user".into(),
            cot_trace: String::new(),
            raw_response: "[]".into(),
            decisions: self.decisions.clone(),
            ai_request_duration_ms: 5,
        })
    }
}

/// Strategy engine with a static candidate list
pub struct StaticStrategy;

#[async_trait]
impl StrategyEngine for StaticStrategy {
    async fn get_candidate_coins(&self) -> Result<Vec<CoinInfo>, ExecError> {
        Ok(vec![CoinInfo {
            symbol: "BTCUSDT".into(),
            reason: "static".into(),
        }])
    }

    fn get_config(&self) -> StrategyConfig {
        StrategyConfig::default()
    }

    async fn fetch_quant_data_batch(
        &self,
        _symbols: &[String],
    ) -> Result<HashMap<String, serde_json::Value>, ExecError> {
        Ok(HashMap::new())
    }

    async fn fetch_oi_ranking(&self) -> Result<Vec<CoinInfo>, ExecError> {
        Ok(Vec::new())
    }

    async fn fetch_net_flow_ranking(&self) -> Result<Vec<CoinInfo>, ExecError> {
        Ok(Vec::new())
    }

    async fn fetch_price_ranking(&self) -> Result<Vec<CoinInfo>, ExecError> {
        Ok(Vec::new())
    }
}
