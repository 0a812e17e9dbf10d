//! Decision executor
//!
//! Validates and executes a single decision against the venue driver. The
//! risk gates here are code-enforced and never delegated to the decision
//! producer: whatever the producer asks for is clamped or rejected before
//! an order leaves the process.

use crate::config::TraderConfig;
use crate::constants::{AFFORDABILITY_BUFFER, ORDER_POLL_ATTEMPTS, ORDER_POLL_INTERVAL};
use crate::error::ExecError;
use crate::model::types::{OrderAction, OrderStatus, PositionSide};
use crate::model::{Decision, DecisionOutcome, OrderResult, TraderFill, TraderOrder};
use crate::producer::DecisionRecord;
use crate::store::{PositionBuilder, Store};
use crate::telemetry::{TelemetryHook, TradeEvent};
use crate::venue::VenueDriver;
use crate::venue::http::now_millis;
use std::sync::Arc;
use tracing::{info, warn};

/// Snapshot of account state fed into the gates
#[derive(Debug, Clone, Copy)]
pub struct GateInputs {
    /// Total equity, USDT
    pub equity: f64,
    /// Free balance, USDT
    pub available_balance: f64,
    /// Currently open positions
    pub open_position_count: usize,
    /// An open position already exists for `(symbol, side)`
    pub has_same_side_position: bool,
}

/// Apply the open-action risk gates, mutating the requested size.
///
/// Clamps are silent; only the capacity, pyramiding, and minimum-size
/// gates reject. Returns the human-readable rejection reason.
pub fn apply_risk_gates(
    config: &TraderConfig,
    decision: &mut Decision,
    inputs: &GateInputs,
) -> Result<(), String> {
    if inputs.open_position_count >= config.max_positions {
        return Err(format!(
            "max positions reached ({}/{})",
            inputs.open_position_count, config.max_positions
        ));
    }
    if inputs.has_same_side_position {
        return Err(format!(
            "{} already has an open {} position",
            decision.symbol,
            decision.action.position_side().map(|s| s.label()).unwrap_or("?")
        ));
    }

    // Position-value ratio cap, by symbol class.
    let ratio_cap = inputs.equity * config.position_ratio(&decision.symbol);
    if decision.position_size_usd > ratio_cap {
        decision.position_size_usd = ratio_cap;
    }

    // Affordability: initial margin plus fee buffer must fit free balance.
    let margin_factor = 1.01 / decision.leverage.max(1) as f64 + 0.001;
    let affordable = inputs.available_balance / margin_factor * AFFORDABILITY_BUFFER;
    if decision.position_size_usd > affordable {
        decision.position_size_usd = affordable;
    }

    if decision.position_size_usd < config.min_position_size {
        return Err(format!(
            "position size {:.2} below minimum {:.2} after clamps",
            decision.position_size_usd, config.min_position_size
        ));
    }
    Ok(())
}

/// Executes decisions for one trader
pub struct DecisionExecutor {
    config: TraderConfig,
    driver: Arc<dyn VenueDriver>,
    store: Arc<dyn Store>,
    builder: PositionBuilder,
    telemetry: TelemetryHook,
}

impl DecisionExecutor {
    /// Executor bound to a trader's driver and store
    pub fn new(
        config: TraderConfig,
        driver: Arc<dyn VenueDriver>,
        store: Arc<dyn Store>,
        telemetry: TelemetryHook,
    ) -> Self {
        let builder = PositionBuilder::new(
            config.trader_id.clone(),
            driver.venue(),
            store.clone(),
        );
        Self {
            config,
            driver,
            store,
            builder,
            telemetry,
        }
    }

    /// Execute one decision, recording the outcome on the cycle record.
    pub async fn execute(&self, mut decision: Decision, record: &mut DecisionRecord) -> DecisionOutcome {
        let executed_at = now_millis();
        let result = match decision.action {
            OrderAction::Hold | OrderAction::Wait => {
                record.log(format!("{}: {}", decision.symbol, decision.action.as_str()));
                Ok(None)
            }
            OrderAction::OpenLong | OrderAction::OpenShort => {
                self.execute_open(&mut decision, record).await.map(Some)
            }
            OrderAction::CloseLong | OrderAction::CloseShort => {
                self.execute_close(&decision, record).await.map(Some)
            }
        };

        match result {
            Ok(order) => DecisionOutcome {
                order_id: order.map(|o| o.order_id),
                decision,
                success: true,
                error: None,
                executed_at,
            },
            Err(e) => {
                let message = e.to_string();
                warn!("decision on {} failed: {}", decision.symbol, message);
                record.log(format!("{}: FAILED: {}", decision.symbol, message));
                DecisionOutcome {
                    decision,
                    success: false,
                    order_id: None,
                    error: Some(message),
                    executed_at,
                }
            }
        }
    }

    async fn execute_open(
        &self,
        decision: &mut Decision,
        record: &mut DecisionRecord,
    ) -> Result<OrderResult, ExecError> {
        decision.validate().map_err(ExecError::Producer)?;
        let side = decision.action.position_side().unwrap_or(PositionSide::Long);

        let balance = self.driver.get_balance().await?;
        let positions = self.driver.get_positions().await?;
        let inputs = GateInputs {
            equity: balance.total_equity,
            available_balance: balance.available_balance,
            open_position_count: positions.len(),
            has_same_side_position: positions
                .iter()
                .any(|p| p.symbol == decision.symbol && p.side == side),
        };
        let requested = decision.position_size_usd;
        apply_risk_gates(&self.config, decision, &inputs).map_err(ExecError::Producer)?;
        if (requested - decision.position_size_usd).abs() > 0.01 {
            record.log(format!(
                "{}: size clamped {:.2} -> {:.2} USDT",
                decision.symbol, requested, decision.position_size_usd
            ));
        }

        let price = self.driver.get_market_price(&decision.symbol).await?;
        let qty = decision.position_size_usd / price;

        let result = match decision.action {
            OrderAction::OpenShort => {
                self.driver
                    .open_short(&decision.symbol, qty, decision.leverage)
                    .await?
            }
            _ => {
                self.driver
                    .open_long(&decision.symbol, qty, decision.leverage)
                    .await?
            }
        };
        info!(
            "{} {} {:.2} USDT @ {} -> order {}",
            decision.action.as_str(),
            decision.symbol,
            decision.position_size_usd,
            price,
            result.order_id
        );
        record.log(format!(
            "{}: {} {:.2} USDT, order {}",
            decision.symbol,
            decision.action.as_str(),
            decision.position_size_usd,
            result.order_id
        ));

        // Protective orders are best-effort; the position is already on.
        if decision.stop_loss > 0.0 {
            if let Err(e) = self
                .driver
                .set_stop_loss(&decision.symbol, side, qty, decision.stop_loss)
                .await
            {
                warn!("stop-loss on {} failed: {}", decision.symbol, e);
                record.log(format!("{}: stop-loss failed: {}", decision.symbol, e));
            }
        }
        if decision.take_profit > 0.0 {
            if let Err(e) = self
                .driver
                .set_take_profit(&decision.symbol, side, qty, decision.take_profit)
                .await
            {
                warn!("take-profit on {} failed: {}", decision.symbol, e);
                record.log(format!("{}: take-profit failed: {}", decision.symbol, e));
            }
        }

        self.record_order(decision, &result, side, None).await;
        Ok(result)
    }

    async fn execute_close(
        &self,
        decision: &Decision,
        record: &mut DecisionRecord,
    ) -> Result<OrderResult, ExecError> {
        let side = decision.action.position_side().unwrap_or(PositionSide::Long);

        // Local row first: its quantity tracks our own fills exactly.
        // The venue is the fallback when the store has nothing.
        let local_qty = self
            .store
            .get_open_position_by_symbol(&self.config.trader_id, &decision.symbol, side)
            .ok()
            .flatten()
            .map(|p| p.quantity)
            .unwrap_or(0.0);
        let entry_price = self
            .store
            .get_open_position_by_symbol(&self.config.trader_id, &decision.symbol, side)
            .ok()
            .flatten()
            .map(|p| p.entry_price);

        let result = match decision.action {
            OrderAction::CloseShort => self.driver.close_short(&decision.symbol, local_qty).await?,
            _ => self.driver.close_long(&decision.symbol, local_qty).await?,
        };

        if result.status == OrderStatus::NoPosition {
            info!("{} close: no position open", decision.symbol);
            record.log(format!("{}: no position to close", decision.symbol));
            return Ok(result);
        }
        record.log(format!(
            "{}: {} qty {}, order {}",
            decision.symbol,
            decision.action.as_str(),
            result.quantity,
            result.order_id
        ));

        self.record_order(decision, &result, side, entry_price).await;
        Ok(result)
    }

    /// Record the order locally. Venues with a sync worker reconcile in the
    /// background; the rest are polled until the fill lands.
    async fn record_order(
        &self,
        decision: &Decision,
        result: &OrderResult,
        side: PositionSide,
        entry_price: Option<f64>,
    ) {
        let venue = self.driver.venue();
        let trade_side = match (decision.action, side) {
            (OrderAction::OpenLong, _) | (OrderAction::CloseShort, _) => {
                crate::model::TradeSide::Buy
            }
            _ => crate::model::TradeSide::Sell,
        };
        let order = TraderOrder {
            trader_id: self.config.trader_id.clone(),
            exchange_id: venue,
            order_id: result.order_id.clone(),
            symbol: decision.symbol.clone(),
            side: trade_side,
            position_side: side,
            order_action: decision.action,
            status: result.status,
            avg_fill_price: result.avg_price,
            executed_qty: 0.0,
            commission: 0.0,
            created_at: now_millis(),
        };
        if let Err(e) = self.store.insert_order(order) {
            warn!("recording order {} failed: {}", result.order_id, e);
        }

        if venue.has_sync_worker() {
            // The sync worker reconciles the fill; the event goes out now.
            self.telemetry.emit(TradeEvent {
                trader_id: self.config.trader_id.clone(),
                exchange_id: venue,
                symbol: decision.symbol.clone(),
                action: decision.action,
                quantity: result.quantity,
                price: result.avg_price,
                time: now_millis(),
            });
            return;
        }
        self.poll_and_record_fill(decision, result, side, entry_price)
            .await;
    }

    /// Poll order status and materialize the fill for venues the sync
    /// worker does not cover.
    async fn poll_and_record_fill(
        &self,
        decision: &Decision,
        result: &OrderResult,
        side: PositionSide,
        entry_price: Option<f64>,
    ) {
        let venue = self.driver.venue();
        for _ in 0..ORDER_POLL_ATTEMPTS {
            tokio::time::sleep(ORDER_POLL_INTERVAL).await;
            let status = match self
                .driver
                .get_order_status(&decision.symbol, &result.order_id)
                .await
            {
                Ok(s) => s,
                Err(e) => {
                    warn!("status poll for {} failed: {}", result.order_id, e);
                    continue;
                }
            };
            if !status.status.is_terminal() {
                continue;
            }
            if status.status != OrderStatus::Filled || status.executed_qty <= 0.0 {
                return;
            }

            if let Err(e) = self.store.update_order_fill(
                venue,
                &result.order_id,
                status.avg_price,
                status.executed_qty,
                status.commission,
            ) {
                warn!("updating order {} failed: {}", result.order_id, e);
            }

            // Closes realize PnL against the recorded entry.
            let realized_pnl = match (decision.action.is_close(), entry_price) {
                (true, Some(entry)) => match side {
                    PositionSide::Short => (entry - status.avg_price) * status.executed_qty,
                    _ => (status.avg_price - entry) * status.executed_qty,
                },
                _ => 0.0,
            };

            let trade = crate::model::TradeRecord {
                trade_id: format!("{}_{}", result.order_id, venue.as_str()),
                symbol: decision.symbol.clone(),
                side: match (decision.action, side) {
                    (OrderAction::OpenLong, _) | (OrderAction::CloseShort, _) => {
                        crate::model::TradeSide::Buy
                    }
                    _ => crate::model::TradeSide::Sell,
                },
                position_side: side,
                order_action: decision.action,
                price: status.avg_price,
                quantity: status.executed_qty,
                realized_pnl,
                fee: status.commission,
                time: now_millis(),
            };
            if let Err(e) = self.store.insert_fill(TraderFill {
                trader_id: self.config.trader_id.clone(),
                exchange_id: venue,
                trade_id: trade.trade_id.clone(),
                order_id: result.order_id.clone(),
                symbol: trade.symbol.clone(),
                side: trade.side,
                price: trade.price,
                quantity: trade.quantity,
                realized_pnl,
                fee: trade.fee,
                time: trade.time,
            }) {
                warn!("recording fill for {} failed: {}", result.order_id, e);
            }
            if let Err(e) = self.builder.process_trade(&trade) {
                warn!("position build for {} failed: {}", result.order_id, e);
            }
            self.telemetry.emit(TradeEvent {
                trader_id: self.config.trader_id.clone(),
                exchange_id: venue,
                symbol: trade.symbol.clone(),
                action: decision.action,
                quantity: trade.quantity,
                price: trade.price,
                time: trade.time,
            });
            return;
        }
        warn!("order {} never reached a terminal state", result.order_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::VenueKind;

    fn config() -> TraderConfig {
        TraderConfig::new("t1", VenueKind::Binance)
    }

    fn open_decision(symbol: &str, size: f64, leverage: u32) -> Decision {
        Decision {
            symbol: symbol.into(),
            action: OrderAction::OpenLong,
            leverage,
            position_size_usd: size,
            stop_loss: 0.0,
            take_profit: 0.0,
            confidence: 60.0,
            reasoning: String::new(),
        }
    }

    fn inputs(equity: f64, available: f64) -> GateInputs {
        GateInputs {
            equity,
            available_balance: available,
            open_position_count: 0,
            has_same_side_position: false,
        }
    }

    #[test]
    fn test_max_positions_gate() {
        let cfg = config();
        let mut d = open_decision("BTCUSDT", 100.0, 10);
        let mut i = inputs(1000.0, 1000.0);
        i.open_position_count = cfg.max_positions;
        assert!(apply_risk_gates(&cfg, &mut d, &i).is_err());
    }

    #[test]
    fn test_no_pyramiding_gate() {
        let cfg = config();
        let mut d = open_decision("BTCUSDT", 100.0, 10);
        let mut i = inputs(1000.0, 1000.0);
        i.has_same_side_position = true;
        assert!(apply_risk_gates(&cfg, &mut d, &i).is_err());
    }

    #[test]
    fn test_ratio_clamp_btc() {
        // Scenario: equity 1000, requested 8000 on BTC (ratio 5x) clamps
        // to 5000 and affordability does not bind at leverage 10.
        let cfg = config();
        let mut d = open_decision("BTCUSDT", 8000.0, 10);
        let i = inputs(1000.0, 1000.0);
        apply_risk_gates(&cfg, &mut d, &i).unwrap();
        // affordability cap: 1000 / (1.01/10 + 0.001) * 0.98 ~ 9607 > 5000.
        assert!((d.position_size_usd - 5000.0).abs() < 0.01);
    }

    #[test]
    fn test_altcoin_ratio_clamp() {
        let cfg = config();
        let mut d = open_decision("SOLUSDT", 8000.0, 10);
        let i = inputs(1000.0, 1000.0);
        apply_risk_gates(&cfg, &mut d, &i).unwrap();
        assert!((d.position_size_usd - 1000.0).abs() < 0.01);
    }

    #[test]
    fn test_affordability_clamp() {
        let cfg = config();
        let mut d = open_decision("BTCUSDT", 4000.0, 2);
        // margin factor at 2x: 1.01/2 + 0.001 = 0.506.
        let i = inputs(10_000.0, 1000.0);
        apply_risk_gates(&cfg, &mut d, &i).unwrap();
        let expected = 1000.0 / 0.506 * 0.98;
        assert!((d.position_size_usd - expected).abs() < 0.01);
    }

    #[test]
    fn test_min_size_reject_after_clamps() {
        let cfg = config();
        let mut d = open_decision("SOLUSDT", 100.0, 10);
        // Tiny balance clamps below the 12 USDT floor.
        let i = inputs(10.0, 5.0);
        assert!(apply_risk_gates(&cfg, &mut d, &i).is_err());
    }

    #[test]
    fn test_accepted_size_respects_both_caps() {
        let cfg = config();
        for leverage in [2u32, 5, 10, 20] {
            for requested in [50.0, 500.0, 5_000.0, 50_000.0] {
                let mut d = open_decision("ETHUSDT", requested, leverage);
                let i = inputs(2_000.0, 1_500.0);
                if apply_risk_gates(&cfg, &mut d, &i).is_ok() {
                    let margin_factor = 1.01 / leverage as f64 + 0.001;
                    let cap = (i.equity * cfg.position_ratio("ETHUSDT"))
                        .min(i.available_balance / margin_factor * AFFORDABILITY_BUFFER);
                    assert!(d.position_size_usd <= cap + 1e-6);
                    assert!(d.position_size_usd >= cfg.min_position_size);
                }
            }
        }
    }
}
