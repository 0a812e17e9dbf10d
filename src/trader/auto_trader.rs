//! Automatic trader facade
//!
//! Owns the driver, the shared caches, the stop channel, and the
//! background tasks (sync worker, drawdown monitor, main loop). `run` and
//! `stop` are both idempotent; stopping closes the stop channel exactly
//! once and waits for every task to drain.

use crate::config::TraderConfig;
use crate::error::ExecError;
use crate::model::context::EquitySnapshot;
use crate::model::decision::sort_for_execution;
use crate::monitor::{DrawdownMonitor, PeakPnlCache, peak_key};
use crate::producer::{DecisionProducer, DecisionRecord};
use crate::store::Store;
use crate::strategy::StrategyEngine;
use crate::sync::SyncWorker;
use crate::telemetry::TelemetryHook;
use crate::trader::context::{FirstSeenMap, build_trading_context};
use crate::venue::http::now_millis;
use crate::venue::{VenueDriver, build_driver};
use crate::executor::DecisionExecutor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const DAILY_RESET: i64 = 24 * 3600 * 1000;

/// Composed automatic trader
pub struct AutoTrader {
    config: TraderConfig,
    driver: Arc<dyn VenueDriver>,
    store: Arc<dyn Store>,
    strategy: Arc<dyn StrategyEngine>,
    producer: Arc<dyn DecisionProducer>,
    executor: DecisionExecutor,
    peak_cache: PeakPnlCache,
    first_seen: FirstSeenMap,
    running: Mutex<bool>,
    stop_tx: Mutex<Option<watch::Sender<bool>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    cycle_number: AtomicU64,
    call_count: AtomicU64,
    start_time: i64,
    last_reset_time: Mutex<i64>,
    daily_pnl: Mutex<f64>,
    stop_until: Mutex<i64>,
}

impl AutoTrader {
    /// Construct with the venue driver built from config.
    ///
    /// Fails fast on unusable credentials or an account with no balance;
    /// no background work starts when construction fails.
    pub async fn new(
        config: TraderConfig,
        store: Arc<dyn Store>,
        strategy: Arc<dyn StrategyEngine>,
        producer: Arc<dyn DecisionProducer>,
        telemetry: TelemetryHook,
    ) -> Result<Arc<Self>, ExecError> {
        let driver = build_driver(&config).await?;
        Self::with_driver(config, driver, store, strategy, producer, telemetry).await
    }

    /// Construct around an existing driver (tests inject mocks here).
    pub async fn with_driver(
        config: TraderConfig,
        driver: Arc<dyn VenueDriver>,
        store: Arc<dyn Store>,
        strategy: Arc<dyn StrategyEngine>,
        producer: Arc<dyn DecisionProducer>,
        telemetry: TelemetryHook,
    ) -> Result<Arc<Self>, ExecError> {
        // Initial balance: explicit config, then the store, then the venue.
        let mut initial_balance = config.initial_balance;
        if initial_balance <= 0.0 {
            initial_balance = store.get_initial_balance(&config.trader_id)?.unwrap_or(0.0);
        }
        if initial_balance <= 0.0 {
            initial_balance = driver.get_balance().await?.total_equity;
            if initial_balance > 0.0 {
                store.set_initial_balance(&config.trader_id, initial_balance)?;
                info!(
                    "recovered initial balance {:.2} USDT from {}",
                    initial_balance,
                    driver.venue()
                );
            }
        }
        if initial_balance <= 0.0 {
            return Err(ExecError::Config(format!(
                "trader {} has no initial balance and the {} account is empty",
                config.trader_id,
                driver.venue()
            )));
        }

        let cycle_number = store.get_last_cycle_number(&config.trader_id)?;
        let executor = DecisionExecutor::new(
            config.clone(),
            driver.clone(),
            store.clone(),
            telemetry.clone(),
        );
        let now = now_millis();
        Ok(Arc::new(Self {
            config,
            driver,
            store,
            strategy,
            producer,
            executor,
            peak_cache: PeakPnlCache::default(),
            first_seen: FirstSeenMap::default(),
            running: Mutex::new(false),
            stop_tx: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            cycle_number: AtomicU64::new(cycle_number),
            call_count: AtomicU64::new(0),
            start_time: now,
            last_reset_time: Mutex::new(now),
            daily_pnl: Mutex::new(0.0),
            stop_until: Mutex::new(0),
        }))
    }

    /// Whether the trader is currently running
    pub fn is_running(&self) -> bool {
        *self.running.lock().unwrap()
    }

    /// Cycles executed so far
    pub fn cycle_number(&self) -> u64 {
        self.cycle_number.load(Ordering::SeqCst)
    }

    /// Producer calls made so far
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// UTC ms the trader was constructed
    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    /// Pause trading until the given UTC ms (risk-control trip)
    pub fn pause_until(&self, until: i64) {
        *self.stop_until.lock().unwrap() = until;
    }

    /// Peak PnL for a book, if tracked (read-locked access)
    pub async fn peak_pnl(&self, symbol: &str, side: crate::model::PositionSide) -> Option<f64> {
        self.peak_cache
            .read()
            .await
            .get(&peak_key(symbol, side))
            .copied()
    }

    /// Start background workers and the main loop; waits until stopped.
    /// Calling run on a running trader is a no-op.
    pub async fn run(&self) {
        {
            let mut running = self.running.lock().unwrap();
            if *running {
                warn!("trader {} already running", self.config.trader_id);
                return;
            }
            *running = true;
        }
        let (tx, rx) = watch::channel(false);
        *self.stop_tx.lock().unwrap() = Some(tx);

        let mut tasks = Vec::new();
        if self.config.venue.has_sync_worker() {
            let worker = SyncWorker::new(
                self.config.trader_id.clone(),
                self.driver.clone(),
                self.store.clone(),
                self.config.sync_interval,
            );
            tasks.push(tokio::spawn(worker.run(rx.clone())));
        }
        let monitor = DrawdownMonitor::new(&self.config, self.driver.clone(), self.peak_cache.clone());
        tasks.push(tokio::spawn(monitor.run(rx.clone())));
        *self.tasks.lock().unwrap() = tasks;

        info!(
            "trader {} running on {} every {:?}",
            self.config.trader_id, self.config.venue, self.config.scan_interval
        );
        self.main_loop(rx).await;

        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap());
        for task in tasks {
            let _ = task.await;
        }
        info!("trader {} fully stopped", self.config.trader_id);
    }

    /// Signal every task to stop. Idempotent; returns once the stop is
    /// broadcast (run() drains the tasks).
    pub fn stop(&self) {
        {
            let mut running = self.running.lock().unwrap();
            if !*running {
                return;
            }
            *running = false;
        }
        if let Some(tx) = self.stop_tx.lock().unwrap().take() {
            let _ = tx.send(true);
        }
        info!("trader {} stop requested", self.config.trader_id);
    }

    async fn main_loop(&self, mut stop: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.scan_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.is_running() {
                        return;
                    }
                    self.run_cycle(&stop).await;
                }
                _ = stop.changed() => {
                    if *stop.borrow() {
                        return;
                    }
                }
            }
        }
    }

    /// Realized PnL of round-trips closed since the last daily reset.
    fn refresh_daily_pnl(&self) -> f64 {
        let since = *self.last_reset_time.lock().unwrap();
        let pnl = match self.store.get_closed_positions(&self.config.trader_id) {
            Ok(records) => records
                .iter()
                .filter(|r| r.exit_time >= since)
                .map(|r| r.realized_pnl)
                .sum(),
            Err(e) => {
                warn!("daily PnL refresh failed: {}", e);
                *self.daily_pnl.lock().unwrap()
            }
        };
        *self.daily_pnl.lock().unwrap() = pnl;
        pnl
    }

    /// One trading cycle.
    async fn run_cycle(&self, stop: &watch::Receiver<bool>) {
        let now = now_millis();
        let cycle = self.cycle_number.fetch_add(1, Ordering::SeqCst) + 1;
        let mut record = DecisionRecord::new(&self.config.trader_id, cycle, now);

        // Risk-control pause window.
        let paused_until = *self.stop_until.lock().unwrap();
        if paused_until > now {
            record.log(format!("paused until {paused_until}, skipping cycle"));
            info!("cycle {}: paused until {}", cycle, paused_until);
            if let Err(e) = self.store.log_decision(record) {
                warn!("persisting paused cycle failed: {}", e);
            }
            return;
        }

        // Daily PnL reset.
        {
            let mut last_reset = self.last_reset_time.lock().unwrap();
            if now - *last_reset > DAILY_RESET {
                *self.daily_pnl.lock().unwrap() = 0.0;
                *last_reset = now;
                info!("daily PnL reset");
            }
        }
        let daily_pnl = self.refresh_daily_pnl();

        let candidates = match self.strategy.get_candidate_coins().await {
            Ok(coins) => coins.into_iter().map(|c| c.symbol).collect(),
            Err(e) => {
                warn!("candidate coins unavailable: {}", e);
                Vec::new()
            }
        };

        let context = match build_trading_context(
            &self.config.trader_id,
            cycle,
            self.driver.as_ref(),
            self.store.as_ref(),
            &self.peak_cache,
            &self.first_seen,
            candidates,
            daily_pnl,
        )
        .await
        {
            Ok(ctx) => ctx,
            Err(e) => {
                error!("cycle {}: context build failed: {}", cycle, e);
                record.error = Some(format!("context build failed: {e}"));
                if let Err(e) = self.store.log_decision(record) {
                    warn!("persisting failed cycle failed: {}", e);
                }
                return;
            }
        };

        // Equity snapshot every cycle, decision or not.
        if let Err(e) = self.store.save_equity(EquitySnapshot {
            trader_id: self.config.trader_id.clone(),
            timestamp: context.timestamp,
            total_equity: context.balance.total_equity,
            balance: context.balance.total_wallet_balance,
            unrealized_pnl: context.balance.total_unrealized_profit,
            position_count: context.positions.len(),
            margin_used_pct: context.margin_used_pct,
        }) {
            warn!("equity snapshot failed: {}", e);
        }

        // Risk-control trip: a daily loss beyond the configured limit
        // pauses trading for the strategy's cool-off window.
        let risk = self.strategy.get_config().risk_control;
        if risk.daily_loss_limit_pct > 0.0 {
            let limit = context.balance.total_equity * risk.daily_loss_limit_pct / 100.0;
            if daily_pnl < -limit {
                let until = now + (risk.pause_minutes.max(1) as i64) * 60_000;
                self.pause_until(until);
                warn!(
                    "daily loss {:.2} beyond limit {:.2}, pausing until {}",
                    daily_pnl, limit, until
                );
                record.log(format!(
                    "risk control tripped: daily loss {daily_pnl:.2}, paused until {until}"
                ));
                if let Err(e) = self.store.log_decision(record) {
                    warn!("persisting risk-trip cycle failed: {}", e);
                }
                return;
            }
        }

        self.call_count.fetch_add(1, Ordering::SeqCst);
        let strategy_prompt = self.strategy.get_config().custom_prompt;
        let response = match self
            .producer
            .get_full_decision(&context, &strategy_prompt, "balanced")
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                error!("cycle {}: producer failed: {}", cycle, e);
                record.error = Some(e.to_string());
                if let Err(e) = self.store.log_decision(record) {
                    warn!("persisting failed cycle failed: {}", e);
                }
                return;
            }
        };

        let mut decisions = response.decisions.clone();
        record.response = response;
        sort_for_execution(&mut decisions);
        info!("cycle {}: {} decisions", cycle, decisions.len());

        for decision in decisions {
            // A stop during a multi-decision cycle aborts remaining work.
            if *stop.borrow() || !self.is_running() {
                record.log("stopped mid-cycle".to_string());
                break;
            }
            let action = decision.action;
            let symbol = decision.symbol.clone();
            let side = action.position_side();
            let outcome = self.executor.execute(decision, &mut record).await;
            let success = outcome.success;
            record.outcomes.push(outcome);

            if success {
                if let Some(side) = side {
                    let key = peak_key(&symbol, side);
                    if action.is_open() {
                        self.first_seen.write().await.insert(key, now_millis());
                    } else if action.is_close() {
                        self.first_seen.write().await.remove(&key);
                        self.peak_cache.write().await.remove(&key);
                    }
                }
                tokio::time::sleep(crate::constants::INTER_DECISION_SLEEP).await;
            }
        }

        if let Err(e) = self.store.log_decision(record) {
            warn!("persisting cycle {} failed: {}", cycle, e);
        }
    }
}
