//! Order sync worker
//!
//! One worker per configured venue. Each tick pulls the last 24 hours of
//! fills, dedupes against the store by `(exchange_id, trade_id)`, records
//! order and fill rows, and drives the position builder. A failing trade is
//! logged and skipped; the worker itself never aborts on partial failure.

use crate::constants::SYNC_LOOKBACK;
use crate::error::ExecError;
use crate::model::{OrderStatus, TradeRecord, TraderFill, TraderOrder};
use crate::store::{PositionBuilder, Store};
use crate::venue::VenueDriver;
use crate::venue::http::now_millis;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Background reconciliation worker for one venue
pub struct SyncWorker {
    trader_id: String,
    driver: Arc<dyn VenueDriver>,
    store: Arc<dyn Store>,
    builder: PositionBuilder,
    interval: Duration,
}

impl SyncWorker {
    /// Worker for a trader's venue
    pub fn new(
        trader_id: impl Into<String>,
        driver: Arc<dyn VenueDriver>,
        store: Arc<dyn Store>,
        interval: Duration,
    ) -> Self {
        let trader_id = trader_id.into();
        let builder = PositionBuilder::new(trader_id.clone(), driver.venue(), store.clone());
        Self {
            trader_id,
            driver,
            store,
            builder,
            interval,
        }
    }

    /// Run until the stop channel flips. The first sync happens
    /// immediately; later ones follow the configured cadence.
    pub async fn run(self, mut stop: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        info!(
            "sync worker for {} on {} started",
            self.trader_id,
            self.driver.venue()
        );
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sync_tick().await {
                        warn!("sync tick on {} failed: {}", self.driver.venue(), e);
                    }
                }
                _ = stop.changed() => {
                    if *stop.borrow() {
                        info!("sync worker for {} stopping", self.trader_id);
                        return;
                    }
                }
            }
        }
    }

    async fn sync_tick(&self) -> Result<(), ExecError> {
        let start_time = now_millis() - SYNC_LOOKBACK.as_millis() as i64;
        sync_once(
            &self.trader_id,
            self.driver.as_ref(),
            self.store.as_ref(),
            &self.builder,
            start_time,
        )
        .await
    }
}

/// One reconciliation pass; separated from the loop for tests.
pub async fn sync_once(
    trader_id: &str,
    driver: &dyn VenueDriver,
    store: &dyn Store,
    builder: &PositionBuilder,
    start_time: i64,
) -> Result<(), ExecError> {
    let mut trades = driver.get_trades(start_time, driver.trade_limit()).await?;
    trades.sort_by_key(|t| t.time);
    let venue = driver.venue();

    let mut inserted = 0usize;
    for trade in &trades {
        match record_trade(trader_id, venue, store, builder, trade) {
            Ok(true) => inserted += 1,
            Ok(false) => {}
            Err(e) => {
                warn!("recording trade {} failed, skipping: {}", trade.trade_id, e);
            }
        }
    }
    if inserted > 0 {
        info!("synced {} new fills from {}", inserted, venue);
    } else {
        debug!("sync pass on {} found nothing new", venue);
    }
    Ok(())
}

/// Record one trade; returns whether it was new.
fn record_trade(
    trader_id: &str,
    venue: crate::model::VenueKind,
    store: &dyn Store,
    builder: &PositionBuilder,
    trade: &TradeRecord,
) -> Result<bool, ExecError> {
    if store.has_fill(venue, &trade.trade_id)? {
        return Ok(false);
    }

    store.insert_order(TraderOrder {
        trader_id: trader_id.to_string(),
        exchange_id: venue,
        order_id: trade.trade_id.clone(),
        symbol: trade.symbol.clone(),
        side: trade.side,
        position_side: trade.position_side,
        order_action: trade.order_action,
        status: OrderStatus::Filled,
        avg_fill_price: trade.price,
        executed_qty: trade.quantity,
        commission: trade.fee,
        created_at: trade.time,
    })?;

    store.insert_fill(TraderFill {
        trader_id: trader_id.to_string(),
        exchange_id: venue,
        trade_id: trade.trade_id.clone(),
        order_id: trade.trade_id.clone(),
        symbol: trade.symbol.clone(),
        side: trade.side,
        price: trade.price,
        quantity: trade.quantity,
        realized_pnl: trade.realized_pnl,
        fee: trade.fee,
        time: trade.time,
    })?;

    builder.process_trade(trade)?;
    Ok(true)
}
