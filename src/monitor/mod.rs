//! Drawdown monitor
//!
//! Independent task on a one-minute cadence. Tracks each open position's
//! peak leveraged PnL percentage and force-closes a position that gives
//! back too much of a real profit. Every failure is logged and the loop
//! continues; the monitor never takes the trader down.

use crate::config::TraderConfig;
use crate::model::context::leveraged_pnl_pct;
use crate::model::types::PositionSide;
use crate::venue::VenueDriver;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};

/// Shared peak-PnL cache: `symbol|side` → best leveraged PnL percent.
///
/// Entries live while a position is open and are deleted when the monitor
/// closes it. The trading loop reads the same cache when building context.
pub type PeakPnlCache = Arc<RwLock<HashMap<String, f64>>>;

/// Cache key for one book
pub fn peak_key(symbol: &str, side: PositionSide) -> String {
    format!("{}|{}", symbol, side.label())
}

/// Giveback decision: profit floor plus drawdown threshold.
///
/// Only positions that were meaningfully in profit (`current > floor`)
/// qualify; the drawdown is measured from the tracked peak.
pub fn should_emergency_close(
    current_pct: f64,
    peak_pct: f64,
    profit_floor_pct: f64,
    drawdown_trigger_pct: f64,
) -> bool {
    if peak_pct <= 0.0 || current_pct >= peak_pct {
        return false;
    }
    if current_pct <= profit_floor_pct {
        return false;
    }
    let drawdown = (peak_pct - current_pct) / peak_pct * 100.0;
    drawdown >= drawdown_trigger_pct
}

/// Peak-tracking emergency closer
pub struct DrawdownMonitor {
    driver: Arc<dyn VenueDriver>,
    peak_cache: PeakPnlCache,
    profit_floor_pct: f64,
    drawdown_trigger_pct: f64,
    interval: Duration,
}

impl DrawdownMonitor {
    /// Monitor bound to a driver and the facade's shared peak cache
    pub fn new(config: &TraderConfig, driver: Arc<dyn VenueDriver>, peak_cache: PeakPnlCache) -> Self {
        Self {
            driver,
            peak_cache,
            profit_floor_pct: config.profit_floor_pct,
            drawdown_trigger_pct: config.drawdown_trigger_pct,
            interval: config.monitor_interval,
        }
    }

    /// Run until the stop channel flips.
    pub async fn run(self, mut stop: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        info!("drawdown monitor started ({}% / {}%)", self.profit_floor_pct, self.drawdown_trigger_pct);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_positions().await;
                }
                _ = stop.changed() => {
                    if *stop.borrow() {
                        info!("drawdown monitor stopping");
                        return;
                    }
                }
            }
        }
    }

    /// One monitoring pass over all open positions.
    pub async fn check_positions(&self) {
        let positions = match self.driver.get_positions().await {
            Ok(p) => p,
            Err(e) => {
                warn!("drawdown check: positions unavailable: {}", e);
                return;
            }
        };

        for position in positions {
            let mark = match self.driver.get_market_price(&position.symbol).await {
                Ok(m) => m,
                Err(e) => {
                    warn!("drawdown check: no price for {}: {}", position.symbol, e);
                    continue;
                }
            };
            let current = leveraged_pnl_pct(
                position.side,
                position.entry_price,
                mark,
                position.leverage.max(1),
            );
            let key = peak_key(&position.symbol, position.side);

            let peak = {
                let mut cache = self.peak_cache.write().await;
                let entry = cache.entry(key.clone()).or_insert(current);
                if current > *entry {
                    *entry = current;
                }
                *entry
            };
            debug!(
                "{} {}: pnl {:.2}% peak {:.2}%",
                position.symbol,
                position.side.label(),
                current,
                peak
            );

            if !should_emergency_close(
                current,
                peak,
                self.profit_floor_pct,
                self.drawdown_trigger_pct,
            ) {
                continue;
            }

            let drawdown = (peak - current) / peak * 100.0;
            warn!(
                "emergency close {} {}: pnl {:.2}% off peak {:.2}% (drawdown {:.1}%)",
                position.symbol,
                position.side.label(),
                current,
                peak,
                drawdown
            );
            let closed = match position.side {
                PositionSide::Short => self.driver.close_short(&position.symbol, 0.0).await,
                _ => self.driver.close_long(&position.symbol, 0.0).await,
            };
            match closed {
                Ok(result) => {
                    info!("emergency close placed: order {}", result.order_id);
                    self.peak_cache.write().await.remove(&key);
                }
                Err(e) => warn!("emergency close {} failed: {}", position.symbol, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VenuePosition;
    use crate::model::types::VenueKind;
    use crate::venue::mock::MockVenue;

    #[test]
    fn test_trigger_rule() {
        // peak 12, current 6 -> 50% drawdown, above the 40% trigger.
        assert!(should_emergency_close(6.0, 12.0, 5.0, 40.0));
        // current 4 is under the 5% floor: no trigger.
        assert!(!should_emergency_close(4.0, 12.0, 5.0, 40.0));
        // shallow giveback: 12 -> 9 is 25%.
        assert!(!should_emergency_close(9.0, 12.0, 5.0, 40.0));
        // no profit ever: nothing to give back.
        assert!(!should_emergency_close(-3.0, 0.0, 5.0, 40.0));
    }

    fn long_position(symbol: &str, entry: f64, leverage: u32) -> VenuePosition {
        VenuePosition {
            symbol: symbol.into(),
            side: PositionSide::Long,
            position_amt: 0.5,
            entry_price: entry,
            mark_price: entry,
            unrealized_profit: 0.0,
            leverage,
            liquidation_price: 0.0,
            created_time: None,
        }
    }

    #[tokio::test]
    async fn test_price_trajectory_triggers_once() {
        // leverage 10 on entry 100: marks map to pnl% [2, 8, 12, 10, 6].
        let venue = Arc::new(MockVenue::new(VenueKind::Binance));
        venue.set_positions(vec![long_position("BTCUSDT", 100.0, 10)]).await;

        let config = TraderConfig::new("t1", VenueKind::Binance);
        let cache: PeakPnlCache = Arc::new(RwLock::new(HashMap::new()));
        let monitor = DrawdownMonitor::new(&config, venue.clone(), cache.clone());

        for mark in [100.2, 100.8, 101.2, 101.0] {
            venue.set_price("BTCUSDT", mark).await;
            monitor.check_positions().await;
            assert_eq!(venue.close_calls().await, 0);
        }
        // Peak is 12%; dropping to 6% is a 50% giveback.
        venue.set_price("BTCUSDT", 100.6).await;
        monitor.check_positions().await;
        assert_eq!(venue.close_calls().await, 1);
        // Cache entry removed on success.
        assert!(
            !cache
                .read()
                .await
                .contains_key(&peak_key("BTCUSDT", PositionSide::Long))
        );

        // Position gone from the venue: no further trigger.
        venue.set_positions(vec![]).await;
        venue.set_price("BTCUSDT", 100.5).await;
        monitor.check_positions().await;
        assert_eq!(venue.close_calls().await, 1);
    }

    #[tokio::test]
    async fn test_below_floor_never_triggers() {
        let venue = Arc::new(MockVenue::new(VenueKind::Binance));
        venue.set_positions(vec![long_position("ETHUSDT", 100.0, 10)]).await;
        let config = TraderConfig::new("t1", VenueKind::Binance);
        let cache: PeakPnlCache = Arc::new(RwLock::new(HashMap::new()));
        let monitor = DrawdownMonitor::new(&config, venue.clone(), cache);

        // Peak 12%, then down to 4%: drawdown 67% but below the floor.
        venue.set_price("ETHUSDT", 101.2).await;
        monitor.check_positions().await;
        venue.set_price("ETHUSDT", 100.4).await;
        monitor.check_positions().await;
        assert_eq!(venue.close_calls().await, 0);
    }
}
