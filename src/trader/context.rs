//! Trading-context assembly
//!
//! Once per cycle the loop snapshots balance and positions, attaches the
//! best-known entry time for each position (local store first, venue
//! second, first-seen map last), and the tracked peak PnL.

use crate::error::ExecError;
use crate::model::context::{PositionInfo, TradingContext, leveraged_pnl_pct};
use crate::monitor::{PeakPnlCache, peak_key};
use crate::store::Store;
use crate::venue::VenueDriver;
use crate::venue::http::now_millis;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

/// First-observation times for positions the store has no row for yet
pub type FirstSeenMap = Arc<RwLock<HashMap<String, i64>>>;

/// Assemble the context for one cycle.
pub async fn build_trading_context(
    trader_id: &str,
    cycle_number: u64,
    driver: &dyn VenueDriver,
    store: &dyn Store,
    peak_cache: &PeakPnlCache,
    first_seen: &FirstSeenMap,
    candidate_symbols: Vec<String>,
    daily_pnl: f64,
) -> Result<TradingContext, ExecError> {
    let now = now_millis();
    let balance = driver.get_balance().await?;
    let venue_positions = driver.get_positions().await?;

    let mut positions = Vec::with_capacity(venue_positions.len());
    for p in venue_positions {
        let key = peak_key(&p.symbol, p.side);

        // Entry time: the local row is exact, the venue's creation time is
        // close, first-seen is the fallback that at least bounds it.
        let entry_time = match store.get_open_position_by_symbol(trader_id, &p.symbol, p.side) {
            Ok(Some(row)) => row.entry_time,
            Ok(None) => match p.created_time {
                Some(t) if t > 0 => t,
                _ => {
                    let mut seen = first_seen.write().await;
                    *seen.entry(key.clone()).or_insert(now)
                }
            },
            Err(e) => {
                warn!("entry-time lookup for {} failed: {}", p.symbol, e);
                now
            }
        };

        let margin = p.margin_used();
        let unrealized_pnl_pct = if margin > 0.0 {
            p.unrealized_profit / margin * 100.0
        } else {
            leveraged_pnl_pct(p.side, p.entry_price, p.mark_price, p.leverage.max(1))
        };
        let peak_pnl_pct = peak_cache.read().await.get(&key).copied().unwrap_or(0.0);

        positions.push(PositionInfo {
            symbol: p.symbol,
            side: p.side,
            quantity: p.position_amt,
            entry_price: p.entry_price,
            mark_price: p.mark_price,
            unrealized_pnl: p.unrealized_profit,
            unrealized_pnl_pct,
            leverage: p.leverage,
            liquidation_price: p.liquidation_price,
            entry_time,
            peak_pnl_pct,
        });
    }

    Ok(TradingContext {
        cycle_number,
        timestamp: now,
        margin_used_pct: balance.margin_used_pct(),
        balance,
        positions,
        candidate_symbols,
        daily_pnl,
    })
}
