//! Account balance snapshot

use pretty_simple_display::{DebugPretty, DisplaySimple};
use serde::{Deserialize, Serialize};

/// Venue-neutral account balance, quote (USDT) units
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct AccountBalance {
    /// Wallet balance plus unrealized PnL
    pub total_equity: f64,
    /// Wallet balance excluding unrealized PnL
    pub total_wallet_balance: f64,
    /// Balance free for new margin
    pub available_balance: f64,
    /// Sum of unrealized PnL across positions
    pub total_unrealized_profit: f64,
}

impl AccountBalance {
    /// Fraction of equity consumed by margin, in percent
    pub fn margin_used_pct(&self) -> f64 {
        if self.total_equity <= 0.0 {
            return 0.0;
        }
        ((self.total_equity - self.available_balance) / self.total_equity) * 100.0
    }
}
