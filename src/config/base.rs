//! Trader configuration

use crate::config::credentials::VenueCredentials;
use crate::constants::{
    DEFAULT_ALT_POSITION_RATIO, DEFAULT_DRAWDOWN_TRIGGER_PCT, DEFAULT_MAJOR_POSITION_RATIO,
    DEFAULT_MAX_POSITIONS, DEFAULT_MIN_POSITION_SIZE, DEFAULT_MONITOR_INTERVAL,
    DEFAULT_PROFIT_FLOOR_PCT, DEFAULT_SCAN_INTERVAL, DEFAULT_SYNC_INTERVAL, DEFAULT_TIMEOUT,
    MAX_RETRIES,
};
use crate::model::types::VenueKind;
use std::env;
use std::time::Duration;

/// Configuration for one automatic trader
#[derive(Debug, Clone)]
pub struct TraderConfig {
    /// Opaque trader identifier, used as the store partition key
    pub trader_id: String,
    /// Venue this trader executes on
    pub venue: VenueKind,
    /// Venue credentials
    pub credentials: VenueCredentials,
    /// Trading-loop cadence
    pub scan_interval: Duration,
    /// Order-sync cadence
    pub sync_interval: Duration,
    /// Drawdown-monitor cadence
    pub monitor_interval: Duration,
    /// Maximum simultaneously open positions
    pub max_positions: usize,
    /// Minimum accepted position size after clamps, USDT
    pub min_position_size: f64,
    /// Equity multiple allowed for BTC/ETH positions
    pub major_position_ratio: f64,
    /// Equity multiple allowed for altcoin positions
    pub alt_position_ratio: f64,
    /// Profit floor before the giveback rule applies, percent
    pub profit_floor_pct: f64,
    /// Giveback from peak that forces a close, percent
    pub drawdown_trigger_pct: f64,
    /// Initial balance; 0 means "recover from venue at construction"
    pub initial_balance: f64,
    /// HTTP request timeout
    pub http_timeout: Duration,
    /// HTTP retry budget for transient failures
    pub max_retries: u32,
}

impl TraderConfig {
    /// Defaults for a venue, credentials from the environment.
    pub fn new(trader_id: impl Into<String>, venue: VenueKind) -> Self {
        dotenv::dotenv().ok();

        let scan_interval = env::var("PERP_EXEC_SCAN_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SCAN_INTERVAL);

        Self {
            trader_id: trader_id.into(),
            venue,
            credentials: VenueCredentials::from_env().unwrap_or_default(),
            scan_interval,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            max_positions: DEFAULT_MAX_POSITIONS,
            min_position_size: DEFAULT_MIN_POSITION_SIZE,
            major_position_ratio: DEFAULT_MAJOR_POSITION_RATIO,
            alt_position_ratio: DEFAULT_ALT_POSITION_RATIO,
            profit_floor_pct: DEFAULT_PROFIT_FLOOR_PCT,
            drawdown_trigger_pct: DEFAULT_DRAWDOWN_TRIGGER_PCT,
            initial_balance: 0.0,
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT),
            max_retries: MAX_RETRIES,
        }
    }

    /// Set credentials explicitly
    pub fn with_credentials(mut self, credentials: VenueCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the trading-loop cadence
    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    /// Set the open-position cap
    pub fn with_max_positions(mut self, max: usize) -> Self {
        self.max_positions = max;
        self
    }

    /// Set the minimum position size
    pub fn with_min_position_size(mut self, min: f64) -> Self {
        self.min_position_size = min;
        self
    }

    /// Set the starting balance instead of recovering it from the venue
    pub fn with_initial_balance(mut self, balance: f64) -> Self {
        self.initial_balance = balance;
        self
    }

    /// Set the drawdown thresholds (profit floor, giveback trigger), percent
    pub fn with_drawdown_thresholds(mut self, floor_pct: f64, trigger_pct: f64) -> Self {
        self.profit_floor_pct = floor_pct;
        self.drawdown_trigger_pct = trigger_pct;
        self
    }

    /// Position-value ratio for a symbol: majors get more headroom.
    pub fn position_ratio(&self, symbol: &str) -> f64 {
        if symbol.starts_with("BTC") || symbol.starts_with("ETH") {
            self.major_position_ratio
        } else {
            self.alt_position_ratio
        }
    }
}
