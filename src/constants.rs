//! Execution-core constants

use std::time::Duration;

/// Default timeout for HTTP requests in seconds
pub const DEFAULT_TIMEOUT: u64 = 30;

/// Maximum number of retries for failed requests
pub const MAX_RETRIES: u32 = 3;

/// Default trading-loop scan interval
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(180);

/// Default order-sync cadence
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Default drawdown-monitor cadence
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(60);

/// Sleep between decisions inside one cycle
pub const INTER_DECISION_SLEEP: Duration = Duration::from_secs(1);

/// Order-status polling attempts for venues without a sync worker
pub const ORDER_POLL_ATTEMPTS: u32 = 5;
/// Order-status polling interval
pub const ORDER_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Balance/position cache lifetime per venue instance
pub const ACCOUNT_CACHE_TTL: Duration = Duration::from_secs(15);

/// Symbol-precision cache lifetime per venue instance
pub const PRECISION_CACHE_TTL: Duration = Duration::from_secs(300);

/// Lookback window for trade-history sync
pub const SYNC_LOOKBACK: Duration = Duration::from_secs(24 * 3600);

/// Default cap on simultaneously open positions
pub const DEFAULT_MAX_POSITIONS: usize = 3;

/// Default minimum accepted position size in USDT
pub const DEFAULT_MIN_POSITION_SIZE: f64 = 12.0;

/// Position-value cap as a multiple of equity for BTC/ETH
pub const DEFAULT_MAJOR_POSITION_RATIO: f64 = 5.0;

/// Position-value cap as a multiple of equity for altcoins
pub const DEFAULT_ALT_POSITION_RATIO: f64 = 1.0;

/// Affordability buffer applied after the margin-factor cap
pub const AFFORDABILITY_BUFFER: f64 = 0.98;

/// Drawdown trigger: minimum profit before the giveback rule applies (percent)
pub const DEFAULT_PROFIT_FLOOR_PCT: f64 = 5.0;

/// Drawdown trigger: giveback from peak that forces a close (percent)
pub const DEFAULT_DRAWDOWN_TRIGGER_PCT: f64 = 40.0;

/// Quantity below this is treated as fully consumed during rebuild
pub const QTY_EPSILON: f64 = 1e-8;

/// Venue REST base URLs
pub mod base_urls {
    /// Binance USDT-margined futures
    pub const BINANCE: &str = "https://fapi.binance.com";
    /// Bybit v5 unified
    pub const BYBIT: &str = "https://api.bybit.com";
    /// OKX v5
    pub const OKX: &str = "https://www.okx.com";
    /// Bitget v2 mix
    pub const BITGET: &str = "https://api.bitget.com";
    /// Gate.io v4 futures
    pub const GATE: &str = "https://api.gateio.ws";
    /// Hyperliquid mainnet
    pub const HYPERLIQUID: &str = "https://api.hyperliquid.xyz";
    /// Aster futures
    pub const ASTER: &str = "https://fapi.asterdex.com";
    /// Lighter mainnet
    pub const LIGHTER: &str = "https://mainnet.zklighter.elliot.ai";
}

/// Per-venue trade-history page limits
pub mod trade_limits {
    /// Binance user trades page size
    pub const BINANCE: u32 = 1000;
    /// Bybit execution-list page size
    pub const BYBIT: u32 = 1000;
    /// OKX fills page size
    pub const OKX: u32 = 100;
    /// Bitget fills page size
    pub const BITGET: u32 = 100;
    /// Gate.io my-trades page size
    pub const GATE: u32 = 100;
    /// Hyperliquid userFills page size
    pub const HYPERLIQUID: u32 = 1000;
    /// Aster user trades page size
    pub const ASTER: u32 = 500;
    /// Lighter trades page size
    pub const LIGHTER: u32 = 100;
}

/// Venue error codes that mean "already in the requested state".
///
/// Leverage and margin-mode setters map these to success.
pub mod idempotent_codes {
    /// Binance family: no need to change leverage
    pub const BINANCE_LEVERAGE_UNCHANGED: i64 = -2030;
    /// Binance family: no need to change margin type
    pub const BINANCE_MARGIN_UNCHANGED: i64 = -4168;
    /// Binance family: unknown symbol on a cancel sweep, tolerated
    pub const BINANCE_INVALID_SYMBOL: i64 = -1121;
    /// Bybit: leverage not modified
    pub const BYBIT_LEVERAGE_UNCHANGED: i64 = 110043;
    /// Bybit: cross/isolated not modified
    pub const BYBIT_MARGIN_UNCHANGED: i64 = 110026;
    /// OKX success code as returned in the `code` body field
    pub const OKX_OK: &str = "0";
    /// Bitget success code as returned in the `code` body field
    pub const BITGET_OK: &str = "00000";
}

/// Hyperliquid HIP-3 perp-dex constants
pub mod hip3 {
    /// Asset-index base for perp-dex markets: `100000 + dex*10000 + meta`
    pub const ASSET_BASE: u32 = 100_000;
    /// Stride between perp dexes in the asset-index space
    pub const DEX_STRIDE: u32 = 10_000;
    /// The `xyz` builder dex index
    pub const XYZ_DEX_INDEX: u32 = 1;
    /// Slippage applied to marketable IOC orders on the xyz dex
    pub const XYZ_SLIPPAGE: f64 = 0.05;
}
