//! Venue drivers
//!
//! One driver per exchange, all speaking the same capability contract. The
//! core never branches on a concrete venue type outside of construction;
//! everything downstream works through `dyn VenueDriver`.

/// Driver-internal TTL caches
pub mod cache;
/// Shared HTTP plumbing
pub mod http;
/// Signing primitives
pub mod sign;
/// Canonical-symbol translation
pub mod symbols;

/// Scriptable driver for unit tests
#[cfg(test)]
pub mod mock;

/// Aster driver
pub mod aster;
/// Binance USDT-M driver
pub mod binance;
/// Bitget mix driver
pub mod bitget;
/// Bybit v5 driver
pub mod bybit;
/// Gate.io futures driver
pub mod gate;
/// Hyperliquid driver (incl. HIP-3 builder dexes)
pub mod hyperliquid;
/// Lighter driver
pub mod lighter;
/// OKX v5 driver
pub mod okx;

use crate::config::TraderConfig;
use crate::error::ExecError;
use crate::model::{
    AccountBalance, ClosedPnlRecord, OrderResult, OrderStatusInfo, PendingOrder, PositionSide,
    TradeRecord, VenueKind, VenuePosition,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Capability contract every exchange driver implements.
///
/// Symbols in are canonical (`BTCUSDT`); symbols out are canonical again.
/// Quantities are base-asset units, always positive; direction lives in the
/// side argument or field. Drivers are internally thread-safe and may serve
/// balance/position reads from short TTL caches, which every successful
/// order placement invalidates.
#[async_trait]
pub trait VenueDriver: Send + Sync {
    /// Which venue this driver talks to
    fn venue(&self) -> VenueKind;

    /// Account balance, quote units
    async fn get_balance(&self) -> Result<AccountBalance, ExecError>;

    /// Open positions, normalized
    async fn get_positions(&self) -> Result<Vec<VenuePosition>, ExecError>;

    /// Open or add to a long with a market order. Cancels stale pending
    /// orders for the symbol and applies leverage first.
    async fn open_long(&self, symbol: &str, qty: f64, leverage: u32)
    -> Result<OrderResult, ExecError>;

    /// Open or add to a short with a market order
    async fn open_short(
        &self,
        symbol: &str,
        qty: f64,
        leverage: u32,
    ) -> Result<OrderResult, ExecError>;

    /// Reduce or close a long. `qty = 0` closes the full position; with no
    /// position open the result is a `NoPosition` no-op, not an error.
    async fn close_long(&self, symbol: &str, qty: f64) -> Result<OrderResult, ExecError>;

    /// Reduce or close a short, same semantics as `close_long`
    async fn close_short(&self, symbol: &str, qty: f64) -> Result<OrderResult, ExecError>;

    /// Set leverage; "already at this value" is success
    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExecError>;

    /// Set cross/isolated margin; "already in mode" and "open position
    /// prevents change" are success
    async fn set_margin_mode(&self, symbol: &str, is_cross: bool) -> Result<(), ExecError>;

    /// Last traded price, must be positive
    async fn get_market_price(&self, symbol: &str) -> Result<f64, ExecError>;

    /// Place or replace a stop-loss trigger for an open position
    async fn set_stop_loss(
        &self,
        symbol: &str,
        side: PositionSide,
        qty: f64,
        trigger: f64,
    ) -> Result<(), ExecError>;

    /// Place or replace a take-profit trigger for an open position
    async fn set_take_profit(
        &self,
        symbol: &str,
        side: PositionSide,
        qty: f64,
        trigger: f64,
    ) -> Result<(), ExecError>;

    /// Cancel resting stop/take-profit triggers for a symbol. Individual
    /// failures are logged, never fatal.
    async fn cancel_stop_orders(&self, symbol: &str) -> Result<(), ExecError>;

    /// Cancel every pending order for a symbol. Individual failures are
    /// logged, never fatal.
    async fn cancel_all_orders(&self, symbol: &str) -> Result<(), ExecError>;

    /// Format a quantity floored to the symbol's step grid
    async fn format_quantity(&self, symbol: &str, qty: f64) -> Result<String, ExecError>;

    /// Status of one order
    async fn get_order_status(
        &self,
        symbol: &str,
        order_id: &str,
    ) -> Result<OrderStatusInfo, ExecError>;

    /// Fills since `start_time` (UTC ms), oldest first after sorting
    async fn get_trades(&self, start_time: i64, limit: u32)
    -> Result<Vec<TradeRecord>, ExecError>;

    /// Venue-reported closed-PnL records since `start_time` where the venue
    /// has such an endpoint; otherwise derived from fills
    async fn get_closed_pnl(
        &self,
        start_time: i64,
        limit: u32,
    ) -> Result<Vec<ClosedPnlRecord>, ExecError>;

    /// Pending SL/TP/limit orders for a symbol
    async fn get_open_orders(&self, symbol: &str) -> Result<Vec<PendingOrder>, ExecError>;

    /// Venue page limit for `get_trades`
    fn trade_limit(&self) -> u32;
}

/// Construct the driver for a configured venue.
///
/// The only place in the core that names concrete driver types. Fatal
/// misconfiguration (missing wallet, bad key) surfaces here so no background
/// work ever starts with an unusable driver.
pub async fn build_driver(config: &TraderConfig) -> Result<Arc<dyn VenueDriver>, ExecError> {
    let driver: Arc<dyn VenueDriver> = match config.venue {
        VenueKind::Binance => Arc::new(binance::BinanceDriver::new(config)?),
        VenueKind::Bybit => Arc::new(bybit::BybitDriver::new(config)?),
        VenueKind::Okx => Arc::new(okx::OkxDriver::connect(config).await?),
        VenueKind::Bitget => Arc::new(bitget::BitgetDriver::new(config)?),
        VenueKind::Gate => Arc::new(gate::GateDriver::new(config)?),
        VenueKind::Hyperliquid => Arc::new(hyperliquid::HyperliquidDriver::new(config)?),
        VenueKind::Aster => Arc::new(aster::AsterDriver::new(config)?),
        VenueKind::Lighter => Arc::new(lighter::LighterDriver::connect(config).await?),
    };
    Ok(driver)
}
