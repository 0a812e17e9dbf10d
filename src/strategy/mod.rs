//! Strategy-engine interface
//!
//! Candidate selection, indicator batches, and risk-control configuration
//! live outside the core; this trait is the surface the trading loop
//! consumes. All calls are synchronous-bounded: implementations must
//! return in bounded time.

use crate::error::ExecError;
use async_trait::async_trait;
use pretty_simple_display::{DebugPretty, DisplaySimple};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One tradable candidate
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct CoinInfo {
    /// Canonical symbol
    pub symbol: String,
    /// Why the strategy surfaced it (ranking source, score)
    pub reason: String,
}

/// Risk-control knobs owned by the strategy layer
#[derive(DebugPretty, DisplaySimple, Clone, Default, Serialize, Deserialize)]
pub struct RiskControlConfig {
    /// Pause trading for this many minutes after a trip
    pub pause_minutes: u32,
    /// Daily-loss limit in percent of equity; 0 disables
    pub daily_loss_limit_pct: f64,
}

/// Strategy configuration consumed by the loop
#[derive(DebugPretty, DisplaySimple, Clone, Default, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Risk-control settings
    pub risk_control: RiskControlConfig,
    /// Indicator set requested from the data layer
    pub indicators: Vec<String>,
    /// Extra prompt text appended to the producer request
    pub custom_prompt: String,
}

/// Strategy engine surface
#[async_trait]
pub trait StrategyEngine: Send + Sync {
    /// Symbols worth considering this cycle
    async fn get_candidate_coins(&self) -> Result<Vec<CoinInfo>, ExecError>;

    /// Current strategy configuration
    fn get_config(&self) -> StrategyConfig;

    /// Quant/indicator data for a symbol batch, keyed by symbol
    async fn fetch_quant_data_batch(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, serde_json::Value>, ExecError>;

    /// Open-interest ranking feed
    async fn fetch_oi_ranking(&self) -> Result<Vec<CoinInfo>, ExecError>;

    /// Net-flow ranking feed
    async fn fetch_net_flow_ranking(&self) -> Result<Vec<CoinInfo>, ExecError>;

    /// Price-move ranking feed
    async fn fetch_price_ranking(&self) -> Result<Vec<CoinInfo>, ExecError>;
}
