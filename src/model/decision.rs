//! Trading decisions as produced by the upstream decision producer

use crate::model::types::OrderAction;
use pretty_simple_display::{DebugPretty, DisplaySimple};
use serde::{Deserialize, Serialize};

/// One discrete trading decision for a single symbol
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// Canonical USDT-quoted symbol (e.g. `BTCUSDT`)
    pub symbol: String,
    /// Intent for this symbol
    pub action: OrderAction,
    /// Requested leverage
    #[serde(default)]
    pub leverage: u32,
    /// Requested notional in USDT; risk gates may shrink it
    #[serde(default)]
    pub position_size_usd: f64,
    /// Stop-loss trigger price; 0 means none
    #[serde(default)]
    pub stop_loss: f64,
    /// Take-profit trigger price; 0 means none
    #[serde(default)]
    pub take_profit: f64,
    /// Producer confidence in percent
    #[serde(default)]
    pub confidence: f64,
    /// Producer rationale, persisted verbatim
    #[serde(default)]
    pub reasoning: String,
}

impl Decision {
    /// Structural validity: open actions must carry a positive size,
    /// close actions may carry zero (meaning "full").
    pub fn validate(&self) -> Result<(), String> {
        if self.symbol.is_empty() {
            return Err("decision has empty symbol".to_string());
        }
        if self.action.is_open() {
            if self.position_size_usd <= 0.0 {
                return Err(format!(
                    "{} {} requires a positive position size",
                    self.action.as_str(),
                    self.symbol
                ));
            }
            if self.leverage == 0 {
                return Err(format!("{} requires leverage >= 1", self.symbol));
            }
        }
        Ok(())
    }
}

/// Outcome of executing one decision, kept in the cycle record
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct DecisionOutcome {
    /// The decision as executed (size possibly clamped)
    pub decision: Decision,
    /// Whether the venue accepted the resulting order
    pub success: bool,
    /// Exchange order id when one was placed
    pub order_id: Option<String>,
    /// Error string for failed actions
    pub error: Option<String>,
    /// UTC millisecond timestamp of execution
    pub executed_at: i64,
}

/// Sort decisions in place by execution priority, stable within a tier.
///
/// Closes run before opens so capacity freed inside a cycle can be reused.
pub fn sort_for_execution(decisions: &mut [Decision]) {
    decisions.sort_by_key(|d| d.action.priority());
}
