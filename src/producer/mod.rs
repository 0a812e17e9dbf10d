//! Decision-producer interface
//!
//! The upstream producer (an AI client in production) is consumed through
//! this trait; the core persists everything it returns, including failures,
//! so every cycle can be replayed post-hoc.

use crate::error::ExecError;
use crate::model::context::TradingContext;
use crate::model::decision::{Decision, DecisionOutcome};
use async_trait::async_trait;
use pretty_simple_display::{DebugPretty, DisplaySimple};
use serde::{Deserialize, Serialize};

/// Everything the producer returns for one cycle
#[derive(DebugPretty, DisplaySimple, Clone, Default, Serialize, Deserialize)]
pub struct ProducerResponse {
    /// System prompt used for the request
    pub system_prompt: String,
    /// User prompt (rendered context)
    pub user_prompt: String,
    /// Chain-of-thought trace when the model exposes one
    pub cot_trace: String,
    /// Raw model output before parsing
    pub raw_response: String,
    /// Parsed decision list
    pub decisions: Vec<Decision>,
    /// Wall-clock duration of the producer call, ms
    pub ai_request_duration_ms: i64,
}

/// Upstream decision producer
#[async_trait]
pub trait DecisionProducer: Send + Sync {
    /// Produce a decision list for the assembled context. `bias` is a
    /// free-form steering hint (e.g. `balanced`).
    async fn get_full_decision(
        &self,
        context: &TradingContext,
        strategy_prompt: &str,
        bias: &str,
    ) -> Result<ProducerResponse, ExecError>;
}

/// Persisted record of one trading cycle
#[derive(DebugPretty, DisplaySimple, Clone, Default, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Owning trader id
    pub trader_id: String,
    /// Monotonic cycle number
    pub cycle_number: u64,
    /// UTC ms at cycle start
    pub timestamp: i64,
    /// Producer inputs and outputs, kept even on error
    pub response: ProducerResponse,
    /// Producer error if the call failed
    pub error: Option<String>,
    /// Per-decision execution outcomes
    pub outcomes: Vec<DecisionOutcome>,
    /// Human-readable execution log lines
    pub execution_log: Vec<String>,
}

impl DecisionRecord {
    /// Start an empty record for a cycle
    pub fn new(trader_id: &str, cycle_number: u64, timestamp: i64) -> Self {
        Self {
            trader_id: trader_id.to_string(),
            cycle_number,
            timestamp,
            ..Default::default()
        }
    }

    /// Append a log line
    pub fn log(&mut self, line: impl Into<String>) {
        self.execution_log.push(line.into());
    }
}
