//! Best-effort trade-event hook
//!
//! After a recorded trade the core emits a `TradeEvent` to an optional
//! external sink. Emission is fire-and-forget: it never blocks or fails
//! the trading loop, and events carry only opaque identifiers.

use crate::model::types::{OrderAction, VenueKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Anonymous record of one executed trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    /// Opaque trader identifier
    pub trader_id: String,
    /// Venue the trade ran on
    pub exchange_id: VenueKind,
    /// Canonical symbol
    pub symbol: String,
    /// Action that produced the trade
    pub action: OrderAction,
    /// Executed quantity, base-asset units
    pub quantity: f64,
    /// Fill price
    pub price: f64,
    /// UTC ms
    pub time: i64,
}

/// Sink for trade events
pub trait TradeEventSink: Send + Sync {
    /// Receive one event; implementations must not block
    fn emit(&self, event: TradeEvent);
}

/// Shared handle; `None` disables emission entirely
#[derive(Clone, Default)]
pub struct TelemetryHook {
    sink: Option<Arc<dyn TradeEventSink>>,
}

impl TelemetryHook {
    /// Hook wired to a sink
    pub fn new(sink: Arc<dyn TradeEventSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Disabled hook
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Emit without blocking the caller.
    pub fn emit(&self, event: TradeEvent) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        tokio::spawn(async move {
            debug!("emitting trade event for {}", event.symbol);
            sink.emit(event);
        });
    }
}
