//! Commonly used types in one import

pub use crate::config::{TraderConfig, VenueCredentials};
pub use crate::error::ExecError;
pub use crate::executor::{DecisionExecutor, GateInputs, apply_risk_gates};
pub use crate::model::{
    AccountBalance, ClosedPnlRecord, CloseType, Decision, DecisionOutcome, EquitySnapshot,
    OpenPosition, OrderAction, OrderResult, OrderStatus, OrderStatusInfo,
    PendingOrder, PositionSide, PositionStatus, SymbolPrecision, TradeRecord, TradeSide,
    TraderFill, TraderOrder, TradingContext, VenueKind, VenuePosition,
};
pub use crate::monitor::{DrawdownMonitor, PeakPnlCache, peak_key, should_emergency_close};
pub use crate::producer::{DecisionProducer, DecisionRecord, ProducerResponse};
pub use crate::rebuild::{RebuildResult, rebuild};
pub use crate::store::{FullStats, MemoryStore, PositionBuilder, Store};
pub use crate::strategy::{CoinInfo, StrategyConfig, StrategyEngine};
pub use crate::sync::{SyncWorker, sync_once};
pub use crate::telemetry::{TelemetryHook, TradeEvent, TradeEventSink};
pub use crate::trader::{AutoTrader, build_trading_context};
pub use crate::venue::{VenueDriver, build_driver};
