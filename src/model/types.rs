//! Core enumerations shared across the execution core

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported venues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueKind {
    /// Binance USDT-margined futures
    Binance,
    /// Bybit v5 linear perpetuals
    Bybit,
    /// OKX v5 swaps
    Okx,
    /// Bitget USDT-margined mix
    Bitget,
    /// Gate.io USDT futures
    Gate,
    /// Hyperliquid L1 perps (including HIP-3 builder dexes)
    Hyperliquid,
    /// Aster on-chain futures
    Aster,
    /// Lighter zk perps
    Lighter,
}

impl VenueKind {
    /// Stable identifier used as the store `exchangeId`
    pub fn as_str(&self) -> &'static str {
        match self {
            VenueKind::Binance => "binance",
            VenueKind::Bybit => "bybit",
            VenueKind::Okx => "okx",
            VenueKind::Bitget => "bitget",
            VenueKind::Gate => "gate",
            VenueKind::Hyperliquid => "hyperliquid",
            VenueKind::Aster => "aster",
            VenueKind::Lighter => "lighter",
        }
    }

    /// Venues whose fills are reconciled by a background sync worker.
    ///
    /// The executor skips order-status polling for these and lets the
    /// worker converge the store instead.
    pub fn has_sync_worker(&self) -> bool {
        !matches!(self, VenueKind::Hyperliquid)
    }
}

impl fmt::Display for VenueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VenueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "binance" => Ok(VenueKind::Binance),
            "bybit" => Ok(VenueKind::Bybit),
            "okx" => Ok(VenueKind::Okx),
            "bitget" => Ok(VenueKind::Bitget),
            "gate" | "gateio" | "gate.io" => Ok(VenueKind::Gate),
            "hyperliquid" => Ok(VenueKind::Hyperliquid),
            "aster" => Ok(VenueKind::Aster),
            "lighter" => Ok(VenueKind::Lighter),
            other => Err(format!("unsupported exchange: {other}")),
        }
    }
}

/// Taker direction of a fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    /// Bought base asset
    Buy,
    /// Sold base asset
    Sell,
}

impl TradeSide {
    /// Wire form used by Binance-family venues
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }
}

/// Which book a fill belongs to in hedge mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    /// Long book
    Long,
    /// Short book
    Short,
    /// One-way mode: the venue reports a single net book
    Both,
}

impl PositionSide {
    /// Wire form used by Binance-family venues
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Long => "LONG",
            PositionSide::Short => "SHORT",
            PositionSide::Both => "BOTH",
        }
    }

    /// Output label (`long`/`short`) for normalized positions
    pub fn label(&self) -> &'static str {
        match self {
            PositionSide::Long => "long",
            PositionSide::Short => "short",
            PositionSide::Both => "both",
        }
    }
}

/// Trading intent attached to a decision or a normalized fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    /// Open or add to a long position
    OpenLong,
    /// Open or add to a short position
    OpenShort,
    /// Reduce or close a long position
    CloseLong,
    /// Reduce or close a short position
    CloseShort,
    /// Keep current exposure
    Hold,
    /// Stay flat
    Wait,
}

impl OrderAction {
    /// Canonical snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderAction::OpenLong => "open_long",
            OrderAction::OpenShort => "open_short",
            OrderAction::CloseLong => "close_long",
            OrderAction::CloseShort => "close_short",
            OrderAction::Hold => "hold",
            OrderAction::Wait => "wait",
        }
    }

    /// True for the two open actions
    pub fn is_open(&self) -> bool {
        matches!(self, OrderAction::OpenLong | OrderAction::OpenShort)
    }

    /// True for the two close actions
    pub fn is_close(&self) -> bool {
        matches!(self, OrderAction::CloseLong | OrderAction::CloseShort)
    }

    /// The book this action works on; `None` for hold/wait
    pub fn position_side(&self) -> Option<PositionSide> {
        match self {
            OrderAction::OpenLong | OrderAction::CloseLong => Some(PositionSide::Long),
            OrderAction::OpenShort | OrderAction::CloseShort => Some(PositionSide::Short),
            OrderAction::Hold | OrderAction::Wait => None,
        }
    }

    /// Execution ordering within a cycle: closes free capacity first.
    pub fn priority(&self) -> u8 {
        match self {
            OrderAction::CloseLong | OrderAction::CloseShort => 1,
            OrderAction::OpenLong | OrderAction::OpenShort => 2,
            OrderAction::Hold | OrderAction::Wait => 3,
        }
    }
}

impl FromStr for OrderAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open_long" => Ok(OrderAction::OpenLong),
            "open_short" => Ok(OrderAction::OpenShort),
            "close_long" => Ok(OrderAction::CloseLong),
            "close_short" => Ok(OrderAction::CloseShort),
            "hold" => Ok(OrderAction::Hold),
            "wait" => Ok(OrderAction::Wait),
            other => Err(format!("unknown action: {other}")),
        }
    }
}

/// How a round-trip was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseType {
    /// Closed by a decision or user
    Manual,
    /// Stop-loss trigger
    StopLoss,
    /// Take-profit trigger
    TakeProfit,
    /// Forced by the venue
    Liquidation,
    /// Source not recoverable from trade history
    Unknown,
}

impl CloseType {
    /// Canonical snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseType::Manual => "manual",
            CloseType::StopLoss => "stop_loss",
            CloseType::TakeProfit => "take_profit",
            CloseType::Liquidation => "liquidation",
            CloseType::Unknown => "unknown",
        }
    }
}

/// Normalized exchange order states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Accepted, nothing filled
    New,
    /// Some quantity filled
    PartiallyFilled,
    /// Fully filled
    Filled,
    /// Canceled before completion
    Canceled,
    /// Expired (IOC remainder, GTD timeout)
    Expired,
    /// Rejected by the matching engine
    Rejected,
    /// Close requested but no position was open; successful no-op
    NoPosition,
}

impl OrderStatus {
    /// Wire-style name
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Expired => "EXPIRED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::NoPosition => "NO_POSITION",
        }
    }

    /// Terminal states will not change on further polling
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::New | OrderStatus::PartiallyFilled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_priority_ordering() {
        assert!(OrderAction::CloseLong.priority() < OrderAction::OpenLong.priority());
        assert!(OrderAction::OpenShort.priority() < OrderAction::Hold.priority());
        assert_eq!(OrderAction::Hold.priority(), OrderAction::Wait.priority());
    }

    #[test]
    fn test_action_round_trip() {
        for action in [
            OrderAction::OpenLong,
            OrderAction::OpenShort,
            OrderAction::CloseLong,
            OrderAction::CloseShort,
            OrderAction::Hold,
            OrderAction::Wait,
        ] {
            assert_eq!(action.as_str().parse::<OrderAction>().unwrap(), action);
        }
    }

    #[test]
    fn test_venue_parse() {
        assert_eq!("Gate.io".parse::<VenueKind>().unwrap(), VenueKind::Gate);
        assert!("kraken".parse::<VenueKind>().is_err());
    }
}
