//! Position builder
//!
//! Applies normalized trades to the store's open-position rows and emits
//! closed round-trips. Processing is idempotent at the fill level because
//! the sync worker dedupes fills before calling in; re-applying an already
//! recorded trade is prevented upstream.

use crate::constants::QTY_EPSILON;
use crate::error::ExecError;
use crate::model::types::{CloseType, OrderAction, PositionSide, VenueKind};
use crate::model::{ClosedPnlRecord, OpenPosition, PositionStatus, TradeRecord};
use crate::store::Store;
use std::sync::Arc;
use tracing::{debug, warn};

/// Store-backed trade processor for one trader on one venue
pub struct PositionBuilder {
    trader_id: String,
    exchange_id: VenueKind,
    store: Arc<dyn Store>,
}

impl PositionBuilder {
    /// Builder bound to a trader and venue
    pub fn new(trader_id: impl Into<String>, exchange_id: VenueKind, store: Arc<dyn Store>) -> Self {
        Self {
            trader_id: trader_id.into(),
            exchange_id,
            store,
        }
    }

    /// Apply one normalized trade to the position state.
    pub fn process_trade(&self, trade: &TradeRecord) -> Result<(), ExecError> {
        match trade.order_action {
            OrderAction::OpenLong | OrderAction::OpenShort => self.apply_open(trade),
            OrderAction::CloseLong | OrderAction::CloseShort => self.apply_close(trade),
            OrderAction::Hold | OrderAction::Wait => Ok(()),
        }
    }

    fn side_of(action: OrderAction) -> PositionSide {
        match action {
            OrderAction::OpenShort | OrderAction::CloseShort => PositionSide::Short,
            _ => PositionSide::Long,
        }
    }

    fn apply_open(&self, trade: &TradeRecord) -> Result<(), ExecError> {
        let side = Self::side_of(trade.order_action);
        match self
            .store
            .get_open_position_by_symbol(&self.trader_id, &trade.symbol, side)?
        {
            Some(mut position) => {
                // Extend the lot with a quantity-weighted entry.
                let total = position.quantity + trade.quantity;
                if total > 0.0 {
                    position.entry_price = (position.entry_price * position.quantity
                        + trade.price * trade.quantity)
                        / total;
                }
                position.quantity = total;
                self.store.update_open_position(position)?;
            }
            None => {
                self.store.create_open_position(OpenPosition {
                    trader_id: self.trader_id.clone(),
                    exchange_id: self.exchange_id,
                    symbol: trade.symbol.clone(),
                    side,
                    quantity: trade.quantity,
                    entry_price: trade.price,
                    entry_order_id: trade.trade_id.clone(),
                    entry_time: trade.time,
                    leverage: 0,
                    is_cross_margin: true,
                    status: PositionStatus::Open,
                    source: "sync".into(),
                })?;
            }
        }
        debug!(
            "applied open {} {} qty {}",
            trade.symbol,
            side.label(),
            trade.quantity
        );
        Ok(())
    }

    fn apply_close(&self, trade: &TradeRecord) -> Result<(), ExecError> {
        let side = Self::side_of(trade.order_action);
        let existing = self
            .store
            .get_open_position_by_symbol(&self.trader_id, &trade.symbol, side)?;

        let (entry_price, entry_time) = match &existing {
            Some(p) => (p.entry_price, p.entry_time),
            None => {
                // Mid-history close: reconstruct the entry from the PnL.
                let per_unit = if trade.quantity > 0.0 {
                    trade.realized_pnl / trade.quantity
                } else {
                    0.0
                };
                let entry = match side {
                    PositionSide::Short => trade.price + per_unit,
                    _ => trade.price - per_unit,
                };
                (entry, trade.time)
            }
        };

        if entry_price > 0.0 && trade.price > 0.0 && trade.quantity > 0.0 {
            self.store.insert_closed_position(
                &self.trader_id,
                ClosedPnlRecord {
                    symbol: trade.symbol.clone(),
                    side,
                    entry_price,
                    exit_price: trade.price,
                    quantity: trade.quantity,
                    realized_pnl: trade.realized_pnl,
                    fee: trade.fee,
                    entry_time,
                    exit_time: trade.time,
                    close_type: CloseType::Unknown,
                },
            )?;
        } else {
            warn!(
                "skipping unreconstructable close {} on {}",
                trade.trade_id, trade.symbol
            );
        }

        if let Some(mut position) = existing {
            position.quantity -= trade.quantity;
            if position.quantity <= QTY_EPSILON {
                position.quantity = 0.0;
                position.status = PositionStatus::Closed;
            }
            self.store.update_open_position(position)?;
        }
        Ok(())
    }
}
