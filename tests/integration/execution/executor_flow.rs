//! Executor behavior end-to-end against a scripted venue

#[cfg(test)]
mod tests {
    use crate::support::ScriptedVenue;
    use perp_exec::config::TraderConfig;
    use perp_exec::executor::DecisionExecutor;
    use perp_exec::model::types::{OrderAction, PositionSide, VenueKind};
    use perp_exec::model::{AccountBalance, Decision, VenuePosition};
    use perp_exec::producer::DecisionRecord;
    use perp_exec::store::MemoryStore;
    use perp_exec::telemetry::TelemetryHook;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn setup() -> (Arc<ScriptedVenue>, Arc<MemoryStore>, DecisionExecutor) {
        let venue = Arc::new(ScriptedVenue::new(VenueKind::Binance));
        let store = Arc::new(MemoryStore::new());
        let config = TraderConfig::new("t1", VenueKind::Binance);
        let executor = DecisionExecutor::new(
            config,
            venue.clone(),
            store.clone(),
            TelemetryHook::disabled(),
        );
        (venue, store, executor)
    }

    fn open_decision(size: f64, leverage: u32) -> Decision {
        Decision {
            symbol: "BTCUSDT".into(),
            action: OrderAction::OpenLong,
            leverage,
            position_size_usd: size,
            stop_loss: 48_000.0,
            take_profit: 55_000.0,
            confidence: 70.0,
            reasoning: "test".into(),
        }
    }

    #[tokio::test]
    async fn test_clamped_open_places_capped_quantity() {
        let (venue, _store, executor) = setup();
        *venue.balance.lock().await = AccountBalance {
            total_equity: 1_000.0,
            total_wallet_balance: 1_000.0,
            available_balance: 1_000.0,
            total_unrealized_profit: 0.0,
        };

        // Requested 8000 on BTC with equity 1000: ratio cap 5000 binds.
        let mut record = DecisionRecord::new("t1", 1, 0);
        let outcome = executor.execute(open_decision(8_000.0, 10), &mut record).await;
        assert!(outcome.success, "open failed: {:?}", outcome.error);
        assert!((outcome.decision.position_size_usd - 5_000.0).abs() < 0.01);

        // Quantity placed = clamped size / price (scripted at 50000).
        let opens = venue.open_call_details().await;
        assert_eq!(opens.len(), 1);
        assert!((opens[0].1 - 0.1).abs() < 1e-9);
        // The clamp is visible in the execution log.
        assert!(record.execution_log.iter().any(|l| l.contains("clamped")));
    }

    #[tokio::test]
    async fn test_rejected_open_records_failure_and_places_nothing() {
        let (venue, _store, executor) = setup();
        // Affordability clamps 100 USDT down to ~9.6, under the 12 floor.
        *venue.balance.lock().await = AccountBalance {
            total_equity: 10.0,
            total_wallet_balance: 10.0,
            available_balance: 1.0,
            total_unrealized_profit: 0.0,
        };
        let mut record = DecisionRecord::new("t1", 1, 0);
        let outcome = executor.execute(open_decision(100.0, 10), &mut record).await;
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
        assert_eq!(venue.orders_placed(), 0);
    }

    #[tokio::test]
    async fn test_close_uses_local_quantity_first() {
        let (venue, store, executor) = setup();
        // Local row says 0.3; the venue reports 0.5. Local wins.
        use perp_exec::model::{OpenPosition, PositionStatus};
        use perp_exec::store::Store;
        store
            .create_open_position(OpenPosition {
                trader_id: "t1".into(),
                exchange_id: VenueKind::Binance,
                symbol: "BTCUSDT".into(),
                side: PositionSide::Long,
                quantity: 0.3,
                entry_price: 49_000.0,
                entry_order_id: "o0".into(),
                entry_time: 1,
                leverage: 10,
                is_cross_margin: true,
                status: PositionStatus::Open,
                source: "test".into(),
            })
            .unwrap();
        *venue.positions.lock().await = vec![VenuePosition {
            symbol: "BTCUSDT".into(),
            side: PositionSide::Long,
            position_amt: 0.5,
            entry_price: 49_000.0,
            mark_price: 50_000.0,
            unrealized_profit: 500.0,
            leverage: 10,
            liquidation_price: 0.0,
            created_time: None,
        }];

        let decision = Decision {
            symbol: "BTCUSDT".into(),
            action: OrderAction::CloseLong,
            leverage: 0,
            position_size_usd: 0.0,
            stop_loss: 0.0,
            take_profit: 0.0,
            confidence: 80.0,
            reasoning: String::new(),
        };
        let mut record = DecisionRecord::new("t1", 1, 0);
        let outcome = executor.execute(decision, &mut record).await;
        assert!(outcome.success);
        // Scripted venue received the local 0.3, not the venue 0.5.
        let closes = venue.close_call_details().await;
        assert_eq!(closes.len(), 1);
        assert!((closes[0].1 - 0.3).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_close_with_nothing_open_is_successful_noop() {
        let (venue, _store, executor) = setup();
        let decision = Decision {
            symbol: "BTCUSDT".into(),
            action: OrderAction::CloseShort,
            leverage: 0,
            position_size_usd: 0.0,
            stop_loss: 0.0,
            take_profit: 0.0,
            confidence: 80.0,
            reasoning: String::new(),
        };
        let mut record = DecisionRecord::new("t1", 1, 0);
        let outcome = executor.execute(decision, &mut record).await;
        assert!(outcome.success);
        assert_eq!(venue.orders_placed(), 0);
    }

    #[tokio::test]
    async fn test_hold_is_recorded_noop() {
        let (venue, _store, executor) = setup();
        let decision = Decision {
            symbol: "BTCUSDT".into(),
            action: OrderAction::Hold,
            leverage: 0,
            position_size_usd: 0.0,
            stop_loss: 0.0,
            take_profit: 0.0,
            confidence: 50.0,
            reasoning: String::new(),
        };
        let mut record = DecisionRecord::new("t1", 1, 0);
        let outcome = executor.execute(decision, &mut record).await;
        assert!(outcome.success);
        assert_eq!(venue.orders_placed(), 0);
        assert!(record.execution_log.iter().any(|l| l.contains("hold")));
    }
}
