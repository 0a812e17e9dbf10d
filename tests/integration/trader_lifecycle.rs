//! Facade lifecycle: run/stop idempotency and cancellation promptness

#[cfg(test)]
mod tests {
    use crate::support::{FixedProducer, ScriptedVenue, StaticStrategy};
    use perp_exec::config::TraderConfig;
    use perp_exec::model::types::{OrderAction, VenueKind};
    use perp_exec::model::Decision;
    use perp_exec::store::{MemoryStore, Store};
    use perp_exec::telemetry::TelemetryHook;
    use perp_exec::trader::AutoTrader;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    fn fast_config() -> TraderConfig {
        TraderConfig::new("t1", VenueKind::Binance)
            .with_initial_balance(10_000.0)
            .with_scan_interval(Duration::from_millis(50))
    }

    fn open_decision() -> Decision {
        Decision {
            symbol: "BTCUSDT".into(),
            action: OrderAction::OpenLong,
            leverage: 10,
            position_size_usd: 100.0,
            stop_loss: 0.0,
            take_profit: 0.0,
            confidence: 60.0,
            reasoning: String::new(),
        }
    }

    async fn build(
        producer: Arc<FixedProducer>,
    ) -> (Arc<AutoTrader>, Arc<ScriptedVenue>, Arc<MemoryStore>) {
        let venue = Arc::new(ScriptedVenue::new(VenueKind::Binance));
        let store = Arc::new(MemoryStore::new());
        let trader = AutoTrader::with_driver(
            fast_config(),
            venue.clone(),
            store.clone(),
            Arc::new(StaticStrategy),
            producer,
            TelemetryHook::disabled(),
        )
        .await
        .unwrap();
        (trader, venue, store)
    }

    #[tokio::test]
    async fn test_initial_balance_recovered_from_venue() {
        let venue = Arc::new(ScriptedVenue::new(VenueKind::Binance));
        let store = Arc::new(MemoryStore::new());
        let config = TraderConfig::new("t9", VenueKind::Binance); // balance 0
        let trader = AutoTrader::with_driver(
            config,
            venue,
            store.clone(),
            Arc::new(StaticStrategy),
            Arc::new(FixedProducer::new(vec![])),
            TelemetryHook::disabled(),
        )
        .await
        .unwrap();
        assert!(!trader.is_running());
        // The scripted venue's 10k equity was persisted as initial balance.
        assert_eq!(store.get_initial_balance("t9").unwrap(), Some(10_000.0));
    }

    #[tokio::test]
    async fn test_cycle_number_resumes_from_store() {
        let venue = Arc::new(ScriptedVenue::new(VenueKind::Binance));
        let store = Arc::new(MemoryStore::new());
        store
            .log_decision(perp_exec::producer::DecisionRecord::new("t1", 41, 1))
            .unwrap();
        let trader = AutoTrader::with_driver(
            fast_config(),
            venue,
            store,
            Arc::new(StaticStrategy),
            Arc::new(FixedProducer::new(vec![])),
            TelemetryHook::disabled(),
        )
        .await
        .unwrap();
        assert_eq!(trader.cycle_number(), 41);
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_run_executes_cycles_and_stop_halts_orders() {
        let producer = Arc::new(FixedProducer::new(vec![open_decision()]));
        let (trader, venue, store) = build(producer.clone()).await;

        let runner = {
            let trader = trader.clone();
            tokio::spawn(async move { trader.run().await })
        };
        // Let a few cycles run.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(trader.is_running());
        assert!(producer.call_count() >= 1);
        assert!(venue.orders_placed() >= 1);

        trader.stop();
        runner.await.unwrap();
        assert!(!trader.is_running());

        // No further orders after stop returns.
        let placed_at_stop = venue.orders_placed();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(venue.orders_placed(), placed_at_stop);

        // Every cycle persisted a decision record and an equity snapshot.
        assert!(!store.decision_records("t1").is_empty());
        assert!(!store.equity_snapshots().is_empty());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let producer = Arc::new(FixedProducer::new(vec![]));
        let (trader, _venue, _store) = build(producer).await;
        // Stopping a never-started trader is a no-op.
        trader.stop();
        trader.stop();
        assert!(!trader.is_running());
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_paused_trader_records_skipped_cycle() {
        let producer = Arc::new(FixedProducer::new(vec![open_decision()]));
        let (trader, venue, store) = build(producer.clone()).await;
        trader.pause_until(perp_exec::venue::http::now_millis() + 60_000);

        let runner = {
            let trader = trader.clone();
            tokio::spawn(async move { trader.run().await })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;
        trader.stop();
        runner.await.unwrap();

        // Paused cycles never call the producer or place orders, but they
        // still leave a record behind.
        assert_eq!(producer.call_count(), 0);
        assert_eq!(venue.orders_placed(), 0);
        let records = store.decision_records("t1");
        assert!(!records.is_empty());
        assert!(
            records[0]
                .execution_log
                .iter()
                .any(|line| line.contains("paused"))
        );
    }
}
