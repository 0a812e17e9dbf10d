//! Sync-worker dedupe against the in-memory store

#[cfg(test)]
mod tests {
    use crate::support::ScriptedVenue;
    use perp_exec::model::types::{OrderAction, PositionSide, TradeSide, VenueKind};
    use perp_exec::model::{TradeRecord, TraderFill};
    use perp_exec::store::{MemoryStore, PositionBuilder, Store};
    use perp_exec::sync::sync_once;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn fill_record(trade_id: &str, time: i64) -> TradeRecord {
        TradeRecord {
            trade_id: trade_id.into(),
            symbol: "BTCUSDT".into(),
            side: TradeSide::Buy,
            position_side: PositionSide::Long,
            order_action: OrderAction::OpenLong,
            price: 50_000.0,
            quantity: 0.1,
            realized_pnl: 0.0,
            fee: 0.5,
            time,
        }
    }

    #[tokio::test]
    async fn test_sync_skips_already_recorded_fills() {
        let venue = ScriptedVenue::new(VenueKind::Binance);
        *venue.trades.lock().await = vec![fill_record("T1", 1_000), fill_record("T2", 2_000)];
        let store = Arc::new(MemoryStore::new());
        let builder = PositionBuilder::new("t1", VenueKind::Binance, store.clone());

        // Seed T1 as if a previous pass recorded it.
        store
            .insert_fill(TraderFill {
                trader_id: "t1".into(),
                exchange_id: VenueKind::Binance,
                trade_id: "T1".into(),
                order_id: "T1".into(),
                symbol: "BTCUSDT".into(),
                side: TradeSide::Buy,
                price: 50_000.0,
                quantity: 0.1,
                realized_pnl: 0.0,
                fee: 0.5,
                time: 1_000,
            })
            .unwrap();

        sync_once("t1", &venue, store.as_ref(), &builder, 0)
            .await
            .unwrap();
        assert_eq!(store.fill_count(), 2);
        assert!(store.has_fill(VenueKind::Binance, "T2").unwrap());
    }

    #[tokio::test]
    async fn test_second_pass_creates_zero_rows() {
        let venue = ScriptedVenue::new(VenueKind::Binance);
        *venue.trades.lock().await = vec![fill_record("T1", 1_000), fill_record("T2", 2_000)];
        let store = Arc::new(MemoryStore::new());
        let builder = PositionBuilder::new("t1", VenueKind::Binance, store.clone());

        sync_once("t1", &venue, store.as_ref(), &builder, 0)
            .await
            .unwrap();
        let after_first = store.fill_count();
        assert_eq!(after_first, 2);

        // Unchanged venue state: the second pass is a no-op.
        sync_once("t1", &venue, store.as_ref(), &builder, 0)
            .await
            .unwrap();
        assert_eq!(store.fill_count(), after_first);

        // Position state is unchanged too: one open long of 0.2 total.
        let open = store
            .get_open_position_by_symbol("t1", "BTCUSDT", PositionSide::Long)
            .unwrap()
            .unwrap();
        assert!((open.quantity - 0.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_sync_builds_positions_from_new_fills() {
        let venue = ScriptedVenue::new(VenueKind::Binance);
        let mut close = fill_record("T3", 3_000);
        close.side = TradeSide::Sell;
        close.order_action = OrderAction::CloseLong;
        close.realized_pnl = 100.0;
        close.price = 51_000.0;
        *venue.trades.lock().await = vec![fill_record("T1", 1_000), close];
        let store = Arc::new(MemoryStore::new());
        let builder = PositionBuilder::new("t1", VenueKind::Binance, store.clone());

        sync_once("t1", &venue, store.as_ref(), &builder, 0)
            .await
            .unwrap();
        let closed = store.get_closed_positions("t1").unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].entry_price, 50_000.0);
        assert_eq!(closed[0].exit_price, 51_000.0);
    }
}
