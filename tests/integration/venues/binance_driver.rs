//! Binance driver against a mocked fapi surface

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};
    use perp_exec::config::{TraderConfig, VenueCredentials};
    use perp_exec::model::{OrderAction, OrderStatus, PositionSide, VenueKind};
    use perp_exec::venue::VenueDriver;
    use perp_exec::venue::binance::BinanceDriver;
    use pretty_assertions::assert_eq;

    fn driver(server: &mockito::ServerGuard) -> BinanceDriver {
        let config = TraderConfig::new("t1", VenueKind::Binance).with_credentials(
            VenueCredentials {
                api_key: Some("test-key".into()),
                api_secret: Some("test-secret".into()),
                ..Default::default()
            },
        );
        BinanceDriver::new(&config)
            .unwrap()
            .with_base_url(server.url())
    }

    #[tokio::test]
    async fn test_get_balance_parses_account() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/fapi/v2/account")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "totalMarginBalance": "10500.5",
                    "totalWalletBalance": "10000.0",
                    "availableBalance": "8000.25",
                    "totalUnrealizedProfit": "500.5"
                }"#,
            )
            .create_async()
            .await;

        let balance = driver(&server).get_balance().await.unwrap();
        assert_eq!(balance.total_equity, 10500.5);
        assert_eq!(balance.total_wallet_balance, 10000.0);
        assert_eq!(balance.available_balance, 8000.25);
        assert_eq!(balance.total_unrealized_profit, 500.5);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_positions_always_positive_with_side_labels() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/fapi/v2/positionRisk")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"[
                    {"symbol": "BTCUSDT", "positionSide": "LONG", "positionAmt": "0.5",
                     "entryPrice": "60000", "markPrice": "61000", "unRealizedProfit": "500",
                     "leverage": "10", "liquidationPrice": "54000", "updateTime": 1700000000000},
                    {"symbol": "ETHUSDT", "positionSide": "SHORT", "positionAmt": "-2.0",
                     "entryPrice": "3000", "markPrice": "2900", "unRealizedProfit": "200",
                     "leverage": "5", "liquidationPrice": "3600", "updateTime": 1700000000001},
                    {"symbol": "SOLUSDT", "positionSide": "LONG", "positionAmt": "0",
                     "entryPrice": "0", "markPrice": "150", "unRealizedProfit": "0",
                     "leverage": "10", "liquidationPrice": "0", "updateTime": 0}
                ]"#,
            )
            .create_async()
            .await;

        let positions = driver(&server).get_positions().await.unwrap();
        assert_eq!(positions.len(), 2);
        for p in &positions {
            assert!(p.position_amt > 0.0);
        }
        assert_eq!(positions[0].side, PositionSide::Long);
        assert_eq!(positions[1].side, PositionSide::Short);
        assert_eq!(positions[1].position_amt, 2.0);
    }

    #[tokio::test]
    async fn test_format_quantity_floors_to_step() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/fapi/v1/exchangeInfo")
            .match_query(Matcher::UrlEncoded("symbol".into(), "BTCUSDT".into()))
            .with_status(200)
            .with_body(
                r#"{"symbols": [{
                    "symbol": "BTCUSDT", "pricePrecision": 2, "quantityPrecision": 3,
                    "filters": [
                        {"filterType": "PRICE_FILTER", "tickSize": "0.10"},
                        {"filterType": "LOT_SIZE", "stepSize": "0.001"}
                    ]
                }]}"#,
            )
            .create_async()
            .await;

        let d = driver(&server);
        let formatted = d.format_quantity("BTCUSDT", 0.12399).await.unwrap();
        assert_eq!(formatted, "0.123");
        // Idempotent: formatting the formatted value changes nothing.
        let again = d
            .format_quantity("BTCUSDT", formatted.parse().unwrap())
            .await
            .unwrap();
        assert_eq!(again, formatted);
    }

    #[tokio::test]
    async fn test_close_long_without_position_is_noop() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/fapi/v2/positionRisk")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        // No order endpoint is mocked: placing one would fail the test.
        let result = driver(&server).close_long("BTCUSDT", 0.0).await.unwrap();
        assert_eq!(result.status, OrderStatus::NoPosition);
        assert!(result.order_id.is_empty());
    }

    #[tokio::test]
    async fn test_leverage_unchanged_code_is_success() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/fapi/v1/leverage")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code": -2030, "msg": "No need to change leverage."}"#)
            .create_async()
            .await;
        assert!(driver(&server).set_leverage("BTCUSDT", 10).await.is_ok());
    }

    #[tokio::test]
    async fn test_margin_insufficient_bubbles_up() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/fapi/v1/leverage")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code": -2019, "msg": "Margin is insufficient."}"#)
            .create_async()
            .await;
        let err = driver(&server).set_leverage("BTCUSDT", 10).await.unwrap_err();
        assert!(err.to_string().contains("-2019"));
    }

    #[tokio::test]
    async fn test_get_trades_normalizes_hedge_fills() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/fapi/v1/userTrades")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"[
                    {"id": 2, "symbol": "ETHUSDT", "side": "SELL", "positionSide": "LONG",
                     "price": "3600", "qty": "0.1", "realizedPnl": "10.0",
                     "commission": "0.5", "time": 1700000002000},
                    {"id": 1, "symbol": "ETHUSDT", "side": "BUY", "positionSide": "LONG",
                     "price": "3500", "qty": "0.1", "realizedPnl": "0",
                     "commission": "0.5", "time": 1700000001000}
                ]"#,
            )
            .create_async()
            .await;

        let trades = driver(&server).get_trades(0, 1000).await.unwrap();
        assert_eq!(trades.len(), 2);
        // Sorted ascending by time.
        assert_eq!(trades[0].trade_id, "1");
        assert_eq!(trades[0].order_action, OrderAction::OpenLong);
        assert_eq!(trades[1].order_action, OrderAction::CloseLong);
        assert_eq!(trades[1].realized_pnl, 10.0);
    }

    #[tokio::test]
    async fn test_market_price_rejects_unknown_symbol() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/fapi/v1/ticker/price")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"symbol": "NOPEUSDT", "price": "0"}"#)
            .create_async()
            .await;
        assert!(driver(&server).get_market_price("NOPEUSDT").await.is_err());
    }
}
