//! Bybit driver against a mocked v5 surface

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};
    use perp_exec::config::{TraderConfig, VenueCredentials};
    use perp_exec::model::{PositionSide, VenueKind};
    use perp_exec::venue::VenueDriver;
    use perp_exec::venue::bybit::BybitDriver;
    use pretty_assertions::assert_eq;

    fn driver(server: &mockito::ServerGuard) -> BybitDriver {
        let config = TraderConfig::new("t1", VenueKind::Bybit).with_credentials(
            VenueCredentials {
                api_key: Some("test-key".into()),
                api_secret: Some("test-secret".into()),
                ..Default::default()
            },
        );
        BybitDriver::new(&config).unwrap().with_base_url(server.url())
    }

    #[tokio::test]
    async fn test_wallet_balance_parse() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v5/account/wallet-balance")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"retCode": 0, "retMsg": "OK", "result": {"list": [{
                    "totalEquity": "5100.5",
                    "totalWalletBalance": "5000",
                    "totalAvailableBalance": "4200",
                    "totalPerpUPL": "100.5"
                }]}}"#,
            )
            .create_async()
            .await;

        let balance = driver(&server).get_balance().await.unwrap();
        assert_eq!(balance.total_equity, 5100.5);
        assert_eq!(balance.available_balance, 4200.0);
    }

    #[tokio::test]
    async fn test_positions_skip_empty_and_label_sides() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v5/position/list")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"retCode": 0, "retMsg": "OK", "result": {"list": [
                    {"symbol": "BTCUSDT", "side": "Buy", "size": "0.4", "avgPrice": "60000",
                     "markPrice": "60500", "unrealisedPnl": "200", "leverage": "10",
                     "liqPrice": "54000", "createdTime": "1700000000000"},
                    {"symbol": "ETHUSDT", "side": "None", "size": "0", "avgPrice": "0",
                     "markPrice": "0", "unrealisedPnl": "0", "leverage": "0",
                     "liqPrice": "", "createdTime": "0"}
                ]}}"#,
            )
            .create_async()
            .await;

        let positions = driver(&server).get_positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].side, PositionSide::Long);
        assert_eq!(positions[0].created_time, Some(1700000000000));
    }

    #[tokio::test]
    async fn test_ret_code_error_maps_to_venue_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v5/account/wallet-balance")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"retCode": 10003, "retMsg": "API key is invalid."}"#)
            .create_async()
            .await;
        let err = driver(&server).get_balance().await.unwrap_err();
        assert!(err.to_string().contains("10003"));
    }

    #[tokio::test]
    async fn test_leverage_not_modified_is_success() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v5/position/set-leverage")
            .with_status(200)
            .with_body(r#"{"retCode": 110043, "retMsg": "Set leverage not modified"}"#)
            .create_async()
            .await;
        assert!(driver(&server).set_leverage("BTCUSDT", 10).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_pnl_records() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v5/position/closed-pnl")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"retCode": 0, "retMsg": "OK", "result": {"list": [{
                    "symbol": "SOLUSDT", "side": "Sell", "qty": "10",
                    "avgEntryPrice": "100", "avgExitPrice": "105",
                    "closedPnl": "48.8", "openFee": "0.6", "closeFee": "0.6",
                    "createdTime": "1700000000000", "updatedTime": "1700000100000"
                }]}}"#,
            )
            .create_async()
            .await;

        let records = driver(&server).get_closed_pnl(0, 100).await.unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        // Closing side Sell means the round-trip was a long.
        assert_eq!(r.side, PositionSide::Long);
        assert_eq!(r.entry_price, 100.0);
        assert_eq!(r.exit_price, 105.0);
        assert!((r.fee - 1.2).abs() < 1e-9);
    }
}
