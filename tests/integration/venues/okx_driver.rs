//! OKX driver against a mocked v5 surface: contract conversion and
//! position-mode handling

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server, ServerGuard};
    use perp_exec::config::{TraderConfig, VenueCredentials};
    use perp_exec::model::{PositionSide, VenueKind};
    use perp_exec::venue::VenueDriver;
    use perp_exec::venue::okx::OkxDriver;
    use pretty_assertions::assert_eq;

    async fn driver(server: &mut ServerGuard, pos_mode: &str) -> OkxDriver {
        server
            .mock("GET", "/api/v5/account/config")
            .with_status(200)
            .with_body(format!(
                r#"{{"code": "0", "data": [{{"posMode": "{pos_mode}"}}]}}"#
            ))
            .create_async()
            .await;
        let config = TraderConfig::new("t1", VenueKind::Okx).with_credentials(
            VenueCredentials {
                api_key: Some("test-key".into()),
                api_secret: Some("test-secret".into()),
                passphrase: Some("test-pass".into()),
                ..Default::default()
            },
        );
        let url = server.url();
        OkxDriver::connect_to(&config, &url).await.unwrap()
    }

    async fn mock_instrument(server: &mut ServerGuard) {
        server
            .mock("GET", "/api/v5/public/instruments")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"code": "0", "data": [{
                    "instId": "ETH-USDT-SWAP", "ctVal": "0.1",
                    "tickSz": "0.01", "lotSz": "1"
                }]}"#,
            )
            .create_async()
            .await;
    }

    #[tokio::test]
    async fn test_positions_convert_contracts_to_base_units() {
        let mut server = Server::new_async().await;
        let d = driver(&mut server, "long_short_mode").await;
        mock_instrument(&mut server).await;
        server
            .mock("GET", "/api/v5/account/positions")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"code": "0", "data": [{
                    "instId": "ETH-USDT-SWAP", "posSide": "long", "pos": "20",
                    "avgPx": "3000", "markPx": "3100", "upl": "200",
                    "lever": "10", "liqPx": "2700", "cTime": "1700000000000"
                }]}"#,
            )
            .create_async()
            .await;

        let positions = d.get_positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        let p = &positions[0];
        // 20 contracts x ctVal 0.1 = 2 ETH, canonical symbol restored.
        assert_eq!(p.symbol, "ETHUSDT");
        assert!((p.position_amt - 2.0).abs() < 1e-9);
        assert_eq!(p.side, PositionSide::Long);
    }

    #[tokio::test]
    async fn test_net_mode_infers_side_from_sign() {
        let mut server = Server::new_async().await;
        let d = driver(&mut server, "net_mode").await;
        mock_instrument(&mut server).await;
        server
            .mock("GET", "/api/v5/account/positions")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"code": "0", "data": [{
                    "instId": "ETH-USDT-SWAP", "posSide": "net", "pos": "-30",
                    "avgPx": "3000", "markPx": "2900", "upl": "300",
                    "lever": "5", "liqPx": "3500", "cTime": "1700000000000"
                }]}"#,
            )
            .create_async()
            .await;

        let positions = d.get_positions().await.unwrap();
        assert_eq!(positions[0].side, PositionSide::Short);
        assert!((positions[0].position_amt - 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_market_price_via_canonical_symbol() {
        let mut server = Server::new_async().await;
        let d = driver(&mut server, "net_mode").await;
        server
            .mock("GET", "/api/v5/market/ticker")
            .match_query(Matcher::UrlEncoded("instId".into(), "ETH-USDT-SWAP".into()))
            .with_status(200)
            .with_body(r#"{"code": "0", "data": [{"last": "3123.4"}]}"#)
            .create_async()
            .await;
        let price = d.get_market_price("ETHUSDT").await.unwrap();
        assert_eq!(price, 3123.4);
    }

    #[tokio::test]
    async fn test_error_code_with_item_detail() {
        let mut server = Server::new_async().await;
        let d = driver(&mut server, "net_mode").await;
        server
            .mock("GET", "/api/v5/account/balance")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"code": "50110", "msg": "Invalid IP", "data": []}"#)
            .create_async()
            .await;
        let err = d.get_balance().await.unwrap_err();
        assert!(err.to_string().contains("50110"));
    }
}
