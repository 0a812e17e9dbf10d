//! Binance USDT-margined futures driver
//!
//! Signing: HMAC-SHA256 over the query string, hex-encoded, with the key in
//! the `X-MBX-APIKEY` header. The account is expected to run in hedge mode;
//! fills carry an explicit `positionSide`.

use crate::config::TraderConfig;
use crate::constants::{ACCOUNT_CACHE_TTL, PRECISION_CACHE_TTL, base_urls, idempotent_codes,
    trade_limits};
use crate::error::ExecError;
use crate::model::precision::decimals_of;
use crate::model::{
    AccountBalance, ClosedPnlRecord, CloseType, OrderResult, OrderStatus, OrderStatusInfo,
    PendingOrder, PendingOrderKind, PositionSide, SymbolPrecision, TradeRecord, TradeSide,
    VenueKind, VenuePosition,
};
use crate::rate_limit::{OpClass, RequestPacer};
use crate::sync::normalizer::resolve_action;
use crate::venue::VenueDriver;
use crate::venue::cache::{TtlCell, TtlMap};
use crate::venue::http::{as_f64, as_i64, build_client, json_body, now_millis, send_with_retry};
use crate::venue::sign::hmac_sha256_hex;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

const RECV_WINDOW: &str = "5000";

/// Binance futures driver
pub struct BinanceDriver {
    base_url: String,
    client: Client,
    api_key: String,
    api_secret: String,
    pacer: RequestPacer,
    balance_cache: TtlCell<AccountBalance>,
    position_cache: TtlCell<Vec<VenuePosition>>,
    precision_cache: TtlMap<SymbolPrecision>,
}

impl BinanceDriver {
    /// Build a driver from trader config
    pub fn new(config: &TraderConfig) -> Result<Self, ExecError> {
        let (key, secret) = config.credentials.require_hmac()?;
        Ok(Self {
            base_url: base_urls::BINANCE.to_string(),
            client: build_client(config.http_timeout)?,
            api_key: key.to_string(),
            api_secret: secret.to_string(),
            pacer: RequestPacer::new(),
            balance_cache: TtlCell::new(ACCOUNT_CACHE_TTL),
            position_cache: TtlCell::new(ACCOUNT_CACHE_TTL),
            precision_cache: TtlMap::new(PRECISION_CACHE_TTL),
        })
    }

    /// Point the driver at a different base URL (tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn sign_query(&self, params: &[(&str, String)]) -> Result<String, ExecError> {
        let mut query: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        query.push(format!("timestamp={}", now_millis()));
        query.push(format!("recvWindow={RECV_WINDOW}"));
        let joined = query.join("&");
        let signature = hmac_sha256_hex(&self.api_secret, &joined)?;
        Ok(format!("{joined}&signature={signature}"))
    }

    async fn signed_request(
        &self,
        method: reqwest::Method,
        path: &str,
        params: &[(&str, String)],
        class: OpClass,
    ) -> Result<Value, ExecError> {
        self.pacer.acquire(class).await;
        let query = self.sign_query(params)?;
        let url = format!("{}{}?{}", self.base_url, path, query);
        let builder = self
            .client
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.api_key);
        let resp = send_with_retry(builder).await?;
        let body = json_body(resp).await;
        match body {
            Ok(v) => check_body(v),
            Err(ExecError::Venue { code, message }) => {
                // HTTP-level rejections still carry the JSON error body.
                match serde_json::from_str::<Value>(&message) {
                    Ok(v) => Err(venue_error(&v)),
                    Err(_) => Err(ExecError::Venue { code, message }),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn public_get(&self, path: &str, query: &str) -> Result<Value, ExecError> {
        self.pacer.acquire(OpClass::MarketData).await;
        let url = if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        };
        let resp = send_with_retry(self.client.get(&url)).await?;
        json_body(resp).await
    }

    async fn precision(&self, symbol: &str) -> Result<SymbolPrecision, ExecError> {
        if let Some(p) = self.precision_cache.get(symbol).await {
            return Ok(p);
        }
        let body = self
            .public_get("/fapi/v1/exchangeInfo", &format!("symbol={symbol}"))
            .await?;
        let info = body["symbols"]
            .as_array()
            .and_then(|a| a.first())
            .ok_or_else(|| ExecError::UnknownSymbol(symbol.to_string()))?;

        let mut tick_size = 0.0;
        let mut step_size = 0.0;
        if let Some(filters) = info["filters"].as_array() {
            for f in filters {
                match f["filterType"].as_str() {
                    Some("PRICE_FILTER") => tick_size = as_f64(&f["tickSize"]),
                    Some("LOT_SIZE") => step_size = as_f64(&f["stepSize"]),
                    _ => {}
                }
            }
        }
        let p = SymbolPrecision {
            price_precision: info["pricePrecision"].as_u64().unwrap_or(2) as u32,
            quantity_precision: decimals_of(&format!("{step_size}")).max(
                info["quantityPrecision"].as_u64().unwrap_or(3) as u32,
            ),
            tick_size,
            step_size,
        };
        self.precision_cache.put(symbol, p.clone()).await;
        Ok(p)
    }

    async fn invalidate_account_caches(&self) {
        self.balance_cache.invalidate().await;
        self.position_cache.invalidate().await;
    }

    async fn place_market(
        &self,
        symbol: &str,
        side: TradeSide,
        position_side: PositionSide,
        qty_str: &str,
    ) -> Result<OrderResult, ExecError> {
        let params = [
            ("symbol", symbol.to_string()),
            ("side", side.as_str().to_string()),
            ("positionSide", position_side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", qty_str.to_string()),
        ];
        let body = self
            .signed_request(reqwest::Method::POST, "/fapi/v1/order", &params, OpClass::Trading)
            .await?;
        self.invalidate_account_caches().await;
        Ok(OrderResult {
            order_id: order_id_of(&body),
            symbol: symbol.to_string(),
            status: parse_status(body["status"].as_str().unwrap_or("NEW")),
            quantity: as_f64(&body["origQty"]),
            avg_price: as_f64(&body["avgPrice"]),
        })
    }

    async fn open(
        &self,
        symbol: &str,
        qty: f64,
        leverage: u32,
        position_side: PositionSide,
    ) -> Result<OrderResult, ExecError> {
        self.cancel_all_orders(symbol).await.ok();
        if let Err(e) = self.set_leverage(symbol, leverage).await {
            warn!("leverage setup for {} failed, continuing: {}", symbol, e);
        }
        let qty_str = self.format_quantity(symbol, qty).await?;
        let side = match position_side {
            PositionSide::Short => TradeSide::Sell,
            _ => TradeSide::Buy,
        };
        self.place_market(symbol, side, position_side, &qty_str).await
    }

    async fn close(
        &self,
        symbol: &str,
        mut qty: f64,
        position_side: PositionSide,
    ) -> Result<OrderResult, ExecError> {
        if qty <= 0.0 {
            let positions = self.get_positions().await?;
            qty = positions
                .iter()
                .find(|p| p.symbol == symbol && p.side == position_side)
                .map(|p| p.position_amt)
                .unwrap_or(0.0);
        }
        if qty <= 0.0 {
            return Ok(OrderResult::no_position(symbol));
        }
        let qty_str = self.format_quantity(symbol, qty).await?;
        let side = match position_side {
            PositionSide::Short => TradeSide::Buy,
            _ => TradeSide::Sell,
        };
        let result = self.place_market(symbol, side, position_side, &qty_str).await?;
        self.cancel_stop_orders(symbol).await.ok();
        Ok(result)
    }

    async fn place_trigger(
        &self,
        symbol: &str,
        side: PositionSide,
        qty: f64,
        trigger: f64,
        order_type: &str,
    ) -> Result<(), ExecError> {
        let precision = self.precision(symbol).await?;
        let trade_side = match side {
            PositionSide::Short => TradeSide::Buy,
            _ => TradeSide::Sell,
        };
        let mut params = vec![
            ("symbol", symbol.to_string()),
            ("side", trade_side.as_str().to_string()),
            ("positionSide", side.as_str().to_string()),
            ("type", order_type.to_string()),
            ("stopPrice", precision.format_price(trigger)),
        ];
        if qty > 0.0 {
            params.push(("quantity", precision.format_quantity(qty)));
        } else {
            params.push(("closePosition", "true".to_string()));
        }
        self.signed_request(reqwest::Method::POST, "/fapi/v1/order", &params, OpClass::Trading)
            .await?;
        Ok(())
    }
}

fn order_id_of(body: &Value) -> String {
    match &body["orderId"] {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => String::new(),
    }
}

fn parse_status(status: &str) -> OrderStatus {
    match status {
        "NEW" => OrderStatus::New,
        "PARTIALLY_FILLED" => OrderStatus::PartiallyFilled,
        "FILLED" => OrderStatus::Filled,
        "CANCELED" => OrderStatus::Canceled,
        "EXPIRED" => OrderStatus::Expired,
        _ => OrderStatus::Rejected,
    }
}

fn venue_error(body: &Value) -> ExecError {
    ExecError::Venue {
        code: as_i64(&body["code"]).to_string(),
        message: body["msg"].as_str().unwrap_or("").to_string(),
    }
}

/// Error bodies come back with HTTP 200 on some endpoints; a `code` field
/// other than 0/200 marks them.
fn check_body(body: Value) -> Result<Value, ExecError> {
    if body.is_object() && body.get("code").is_some() && body.get("msg").is_some() {
        let code = as_i64(&body["code"]);
        if code != 0 && code != 200 {
            return Err(venue_error(&body));
        }
    }
    Ok(body)
}

fn is_idempotent_ok(err: &ExecError) -> bool {
    match err {
        ExecError::Venue { code, .. } => {
            matches!(
                code.parse::<i64>().unwrap_or(0),
                idempotent_codes::BINANCE_LEVERAGE_UNCHANGED
                    | idempotent_codes::BINANCE_MARGIN_UNCHANGED
            )
        }
        _ => false,
    }
}

#[async_trait]
impl VenueDriver for BinanceDriver {
    fn venue(&self) -> VenueKind {
        VenueKind::Binance
    }

    async fn get_balance(&self) -> Result<AccountBalance, ExecError> {
        if let Some(cached) = self.balance_cache.get().await {
            return Ok(cached);
        }
        let body = self
            .signed_request(reqwest::Method::GET, "/fapi/v2/account", &[], OpClass::Account)
            .await?;
        let balance = AccountBalance {
            total_equity: as_f64(&body["totalMarginBalance"]),
            total_wallet_balance: as_f64(&body["totalWalletBalance"]),
            available_balance: as_f64(&body["availableBalance"]),
            total_unrealized_profit: as_f64(&body["totalUnrealizedProfit"]),
        };
        self.balance_cache.put(balance.clone()).await;
        Ok(balance)
    }

    async fn get_positions(&self) -> Result<Vec<VenuePosition>, ExecError> {
        if let Some(cached) = self.position_cache.get().await {
            return Ok(cached);
        }
        let body = self
            .signed_request(
                reqwest::Method::GET,
                "/fapi/v2/positionRisk",
                &[],
                OpClass::Account,
            )
            .await?;
        let mut positions = Vec::new();
        for p in body.as_array().into_iter().flatten() {
            let amt = as_f64(&p["positionAmt"]);
            if amt.abs() < 1e-12 {
                continue;
            }
            let side = match p["positionSide"].as_str() {
                Some("LONG") => PositionSide::Long,
                Some("SHORT") => PositionSide::Short,
                // One-way mode: the sign of the net amount carries direction.
                _ => {
                    if amt > 0.0 {
                        PositionSide::Long
                    } else {
                        PositionSide::Short
                    }
                }
            };
            positions.push(VenuePosition {
                symbol: p["symbol"].as_str().unwrap_or_default().to_string(),
                side,
                position_amt: amt.abs(),
                entry_price: as_f64(&p["entryPrice"]),
                mark_price: as_f64(&p["markPrice"]),
                unrealized_profit: as_f64(&p["unRealizedProfit"]),
                leverage: as_f64(&p["leverage"]) as u32,
                liquidation_price: as_f64(&p["liquidationPrice"]),
                created_time: match as_i64(&p["updateTime"]) {
                    0 => None,
                    t => Some(t),
                },
            });
        }
        self.position_cache.put(positions.clone()).await;
        Ok(positions)
    }

    async fn open_long(
        &self,
        symbol: &str,
        qty: f64,
        leverage: u32,
    ) -> Result<OrderResult, ExecError> {
        self.open(symbol, qty, leverage, PositionSide::Long).await
    }

    async fn open_short(
        &self,
        symbol: &str,
        qty: f64,
        leverage: u32,
    ) -> Result<OrderResult, ExecError> {
        self.open(symbol, qty, leverage, PositionSide::Short).await
    }

    async fn close_long(&self, symbol: &str, qty: f64) -> Result<OrderResult, ExecError> {
        self.close(symbol, qty, PositionSide::Long).await
    }

    async fn close_short(&self, symbol: &str, qty: f64) -> Result<OrderResult, ExecError> {
        self.close(symbol, qty, PositionSide::Short).await
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExecError> {
        let params = [
            ("symbol", symbol.to_string()),
            ("leverage", leverage.to_string()),
        ];
        match self
            .signed_request(reqwest::Method::POST, "/fapi/v1/leverage", &params, OpClass::Trading)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_idempotent_ok(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn set_margin_mode(&self, symbol: &str, is_cross: bool) -> Result<(), ExecError> {
        let mode = if is_cross { "CROSSED" } else { "ISOLATED" };
        let params = [
            ("symbol", symbol.to_string()),
            ("marginType", mode.to_string()),
        ];
        match self
            .signed_request(
                reqwest::Method::POST,
                "/fapi/v1/marginType",
                &params,
                OpClass::Trading,
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_idempotent_ok(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn get_market_price(&self, symbol: &str) -> Result<f64, ExecError> {
        let body = self
            .public_get("/fapi/v1/ticker/price", &format!("symbol={symbol}"))
            .await?;
        let price = as_f64(&body["price"]);
        if price <= 0.0 {
            return Err(ExecError::UnknownSymbol(symbol.to_string()));
        }
        Ok(price)
    }

    async fn set_stop_loss(
        &self,
        symbol: &str,
        side: PositionSide,
        qty: f64,
        trigger: f64,
    ) -> Result<(), ExecError> {
        self.place_trigger(symbol, side, qty, trigger, "STOP_MARKET")
            .await
    }

    async fn set_take_profit(
        &self,
        symbol: &str,
        side: PositionSide,
        qty: f64,
        trigger: f64,
    ) -> Result<(), ExecError> {
        self.place_trigger(symbol, side, qty, trigger, "TAKE_PROFIT_MARKET")
            .await
    }

    async fn cancel_stop_orders(&self, symbol: &str) -> Result<(), ExecError> {
        let pending = self.get_open_orders(symbol).await?;
        for order in pending
            .iter()
            .filter(|o| matches!(o.kind, PendingOrderKind::StopLoss | PendingOrderKind::TakeProfit))
        {
            let params = [
                ("symbol", symbol.to_string()),
                ("orderId", order.order_id.clone()),
            ];
            if let Err(e) = self
                .signed_request(
                    reqwest::Method::DELETE,
                    "/fapi/v1/order",
                    &params,
                    OpClass::Trading,
                )
                .await
            {
                warn!("cancel stop order {} on {} failed: {}", order.order_id, symbol, e);
            }
        }
        Ok(())
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<(), ExecError> {
        let params = [("symbol", symbol.to_string())];
        match self
            .signed_request(
                reqwest::Method::DELETE,
                "/fapi/v1/allOpenOrders",
                &params,
                OpClass::Trading,
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(ExecError::Venue { code, .. })
                if code.parse::<i64>().unwrap_or(0)
                    == idempotent_codes::BINANCE_INVALID_SYMBOL =>
            {
                Ok(())
            }
            Err(e) => {
                warn!("cancel all orders on {} failed: {}", symbol, e);
                Ok(())
            }
        }
    }

    async fn format_quantity(&self, symbol: &str, qty: f64) -> Result<String, ExecError> {
        let precision = self.precision(symbol).await?;
        Ok(precision.format_quantity(qty))
    }

    async fn get_order_status(
        &self,
        symbol: &str,
        order_id: &str,
    ) -> Result<OrderStatusInfo, ExecError> {
        let params = [
            ("symbol", symbol.to_string()),
            ("orderId", order_id.to_string()),
        ];
        let body = match self
            .signed_request(reqwest::Method::GET, "/fapi/v1/order", &params, OpClass::Account)
            .await
        {
            Ok(v) => v,
            Err(ExecError::Venue { code, .. }) if code == "-2013" => {
                return Err(ExecError::OrderNotFound(order_id.to_string()));
            }
            Err(e) => return Err(e),
        };

        // Commission lives on the fills, not the order row.
        let fill_params = [
            ("symbol", symbol.to_string()),
            ("orderId", order_id.to_string()),
        ];
        let commission = match self
            .signed_request(
                reqwest::Method::GET,
                "/fapi/v1/userTrades",
                &fill_params,
                OpClass::History,
            )
            .await
        {
            Ok(fills) => fills
                .as_array()
                .into_iter()
                .flatten()
                .map(|f| as_f64(&f["commission"]))
                .sum(),
            Err(e) => {
                debug!("commission lookup for {} failed: {}", order_id, e);
                0.0
            }
        };

        Ok(OrderStatusInfo {
            order_id: order_id.to_string(),
            status: parse_status(body["status"].as_str().unwrap_or("NEW")),
            avg_price: as_f64(&body["avgPrice"]),
            executed_qty: as_f64(&body["executedQty"]),
            commission,
        })
    }

    async fn get_trades(
        &self,
        start_time: i64,
        limit: u32,
    ) -> Result<Vec<TradeRecord>, ExecError> {
        let params = [
            ("startTime", start_time.to_string()),
            ("limit", limit.to_string()),
        ];
        let body = self
            .signed_request(
                reqwest::Method::GET,
                "/fapi/v1/userTrades",
                &params,
                OpClass::History,
            )
            .await?;
        let mut trades = Vec::new();
        for f in body.as_array().into_iter().flatten() {
            let side = match f["side"].as_str() {
                Some("SELL") => TradeSide::Sell,
                _ => TradeSide::Buy,
            };
            let position_side = match f["positionSide"].as_str() {
                Some("LONG") => PositionSide::Long,
                Some("SHORT") => PositionSide::Short,
                _ => PositionSide::Both,
            };
            let realized_pnl = as_f64(&f["realizedPnl"]);
            trades.push(TradeRecord {
                trade_id: as_i64(&f["id"]).to_string(),
                symbol: f["symbol"].as_str().unwrap_or_default().to_string(),
                side,
                position_side,
                order_action: resolve_action(position_side, side, realized_pnl),
                price: as_f64(&f["price"]),
                quantity: as_f64(&f["qty"]).abs(),
                realized_pnl,
                fee: as_f64(&f["commission"]),
                time: as_i64(&f["time"]),
            });
        }
        trades.sort_by_key(|t| t.time);
        Ok(trades)
    }

    async fn get_closed_pnl(
        &self,
        start_time: i64,
        limit: u32,
    ) -> Result<Vec<ClosedPnlRecord>, ExecError> {
        let params = [
            ("incomeType", "REALIZED_PNL".to_string()),
            ("startTime", start_time.to_string()),
            ("limit", limit.to_string()),
        ];
        let body = self
            .signed_request(reqwest::Method::GET, "/fapi/v1/income", &params, OpClass::History)
            .await?;
        let mut records = Vec::new();
        for r in body.as_array().into_iter().flatten() {
            let pnl = as_f64(&r["income"]);
            records.push(ClosedPnlRecord {
                symbol: r["symbol"].as_str().unwrap_or_default().to_string(),
                // The income stream does not carry a book side.
                side: PositionSide::Both,
                entry_price: 0.0,
                exit_price: 0.0,
                quantity: 0.0,
                realized_pnl: pnl,
                fee: 0.0,
                entry_time: as_i64(&r["time"]),
                exit_time: as_i64(&r["time"]),
                close_type: CloseType::Unknown,
            });
        }
        records.sort_by_key(|r| r.exit_time);
        Ok(records)
    }

    async fn get_open_orders(&self, symbol: &str) -> Result<Vec<PendingOrder>, ExecError> {
        let params = [("symbol", symbol.to_string())];
        let body = self
            .signed_request(
                reqwest::Method::GET,
                "/fapi/v1/openOrders",
                &params,
                OpClass::Account,
            )
            .await?;
        let mut orders = Vec::new();
        for o in body.as_array().into_iter().flatten() {
            let kind = match o["type"].as_str() {
                Some("STOP_MARKET") | Some("STOP") => PendingOrderKind::StopLoss,
                Some("TAKE_PROFIT_MARKET") | Some("TAKE_PROFIT") => PendingOrderKind::TakeProfit,
                _ => PendingOrderKind::Limit,
            };
            orders.push(PendingOrder {
                order_id: order_id_of(o),
                symbol: o["symbol"].as_str().unwrap_or_default().to_string(),
                kind,
                side: match o["side"].as_str() {
                    Some("SELL") => TradeSide::Sell,
                    _ => TradeSide::Buy,
                },
                price: {
                    let stop = as_f64(&o["stopPrice"]);
                    if stop > 0.0 { stop } else { as_f64(&o["price"]) }
                },
                quantity: as_f64(&o["origQty"]),
            });
        }
        Ok(orders)
    }

    fn trade_limit(&self) -> u32 {
        trade_limits::BINANCE
    }
}
