//! Bybit v5 linear-perpetual driver
//!
//! Signing: HMAC-SHA256 over `timestamp + apiKey + recvWindow + payload`
//! carried in `X-BAPI-*` headers. Hedge mode maps books onto `positionIdx`
//! 1 (long) and 2 (short).

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
use crate::model::types::OrderAction;
use crate::venue::VenueDriver;
use crate::venue::cache::{TtlCell, TtlMap};
use crate::venue::http::{as_f64, as_i64, build_client, encode_query, json_body, now_millis,
    send_with_retry};
use crate::venue::sign::hmac_sha256_hex;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::warn;

const RECV_WINDOW: &str = "5000";
const CATEGORY: &str = "linear";

/// Bybit v5 driver
pub struct BybitDriver {
    base_url: String,
    client: Client,
    api_key: String,
    api_secret: String,
    pacer: RequestPacer,
    balance_cache: TtlCell<AccountBalance>,
    position_cache: TtlCell<Vec<VenuePosition>>,
    precision_cache: TtlMap<SymbolPrecision>,
}

fn position_idx(side: PositionSide) -> u8 {
    match side {
        PositionSide::Short => 2,
        _ => 1,
    }
}

impl BybitDriver {
    /// Build a driver from trader config
    pub fn new(config: &TraderConfig) -> Result<Self, ExecError> {
        let (key, secret) = config.credentials.require_hmac()?;
        Ok(Self {
            base_url: base_urls::BYBIT.to_string(),
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

    fn auth_headers(&self, payload: &str) -> Result<Vec<(&'static str, String)>, ExecError> {
        let timestamp = now_millis().to_string();
        let to_sign = format!("{timestamp}{}{RECV_WINDOW}{payload}", self.api_key);
        let signature = hmac_sha256_hex(&self.api_secret, &to_sign)?;
        Ok(vec![
            ("X-BAPI-API-KEY", self.api_key.clone()),
            ("X-BAPI-TIMESTAMP", timestamp),
            ("X-BAPI-RECV-WINDOW", RECV_WINDOW.to_string()),
            ("X-BAPI-SIGN", signature),
        ])
    }

    async fn signed_get(
        &self,
        path: &str,
        params: &[(&str, String)],
        class: OpClass,
    ) -> Result<Value, ExecError> {
        self.pacer.acquire(class).await;
        let query = encode_query(params);
        let mut builder = self
            .client
            .get(format!("{}{}?{}", self.base_url, path, query));
        for (name, value) in self.auth_headers(&query)? {
            builder = builder.header(name, value);
        }
        let resp = send_with_retry(builder).await?;
        check_ret(json_body(resp).await?)
    }

    async fn signed_post(&self, path: &str, body: Value) -> Result<Value, ExecError> {
        self.pacer.acquire(OpClass::Trading).await;
        let payload = body.to_string();
        let mut builder = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("Content-Type", "application/json")
            .body(payload.clone());
        for (name, value) in self.auth_headers(&payload)? {
            builder = builder.header(name, value);
        }
        let resp = send_with_retry(builder).await?;
        check_ret(json_body(resp).await?)
    }

    async fn precision(&self, symbol: &str) -> Result<SymbolPrecision, ExecError> {
        if let Some(p) = self.precision_cache.get(symbol).await {
            return Ok(p);
        }
        self.pacer.acquire(OpClass::MarketData).await;
        let url = format!(
            "{}/v5/market/instruments-info?category={CATEGORY}&symbol={symbol}",
            self.base_url
        );
        let body = check_ret(json_body(send_with_retry(self.client.get(&url)).await?).await?)?;
        let info = body["result"]["list"]
            .as_array()
            .and_then(|a| a.first())
            .ok_or_else(|| ExecError::UnknownSymbol(symbol.to_string()))?;
        let tick = info["priceFilter"]["tickSize"].as_str().unwrap_or("0.01");
        let step = info["lotSizeFilter"]["qtyStep"].as_str().unwrap_or("0.001");
        let p = SymbolPrecision {
            price_precision: decimals_of(tick),
            quantity_precision: decimals_of(step),
            tick_size: tick.parse().unwrap_or(0.01),
            step_size: step.parse().unwrap_or(0.001),
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
        reduce_only: bool,
    ) -> Result<OrderResult, ExecError> {
        let wire_side = match side {
            TradeSide::Buy => "Buy",
            TradeSide::Sell => "Sell",
        };
        let body = json!({
            "category": CATEGORY,
            "symbol": symbol,
            "side": wire_side,
            "orderType": "Market",
            "qty": qty_str,
            "positionIdx": position_idx(position_side),
            "reduceOnly": reduce_only,
        });
        let resp = self.signed_post("/v5/order/create", body).await?;
        self.invalidate_account_caches().await;
        Ok(OrderResult {
            order_id: resp["result"]["orderId"].as_str().unwrap_or("").to_string(),
            symbol: symbol.to_string(),
            status: OrderStatus::New,
            quantity: qty_str.parse().unwrap_or(0.0),
            avg_price: 0.0,
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
        self.place_market(symbol, side, position_side, &qty_str, false)
            .await
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
        let result = self
            .place_market(symbol, side, position_side, &qty_str, true)
            .await?;
        self.cancel_stop_orders(symbol).await.ok();
        Ok(result)
    }
}

fn check_ret(body: Value) -> Result<Value, ExecError> {
    let ret_code = as_i64(&body["retCode"]);
    if ret_code != 0 {
        return Err(ExecError::Venue {
            code: ret_code.to_string(),
            message: body["retMsg"].as_str().unwrap_or("").to_string(),
        });
    }
    Ok(body)
}

fn is_idempotent_ok(err: &ExecError) -> bool {
    match err {
        ExecError::Venue { code, .. } => matches!(
            code.parse::<i64>().unwrap_or(0),
            idempotent_codes::BYBIT_LEVERAGE_UNCHANGED | idempotent_codes::BYBIT_MARGIN_UNCHANGED
        ),
        _ => false,
    }
}

fn parse_status(status: &str) -> OrderStatus {
    match status {
        "New" | "Untriggered" | "Created" => OrderStatus::New,
        "PartiallyFilled" => OrderStatus::PartiallyFilled,
        "Filled" => OrderStatus::Filled,
        "Cancelled" | "PartiallyFilledCanceled" => OrderStatus::Canceled,
        "Deactivated" => OrderStatus::Expired,
        _ => OrderStatus::Rejected,
    }
}

#[async_trait]
impl VenueDriver for BybitDriver {
    fn venue(&self) -> VenueKind {
        VenueKind::Bybit
    }

    async fn get_balance(&self) -> Result<AccountBalance, ExecError> {
        if let Some(cached) = self.balance_cache.get().await {
            return Ok(cached);
        }
        let params = [("accountType", "UNIFIED".to_string())];
        let body = self
            .signed_get("/v5/account/wallet-balance", &params, OpClass::Account)
            .await?;
        let account = body["result"]["list"]
            .as_array()
            .and_then(|a| a.first())
            .ok_or_else(|| ExecError::InvalidResponse("empty wallet-balance list".into()))?;
        let balance = AccountBalance {
            total_equity: as_f64(&account["totalEquity"]),
            total_wallet_balance: as_f64(&account["totalWalletBalance"]),
            available_balance: as_f64(&account["totalAvailableBalance"]),
            total_unrealized_profit: as_f64(&account["totalPerpUPL"]),
        };
        self.balance_cache.put(balance.clone()).await;
        Ok(balance)
    }

    async fn get_positions(&self) -> Result<Vec<VenuePosition>, ExecError> {
        if let Some(cached) = self.position_cache.get().await {
            return Ok(cached);
        }
        let params = [
            ("category", CATEGORY.to_string()),
            ("settleCoin", "USDT".to_string()),
        ];
        let body = self
            .signed_get("/v5/position/list", &params, OpClass::Account)
            .await?;
        let mut positions = Vec::new();
        for p in body["result"]["list"].as_array().into_iter().flatten() {
            let size = as_f64(&p["size"]);
            if size <= 0.0 {
                continue;
            }
            let side = match p["side"].as_str() {
                Some("Sell") => PositionSide::Short,
                _ => PositionSide::Long,
            };
            positions.push(VenuePosition {
                symbol: p["symbol"].as_str().unwrap_or_default().to_string(),
                side,
                position_amt: size,
                entry_price: as_f64(&p["avgPrice"]),
                mark_price: as_f64(&p["markPrice"]),
                unrealized_profit: as_f64(&p["unrealisedPnl"]),
                leverage: as_f64(&p["leverage"]) as u32,
                liquidation_price: as_f64(&p["liqPrice"]),
                created_time: match as_i64(&p["createdTime"]) {
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
        let body = json!({
            "category": CATEGORY,
            "symbol": symbol,
            "buyLeverage": leverage.to_string(),
            "sellLeverage": leverage.to_string(),
        });
        match self.signed_post("/v5/position/set-leverage", body).await {
            Ok(_) => Ok(()),
            Err(e) if is_idempotent_ok(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn set_margin_mode(&self, symbol: &str, is_cross: bool) -> Result<(), ExecError> {
        let body = json!({
            "category": CATEGORY,
            "symbol": symbol,
            "tradeMode": if is_cross { 0 } else { 1 },
            "buyLeverage": "10",
            "sellLeverage": "10",
        });
        match self.signed_post("/v5/position/switch-isolated", body).await {
            Ok(_) => Ok(()),
            Err(e) if is_idempotent_ok(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn get_market_price(&self, symbol: &str) -> Result<f64, ExecError> {
        self.pacer.acquire(OpClass::MarketData).await;
        let url = format!(
            "{}/v5/market/tickers?category={CATEGORY}&symbol={symbol}",
            self.base_url
        );
        let body = check_ret(json_body(send_with_retry(self.client.get(&url)).await?).await?)?;
        let price = body["result"]["list"]
            .as_array()
            .and_then(|a| a.first())
            .map(|t| as_f64(&t["lastPrice"]))
            .unwrap_or(0.0);
        if price <= 0.0 {
            return Err(ExecError::UnknownSymbol(symbol.to_string()));
        }
        Ok(price)
    }

    async fn set_stop_loss(
        &self,
        symbol: &str,
        side: PositionSide,
        _qty: f64,
        trigger: f64,
    ) -> Result<(), ExecError> {
        let precision = self.precision(symbol).await?;
        let body = json!({
            "category": CATEGORY,
            "symbol": symbol,
            "positionIdx": position_idx(side),
            "stopLoss": precision.format_price(trigger),
        });
        self.signed_post("/v5/position/trading-stop", body).await?;
        Ok(())
    }

    async fn set_take_profit(
        &self,
        symbol: &str,
        side: PositionSide,
        _qty: f64,
        trigger: f64,
    ) -> Result<(), ExecError> {
        let precision = self.precision(symbol).await?;
        let body = json!({
            "category": CATEGORY,
            "symbol": symbol,
            "positionIdx": position_idx(side),
            "takeProfit": precision.format_price(trigger),
        });
        self.signed_post("/v5/position/trading-stop", body).await?;
        Ok(())
    }

    async fn cancel_stop_orders(&self, symbol: &str) -> Result<(), ExecError> {
        // Position-attached SL/TP clear with value "0", per book.
        for idx in [1u8, 2] {
            let body = json!({
                "category": CATEGORY,
                "symbol": symbol,
                "positionIdx": idx,
                "stopLoss": "0",
                "takeProfit": "0",
            });
            if let Err(e) = self.signed_post("/v5/position/trading-stop", body).await {
                warn!("clearing trading stop on {} (idx {}) failed: {}", symbol, idx, e);
            }
        }
        Ok(())
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<(), ExecError> {
        let body = json!({
            "category": CATEGORY,
            "symbol": symbol,
        });
        if let Err(e) = self.signed_post("/v5/order/cancel-all", body).await {
            warn!("cancel all orders on {} failed: {}", symbol, e);
        }
        Ok(())
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
            ("category", CATEGORY.to_string()),
            ("symbol", symbol.to_string()),
            ("orderId", order_id.to_string()),
        ];
        let body = self
            .signed_get("/v5/order/realtime", &params, OpClass::Account)
            .await?;
        let order = match body["result"]["list"].as_array().and_then(|a| a.first()) {
            Some(o) => o.clone(),
            None => {
                // Filled orders drop out of realtime; history has them.
                let body = self
                    .signed_get("/v5/order/history", &params, OpClass::Account)
                    .await?;
                body["result"]["list"]
                    .as_array()
                    .and_then(|a| a.first())
                    .cloned()
                    .ok_or_else(|| ExecError::OrderNotFound(order_id.to_string()))?
            }
        };
        Ok(OrderStatusInfo {
            order_id: order_id.to_string(),
            status: parse_status(order["orderStatus"].as_str().unwrap_or("")),
            avg_price: as_f64(&order["avgPrice"]),
            executed_qty: as_f64(&order["cumExecQty"]),
            commission: as_f64(&order["cumExecFee"]),
        })
    }

    async fn get_trades(
        &self,
        start_time: i64,
        limit: u32,
    ) -> Result<Vec<TradeRecord>, ExecError> {
        let params = [
            ("category", CATEGORY.to_string()),
            ("startTime", start_time.to_string()),
            ("limit", limit.min(self.trade_limit()).to_string()),
        ];
        let body = self
            .signed_get("/v5/execution/list", &params, OpClass::History)
            .await?;
        let mut trades = Vec::new();
        for f in body["result"]["list"].as_array().into_iter().flatten() {
            let side = match f["side"].as_str() {
                Some("Sell") => TradeSide::Sell,
                _ => TradeSide::Buy,
            };
            let closed_size = as_f64(&f["closedSize"]);
            let realized_pnl = as_f64(&f["execPnl"]);
            // positionIdx is absent on the execution stream; a fill that
            // reduced size is a close and the direction flips.
            let order_action = if closed_size > 0.0 {
                match side {
                    TradeSide::Buy => OrderAction::CloseShort,
                    TradeSide::Sell => OrderAction::CloseLong,
                }
            } else {
                match side {
                    TradeSide::Buy => OrderAction::OpenLong,
                    TradeSide::Sell => OrderAction::OpenShort,
                }
            };
            let position_side = order_action.position_side().unwrap_or(PositionSide::Both);
            trades.push(TradeRecord {
                trade_id: f["execId"].as_str().unwrap_or_default().to_string(),
                symbol: f["symbol"].as_str().unwrap_or_default().to_string(),
                side,
                position_side,
                order_action,
                price: as_f64(&f["execPrice"]),
                quantity: as_f64(&f["execQty"]).abs(),
                realized_pnl,
                fee: as_f64(&f["execFee"]),
                time: as_i64(&f["execTime"]),
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
            ("category", CATEGORY.to_string()),
            ("startTime", start_time.to_string()),
            ("limit", limit.to_string()),
        ];
        let body = self
            .signed_get("/v5/position/closed-pnl", &params, OpClass::History)
            .await?;
        let mut records = Vec::new();
        for r in body["result"]["list"].as_array().into_iter().flatten() {
            // side on the closed-pnl row is the *closing* order side.
            let side = match r["side"].as_str() {
                Some("Buy") => PositionSide::Short,
                _ => PositionSide::Long,
            };
            records.push(ClosedPnlRecord {
                symbol: r["symbol"].as_str().unwrap_or_default().to_string(),
                side,
                entry_price: as_f64(&r["avgEntryPrice"]),
                exit_price: as_f64(&r["avgExitPrice"]),
                quantity: as_f64(&r["qty"]),
                realized_pnl: as_f64(&r["closedPnl"]),
                fee: as_f64(&r["openFee"]) + as_f64(&r["closeFee"]),
                entry_time: as_i64(&r["createdTime"]),
                exit_time: as_i64(&r["updatedTime"]),
                close_type: CloseType::Unknown,
            });
        }
        records.sort_by_key(|r| r.exit_time);
        Ok(records)
    }

    async fn get_open_orders(&self, symbol: &str) -> Result<Vec<PendingOrder>, ExecError> {
        let params = [
            ("category", CATEGORY.to_string()),
            ("symbol", symbol.to_string()),
        ];
        let body = self
            .signed_get("/v5/order/realtime", &params, OpClass::Account)
            .await?;
        let mut orders = Vec::new();
        for o in body["result"]["list"].as_array().into_iter().flatten() {
            let stop_type = o["stopOrderType"].as_str().unwrap_or("");
            let kind = match stop_type {
                "StopLoss" | "Stop" => PendingOrderKind::StopLoss,
                "TakeProfit" | "PartialTakeProfit" => PendingOrderKind::TakeProfit,
                _ => PendingOrderKind::Limit,
            };
            orders.push(PendingOrder {
                order_id: o["orderId"].as_str().unwrap_or_default().to_string(),
                symbol: o["symbol"].as_str().unwrap_or_default().to_string(),
                kind,
                side: match o["side"].as_str() {
                    Some("Sell") => TradeSide::Sell,
                    _ => TradeSide::Buy,
                },
                price: {
                    let trigger = as_f64(&o["triggerPrice"]);
                    if trigger > 0.0 { trigger } else { as_f64(&o["price"]) }
                },
                quantity: as_f64(&o["qty"]),
            });
        }
        Ok(orders)
    }

    fn trade_limit(&self) -> u32 {
        trade_limits::BYBIT
    }
}
