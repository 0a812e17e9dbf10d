//! Bitget USDT-futures (v2 mix) driver
//!
//! Signing follows the OKX shape: HMAC-SHA256 of
//! `timestamp + method + path + body`, Base64 encoded, in `ACCESS-*`
//! headers, with an epoch-millisecond timestamp. Success is body code
//! `"00000"`. Hedge books ride on `holdSide`/`tradeSide`.

use crate::config::TraderConfig;
use crate::constants::{ACCOUNT_CACHE_TTL, PRECISION_CACHE_TTL, base_urls, idempotent_codes,
    trade_limits};
use crate::error::ExecError;
use crate::model::types::OrderAction;
use crate::model::{
    AccountBalance, ClosedPnlRecord, CloseType, OrderResult, OrderStatus, OrderStatusInfo,
    PendingOrder, PendingOrderKind, PositionSide, SymbolPrecision, TradeRecord, TradeSide,
    VenueKind, VenuePosition,
};
use crate::rate_limit::{OpClass, RequestPacer};
use crate::sync::normalizer::oneway_action;
use crate::venue::VenueDriver;
use crate::venue::cache::{TtlCell, TtlMap};
use crate::venue::http::{as_f64, as_i64, build_client, json_body, now_millis, send_with_retry};
use crate::venue::sign::hmac_sha256_b64;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::warn;

const PRODUCT_TYPE: &str = "USDT-FUTURES";
const MARGIN_COIN: &str = "USDT";

/// Bitget mix driver
pub struct BitgetDriver {
    base_url: String,
    client: Client,
    api_key: String,
    api_secret: String,
    passphrase: String,
    pacer: RequestPacer,
    balance_cache: TtlCell<AccountBalance>,
    position_cache: TtlCell<Vec<VenuePosition>>,
    precision_cache: TtlMap<SymbolPrecision>,
}

impl BitgetDriver {
    /// Build a driver from trader config
    pub fn new(config: &TraderConfig) -> Result<Self, ExecError> {
        let (key, secret) = config.credentials.require_hmac()?;
        let passphrase = config.credentials.require_passphrase()?;
        Ok(Self {
            base_url: base_urls::BITGET.to_string(),
            client: build_client(config.http_timeout)?,
            api_key: key.to_string(),
            api_secret: secret.to_string(),
            passphrase: passphrase.to_string(),
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

    fn auth_headers(
        &self,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<Vec<(&'static str, String)>, ExecError> {
        let timestamp = now_millis().to_string();
        let to_sign = format!("{timestamp}{method}{path}{body}");
        let signature = hmac_sha256_b64(&self.api_secret, &to_sign)?;
        Ok(vec![
            ("ACCESS-KEY", self.api_key.clone()),
            ("ACCESS-SIGN", signature),
            ("ACCESS-TIMESTAMP", timestamp),
            ("ACCESS-PASSPHRASE", self.passphrase.clone()),
            ("Content-Type", "application/json".to_string()),
            ("locale", "en-US".to_string()),
        ])
    }

    async fn signed_get(&self, path_and_query: &str, class: OpClass) -> Result<Value, ExecError> {
        self.pacer.acquire(class).await;
        let mut builder = self
            .client
            .get(format!("{}{}", self.base_url, path_and_query));
        for (name, value) in self.auth_headers("GET", path_and_query, "")? {
            builder = builder.header(name, value);
        }
        check_code(json_body(send_with_retry(builder).await?).await?)
    }

    async fn signed_post(&self, path: &str, body: Value) -> Result<Value, ExecError> {
        self.pacer.acquire(OpClass::Trading).await;
        let payload = body.to_string();
        let mut builder = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .body(payload.clone());
        for (name, value) in self.auth_headers("POST", path, &payload)? {
            builder = builder.header(name, value);
        }
        check_code(json_body(send_with_retry(builder).await?).await?)
    }

    async fn precision(&self, symbol: &str) -> Result<SymbolPrecision, ExecError> {
        if let Some(p) = self.precision_cache.get(symbol).await {
            return Ok(p);
        }
        let body = self
            .signed_get(
                &format!("/api/v2/mix/market/contracts?productType={PRODUCT_TYPE}&symbol={symbol}"),
                OpClass::MarketData,
            )
            .await?;
        let contract = body["data"]
            .as_array()
            .and_then(|a| a.first())
            .ok_or_else(|| ExecError::UnknownSymbol(symbol.to_string()))?;
        let price_place = as_i64(&contract["pricePlace"]) as u32;
        let volume_place = as_i64(&contract["volumePlace"]) as u32;
        let p = SymbolPrecision::from_decimals(price_place, volume_place);
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
        position_side: PositionSide,
        qty_str: &str,
        closing: bool,
    ) -> Result<OrderResult, ExecError> {
        // Hedge mode: `side` names the book, `tradeSide` open/close.
        let side = match position_side {
            PositionSide::Short => "sell",
            _ => "buy",
        };
        let body = json!({
            "symbol": symbol,
            "productType": PRODUCT_TYPE,
            "marginMode": "crossed",
            "marginCoin": MARGIN_COIN,
            "size": qty_str,
            "side": side,
            "tradeSide": if closing { "close" } else { "open" },
            "orderType": "market",
        });
        let resp = self.signed_post("/api/v2/mix/order/place-order", body).await?;
        self.invalidate_account_caches().await;
        Ok(OrderResult {
            order_id: resp["data"]["orderId"].as_str().unwrap_or("").to_string(),
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
        self.place_market(symbol, position_side, &qty_str, false).await
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
        let result = self.place_market(symbol, position_side, &qty_str, true).await?;
        self.cancel_stop_orders(symbol).await.ok();
        Ok(result)
    }

    async fn place_tpsl(
        &self,
        symbol: &str,
        side: PositionSide,
        qty: f64,
        trigger: f64,
        plan_type: &str,
    ) -> Result<(), ExecError> {
        let precision = self.precision(symbol).await?;
        let mut body = json!({
            "symbol": symbol,
            "productType": PRODUCT_TYPE,
            "marginCoin": MARGIN_COIN,
            "planType": plan_type,
            "triggerPrice": precision.format_price(trigger),
            "triggerType": "mark_price",
            "holdSide": side.label(),
        });
        if qty > 0.0 {
            body["size"] = json!(precision.format_quantity(qty));
        }
        self.signed_post("/api/v2/mix/order/place-tpsl-order", body)
            .await?;
        Ok(())
    }
}

fn check_code(body: Value) -> Result<Value, ExecError> {
    let code = body["code"].as_str().unwrap_or(idempotent_codes::BITGET_OK);
    if code != idempotent_codes::BITGET_OK {
        return Err(ExecError::Venue {
            code: code.to_string(),
            message: body["msg"].as_str().unwrap_or("").to_string(),
        });
    }
    Ok(body)
}

fn parse_state(state: &str) -> OrderStatus {
    match state {
        "live" | "new" | "init" => OrderStatus::New,
        "partially_filled" => OrderStatus::PartiallyFilled,
        "filled" => OrderStatus::Filled,
        "canceled" | "cancelled" => OrderStatus::Canceled,
        _ => OrderStatus::Rejected,
    }
}

#[async_trait]
impl VenueDriver for BitgetDriver {
    fn venue(&self) -> VenueKind {
        VenueKind::Bitget
    }

    async fn get_balance(&self) -> Result<AccountBalance, ExecError> {
        if let Some(cached) = self.balance_cache.get().await {
            return Ok(cached);
        }
        let body = self
            .signed_get(
                &format!("/api/v2/mix/account/accounts?productType={PRODUCT_TYPE}"),
                OpClass::Account,
            )
            .await?;
        let account = body["data"]
            .as_array()
            .and_then(|a| a.iter().find(|d| d["marginCoin"].as_str() == Some(MARGIN_COIN)))
            .ok_or_else(|| ExecError::InvalidResponse("no USDT futures account".into()))?;
        let balance = AccountBalance {
            total_equity: as_f64(&account["accountEquity"]),
            total_wallet_balance: as_f64(&account["available"]) + as_f64(&account["locked"]),
            available_balance: as_f64(&account["crossedMaxAvailable"]),
            total_unrealized_profit: as_f64(&account["unrealizedPL"]),
        };
        self.balance_cache.put(balance.clone()).await;
        Ok(balance)
    }

    async fn get_positions(&self) -> Result<Vec<VenuePosition>, ExecError> {
        if let Some(cached) = self.position_cache.get().await {
            return Ok(cached);
        }
        let body = self
            .signed_get(
                &format!(
                    "/api/v2/mix/position/all-position?productType={PRODUCT_TYPE}&marginCoin={MARGIN_COIN}"
                ),
                OpClass::Account,
            )
            .await?;
        let mut positions = Vec::new();
        for p in body["data"].as_array().into_iter().flatten() {
            let total = as_f64(&p["total"]);
            if total <= 0.0 {
                continue;
            }
            let side = match p["holdSide"].as_str() {
                Some("short") => PositionSide::Short,
                _ => PositionSide::Long,
            };
            positions.push(VenuePosition {
                symbol: p["symbol"].as_str().unwrap_or_default().to_string(),
                side,
                position_amt: total,
                entry_price: as_f64(&p["openPriceAvg"]),
                mark_price: as_f64(&p["markPrice"]),
                unrealized_profit: as_f64(&p["unrealizedPL"]),
                leverage: as_f64(&p["leverage"]) as u32,
                liquidation_price: as_f64(&p["liquidationPrice"]),
                created_time: match as_i64(&p["cTime"]) {
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
            "symbol": symbol,
            "productType": PRODUCT_TYPE,
            "marginCoin": MARGIN_COIN,
            "leverage": leverage.to_string(),
        });
        match self.signed_post("/api/v2/mix/account/set-leverage", body).await {
            Ok(_) => Ok(()),
            // 40797: leverage unchanged / blocked by open position.
            Err(ExecError::Venue { code, .. }) if code == "40797" => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn set_margin_mode(&self, symbol: &str, is_cross: bool) -> Result<(), ExecError> {
        let body = json!({
            "symbol": symbol,
            "productType": PRODUCT_TYPE,
            "marginCoin": MARGIN_COIN,
            "marginMode": if is_cross { "crossed" } else { "isolated" },
        });
        match self.signed_post("/api/v2/mix/account/set-margin-mode", body).await {
            Ok(_) => Ok(()),
            // 45117: cannot switch with an open position; non-fatal.
            Err(ExecError::Venue { code, .. }) if code == "45117" || code == "40919" => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn get_market_price(&self, symbol: &str) -> Result<f64, ExecError> {
        self.pacer.acquire(OpClass::MarketData).await;
        let url = format!(
            "{}/api/v2/mix/market/ticker?productType={PRODUCT_TYPE}&symbol={symbol}",
            self.base_url
        );
        let body = check_code(json_body(send_with_retry(self.client.get(&url)).await?).await?)?;
        let price = body["data"]
            .as_array()
            .and_then(|a| a.first())
            .map(|t| as_f64(&t["lastPr"]))
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
        qty: f64,
        trigger: f64,
    ) -> Result<(), ExecError> {
        self.place_tpsl(symbol, side, qty, trigger, "pos_loss").await
    }

    async fn set_take_profit(
        &self,
        symbol: &str,
        side: PositionSide,
        qty: f64,
        trigger: f64,
    ) -> Result<(), ExecError> {
        self.place_tpsl(symbol, side, qty, trigger, "pos_profit").await
    }

    async fn cancel_stop_orders(&self, symbol: &str) -> Result<(), ExecError> {
        for plan_type in ["profit_loss"] {
            let pending = match self
                .signed_get(
                    &format!(
                        "/api/v2/mix/order/orders-plan-pending?productType={PRODUCT_TYPE}&symbol={symbol}&planType={plan_type}"
                    ),
                    OpClass::Account,
                )
                .await
            {
                Ok(v) => v,
                Err(e) => {
                    warn!("plan-order lookup on {} failed: {}", symbol, e);
                    continue;
                }
            };
            for o in pending["data"]["entrustedList"].as_array().into_iter().flatten() {
                let Some(order_id) = o["orderId"].as_str() else {
                    continue;
                };
                let body = json!({
                    "symbol": symbol,
                    "productType": PRODUCT_TYPE,
                    "marginCoin": MARGIN_COIN,
                    "orderId": order_id,
                    "planType": o["planType"].as_str().unwrap_or("profit_loss"),
                });
                if let Err(e) = self.signed_post("/api/v2/mix/order/cancel-plan-order", body).await {
                    warn!("cancel plan order {} on {} failed: {}", order_id, symbol, e);
                }
            }
        }
        Ok(())
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<(), ExecError> {
        let body = json!({
            "symbol": symbol,
            "productType": PRODUCT_TYPE,
            "marginCoin": MARGIN_COIN,
        });
        if let Err(e) = self.signed_post("/api/v2/mix/order/cancel-all-orders", body).await {
            warn!("cancel all orders on {} failed: {}", symbol, e);
        }
        self.cancel_stop_orders(symbol).await.ok();
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
        let body = match self
            .signed_get(
                &format!(
                    "/api/v2/mix/order/detail?productType={PRODUCT_TYPE}&symbol={symbol}&orderId={order_id}"
                ),
                OpClass::Account,
            )
            .await
        {
            Ok(v) => v,
            Err(ExecError::Venue { code, .. }) if code == "40109" => {
                return Err(ExecError::OrderNotFound(order_id.to_string()));
            }
            Err(e) => return Err(e),
        };
        let order = &body["data"];
        if order.is_null() {
            return Err(ExecError::OrderNotFound(order_id.to_string()));
        }
        Ok(OrderStatusInfo {
            order_id: order_id.to_string(),
            status: parse_state(order["state"].as_str().unwrap_or("")),
            avg_price: as_f64(&order["priceAvg"]),
            executed_qty: as_f64(&order["baseVolume"]),
            commission: as_f64(&order["fee"]).abs(),
        })
    }

    async fn get_trades(
        &self,
        start_time: i64,
        limit: u32,
    ) -> Result<Vec<TradeRecord>, ExecError> {
        let body = self
            .signed_get(
                &format!(
                    "/api/v2/mix/order/fills?productType={PRODUCT_TYPE}&startTime={start_time}&limit={}",
                    limit.min(self.trade_limit())
                ),
                OpClass::History,
            )
            .await?;
        let mut trades = Vec::new();
        for f in body["data"]["fillList"].as_array().into_iter().flatten() {
            let side = match f["side"].as_str() {
                Some("sell") => TradeSide::Sell,
                _ => TradeSide::Buy,
            };
            let realized_pnl = as_f64(&f["profit"]);
            // tradeSide open/close plus order side names the book exactly.
            let order_action = match (f["tradeSide"].as_str(), side) {
                (Some("open"), TradeSide::Buy) => OrderAction::OpenLong,
                (Some("open"), TradeSide::Sell) => OrderAction::OpenShort,
                (Some("close"), TradeSide::Sell) => OrderAction::CloseLong,
                (Some("close"), TradeSide::Buy) => OrderAction::CloseShort,
                _ => oneway_action(side, realized_pnl),
            };
            let fee = f["feeDetail"]
                .as_array()
                .into_iter()
                .flatten()
                .map(|d| as_f64(&d["totalFee"]).abs())
                .sum();
            trades.push(TradeRecord {
                trade_id: f["tradeId"].as_str().unwrap_or_default().to_string(),
                symbol: f["symbol"].as_str().unwrap_or_default().to_string(),
                side,
                position_side: order_action.position_side().unwrap_or(PositionSide::Both),
                order_action,
                price: as_f64(&f["price"]),
                quantity: as_f64(&f["baseVolume"]).abs(),
                realized_pnl,
                fee,
                time: as_i64(&f["cTime"]),
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
        let body = self
            .signed_get(
                &format!(
                    "/api/v2/mix/position/history-position?productType={PRODUCT_TYPE}&startTime={start_time}&limit={limit}"
                ),
                OpClass::History,
            )
            .await?;
        let mut records = Vec::new();
        for r in body["data"]["list"].as_array().into_iter().flatten() {
            let side = match r["holdSide"].as_str() {
                Some("short") => PositionSide::Short,
                _ => PositionSide::Long,
            };
            records.push(ClosedPnlRecord {
                symbol: r["symbol"].as_str().unwrap_or_default().to_string(),
                side,
                entry_price: as_f64(&r["openAvgPrice"]),
                exit_price: as_f64(&r["closeAvgPrice"]),
                quantity: as_f64(&r["closeTotalPos"]),
                realized_pnl: as_f64(&r["pnl"]),
                fee: as_f64(&r["openFee"]).abs() + as_f64(&r["closeFee"]).abs(),
                entry_time: as_i64(&r["cTime"]),
                exit_time: as_i64(&r["uTime"]),
                close_type: CloseType::Unknown,
            });
        }
        records.sort_by_key(|r| r.exit_time);
        Ok(records)
    }

    async fn get_open_orders(&self, symbol: &str) -> Result<Vec<PendingOrder>, ExecError> {
        let mut orders = Vec::new();
        let pending = self
            .signed_get(
                &format!(
                    "/api/v2/mix/order/orders-pending?productType={PRODUCT_TYPE}&symbol={symbol}"
                ),
                OpClass::Account,
            )
            .await?;
        for o in pending["data"]["entrustedList"].as_array().into_iter().flatten() {
            orders.push(PendingOrder {
                order_id: o["orderId"].as_str().unwrap_or_default().to_string(),
                symbol: symbol.to_string(),
                kind: PendingOrderKind::Limit,
                side: match o["side"].as_str() {
                    Some("sell") => TradeSide::Sell,
                    _ => TradeSide::Buy,
                },
                price: as_f64(&o["price"]),
                quantity: as_f64(&o["size"]),
            });
        }
        let plans = self
            .signed_get(
                &format!(
                    "/api/v2/mix/order/orders-plan-pending?productType={PRODUCT_TYPE}&symbol={symbol}&planType=profit_loss"
                ),
                OpClass::Account,
            )
            .await?;
        for o in plans["data"]["entrustedList"].as_array().into_iter().flatten() {
            let kind = match o["planType"].as_str() {
                Some("pos_profit") | Some("profit_plan") => PendingOrderKind::TakeProfit,
                _ => PendingOrderKind::StopLoss,
            };
            orders.push(PendingOrder {
                order_id: o["orderId"].as_str().unwrap_or_default().to_string(),
                symbol: symbol.to_string(),
                kind,
                side: match o["side"].as_str() {
                    Some("sell") => TradeSide::Sell,
                    _ => TradeSide::Buy,
                },
                price: as_f64(&o["triggerPrice"]),
                quantity: as_f64(&o["size"]),
            });
        }
        Ok(orders)
    }

    fn trade_limit(&self) -> u32 {
        trade_limits::BITGET
    }
}
