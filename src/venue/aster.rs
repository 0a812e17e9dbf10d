//! Aster on-chain futures driver
//!
//! The REST surface is Binance-shaped (`/fapi/...`), but requests are
//! signed like an on-chain message: the business parameters are serialized
//! to a compact JSON string in sorted key order, ABI-packed together with
//! the user wallet, the signer address, and a microsecond nonce, keccak
//! hashed, and signed with the agent's ECDSA key. The signer key is a
//! secondary key, distinct from the wallet that owns the account.
//!
//! The account-level `crossUnPnl` field is known to drift, so unrealized
//! PnL is recomputed by summing positions instead.

use crate::config::TraderConfig;
use crate::constants::{ACCOUNT_CACHE_TTL, PRECISION_CACHE_TTL, base_urls, trade_limits};
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
use crate::venue::sign::{sign_keccak_digest, wallet_address};
use async_trait::async_trait;
use ethers_core::abi::{Token, encode};
use ethers_core::types::Address;
use ethers_core::utils::keccak256;
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::warn;

/// Aster driver
pub struct AsterDriver {
    base_url: String,
    client: Client,
    user: String,
    signer: String,
    private_key: String,
    pacer: RequestPacer,
    balance_cache: TtlCell<AccountBalance>,
    position_cache: TtlCell<Vec<VenuePosition>>,
    precision_cache: TtlMap<SymbolPrecision>,
}

impl AsterDriver {
    /// Build a driver from trader config. The signer address is derived
    /// from the private key and must be registered for the user wallet.
    pub fn new(config: &TraderConfig) -> Result<Self, ExecError> {
        let private_key = config.credentials.require_private_key()?;
        let user = config.credentials.require_wallet()?.to_string();
        let signer = wallet_address(&private_key)?;
        Ok(Self {
            base_url: base_urls::ASTER.to_string(),
            client: build_client(config.http_timeout)?,
            user,
            signer,
            private_key,
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

    /// Sign the sorted-JSON parameter string and return the full form body.
    fn signed_form(&self, params: &[(&str, String)]) -> Result<String, ExecError> {
        // Microsecond nonce, matching the venue's replay window.
        let nonce = (now_millis() as u128) * 1000;
        let sorted: BTreeMap<&str, &str> =
            params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let param_json = serde_json::to_string(&sorted)
            .map_err(|e| ExecError::InvalidResponse(e.to_string()))?;

        let user = Address::from_str(&self.user)
            .map_err(|e| ExecError::Auth(format!("bad wallet address: {e}")))?;
        let signer = Address::from_str(&self.signer)
            .map_err(|e| ExecError::Auth(format!("bad signer address: {e}")))?;
        let packed = encode(&[
            Token::String(param_json),
            Token::Address(user),
            Token::Address(signer),
            Token::Uint(ethers_core::types::U256::from(nonce)),
        ]);
        let digest = keccak256(&packed);
        let signature = sign_keccak_digest(&self.private_key, digest)?;
        let sig_hex = format!(
            "{}{}{:02x}",
            signature.r,
            signature.s.trim_start_matches("0x"),
            signature.v
        );

        let mut form: Vec<String> = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        form.push(format!("user={}", self.user));
        form.push(format!("signer={}", self.signer));
        form.push(format!("nonce={nonce}"));
        form.push(format!("signature={sig_hex}"));
        Ok(form.join("&"))
    }

    async fn signed_request(
        &self,
        method: reqwest::Method,
        path: &str,
        params: &[(&str, String)],
        class: OpClass,
    ) -> Result<Value, ExecError> {
        self.pacer.acquire(class).await;
        let form = self.signed_form(params)?;
        let builder = if method == reqwest::Method::GET {
            self.client
                .get(format!("{}{}?{}", self.base_url, path, form))
        } else {
            self.client
                .request(method, format!("{}{}", self.base_url, path))
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(form)
        };
        let body = json_body(send_with_retry(builder).await?).await;
        match body {
            Ok(v) => check_body(v),
            Err(ExecError::Venue { code, message }) => {
                match serde_json::from_str::<Value>(&message) {
                    Ok(v) if v.get("code").is_some() => Err(ExecError::Venue {
                        code: as_i64(&v["code"]).to_string(),
                        message: v["msg"].as_str().unwrap_or("").to_string(),
                    }),
                    _ => Err(ExecError::Venue { code, message }),
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
        json_body(send_with_retry(self.client.get(&url)).await?).await
    }

    async fn precision(&self, symbol: &str) -> Result<SymbolPrecision, ExecError> {
        if let Some(p) = self.precision_cache.get(symbol).await {
            return Ok(p);
        }
        let body = self.public_get("/fapi/v1/exchangeInfo", "").await?;
        let info = body["symbols"]
            .as_array()
            .into_iter()
            .flatten()
            .find(|s| s["symbol"].as_str() == Some(symbol))
            .cloned()
            .ok_or_else(|| ExecError::UnknownSymbol(symbol.to_string()))?;
        let mut tick_size = 0.0;
        let mut step_size = 0.0;
        for f in info["filters"].as_array().into_iter().flatten() {
            match f["filterType"].as_str() {
                Some("PRICE_FILTER") => tick_size = as_f64(&f["tickSize"]),
                Some("LOT_SIZE") => step_size = as_f64(&f["stepSize"]),
                _ => {}
            }
        }
        let p = SymbolPrecision {
            price_precision: info["pricePrecision"].as_u64().unwrap_or(2) as u32,
            quantity_precision: decimals_of(&format!("{step_size}"))
                .max(info["quantityPrecision"].as_u64().unwrap_or(3) as u32),
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

    /// Marketable limit at a slippage-guarded price; the venue has no
    /// native market order type.
    async fn place_marketable(
        &self,
        symbol: &str,
        side: TradeSide,
        position_side: PositionSide,
        qty_str: &str,
    ) -> Result<OrderResult, ExecError> {
        let mark = self.get_market_price(symbol).await?;
        let precision = self.precision(symbol).await?;
        let aggressive = match side {
            TradeSide::Buy => mark * 1.02,
            TradeSide::Sell => mark * 0.98,
        };
        let params = [
            ("symbol", symbol.to_string()),
            ("side", side.as_str().to_string()),
            ("positionSide", position_side.as_str().to_string()),
            ("type", "LIMIT".to_string()),
            ("timeInForce", "IOC".to_string()),
            ("price", precision.format_price(aggressive)),
            ("quantity", qty_str.to_string()),
        ];
        let body = self
            .signed_request(reqwest::Method::POST, "/fapi/v3/order", &params, OpClass::Trading)
            .await?;
        self.invalidate_account_caches().await;
        Ok(OrderResult {
            order_id: as_i64(&body["orderId"]).to_string(),
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
        self.place_marketable(symbol, side, position_side, &qty_str).await
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
            .place_marketable(symbol, side, position_side, &qty_str)
            .await?;
        self.cancel_stop_orders(symbol).await.ok();
        Ok(result)
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

fn check_body(body: Value) -> Result<Value, ExecError> {
    if body.is_object() && body.get("code").is_some() && body.get("msg").is_some() {
        let code = as_i64(&body["code"]);
        if code != 0 && code != 200 {
            return Err(ExecError::Venue {
                code: code.to_string(),
                message: body["msg"].as_str().unwrap_or("").to_string(),
            });
        }
    }
    Ok(body)
}

#[async_trait]
impl VenueDriver for AsterDriver {
    fn venue(&self) -> VenueKind {
        VenueKind::Aster
    }

    async fn get_balance(&self) -> Result<AccountBalance, ExecError> {
        if let Some(cached) = self.balance_cache.get().await {
            return Ok(cached);
        }
        let body = self
            .signed_request(reqwest::Method::GET, "/fapi/v3/account", &[], OpClass::Account)
            .await?;
        // crossUnPnl drifts; take the per-position sum instead.
        let unrealized: f64 = self
            .get_positions()
            .await?
            .iter()
            .map(|p| p.unrealized_profit)
            .sum();
        let wallet = as_f64(&body["totalWalletBalance"]);
        let balance = AccountBalance {
            total_equity: wallet + unrealized,
            total_wallet_balance: wallet,
            available_balance: as_f64(&body["availableBalance"]),
            total_unrealized_profit: unrealized,
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
                "/fapi/v3/positionRisk",
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
            .signed_request(reqwest::Method::POST, "/fapi/v3/leverage", &params, OpClass::Trading)
            .await
        {
            Ok(_) => Ok(()),
            Err(ExecError::Venue { code, .. }) if code == "-2030" || code == "-4046" => Ok(()),
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
                "/fapi/v3/marginType",
                &params,
                OpClass::Trading,
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(ExecError::Venue { code, .. }) if code == "-4168" || code == "-4047" => Ok(()),
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
        let precision = self.precision(symbol).await?;
        let trade_side = match side {
            PositionSide::Short => TradeSide::Buy,
            _ => TradeSide::Sell,
        };
        let mut params = vec![
            ("symbol", symbol.to_string()),
            ("side", trade_side.as_str().to_string()),
            ("positionSide", side.as_str().to_string()),
            ("type", "STOP_MARKET".to_string()),
            ("stopPrice", precision.format_price(trigger)),
        ];
        if qty > 0.0 {
            params.push(("quantity", precision.format_quantity(qty)));
        } else {
            params.push(("closePosition", "true".to_string()));
        }
        self.signed_request(reqwest::Method::POST, "/fapi/v3/order", &params, OpClass::Trading)
            .await?;
        Ok(())
    }

    async fn set_take_profit(
        &self,
        symbol: &str,
        side: PositionSide,
        qty: f64,
        trigger: f64,
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
            ("type", "TAKE_PROFIT_MARKET".to_string()),
            ("stopPrice", precision.format_price(trigger)),
        ];
        if qty > 0.0 {
            params.push(("quantity", precision.format_quantity(qty)));
        } else {
            params.push(("closePosition", "true".to_string()));
        }
        self.signed_request(reqwest::Method::POST, "/fapi/v3/order", &params, OpClass::Trading)
            .await?;
        Ok(())
    }

    async fn cancel_stop_orders(&self, symbol: &str) -> Result<(), ExecError> {
        let pending = self.get_open_orders(symbol).await?;
        for order in pending.iter().filter(|o| {
            matches!(o.kind, PendingOrderKind::StopLoss | PendingOrderKind::TakeProfit)
        }) {
            let params = [
                ("symbol", symbol.to_string()),
                ("orderId", order.order_id.clone()),
            ];
            if let Err(e) = self
                .signed_request(
                    reqwest::Method::DELETE,
                    "/fapi/v3/order",
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
        if let Err(e) = self
            .signed_request(
                reqwest::Method::DELETE,
                "/fapi/v3/allOpenOrders",
                &params,
                OpClass::Trading,
            )
            .await
        {
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
            ("symbol", symbol.to_string()),
            ("orderId", order_id.to_string()),
        ];
        let body = match self
            .signed_request(reqwest::Method::GET, "/fapi/v3/order", &params, OpClass::Account)
            .await
        {
            Ok(v) => v,
            Err(ExecError::Venue { code, .. }) if code == "-2013" => {
                return Err(ExecError::OrderNotFound(order_id.to_string()));
            }
            Err(e) => return Err(e),
        };
        Ok(OrderStatusInfo {
            order_id: order_id.to_string(),
            status: parse_status(body["status"].as_str().unwrap_or("NEW")),
            avg_price: as_f64(&body["avgPrice"]),
            executed_qty: as_f64(&body["executedQty"]),
            commission: 0.0,
        })
    }

    async fn get_trades(
        &self,
        start_time: i64,
        limit: u32,
    ) -> Result<Vec<TradeRecord>, ExecError> {
        let params = [
            ("startTime", start_time.to_string()),
            ("limit", limit.min(self.trade_limit()).to_string()),
        ];
        let body = self
            .signed_request(
                reqwest::Method::GET,
                "/fapi/v3/userTrades",
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
        let trades = self.get_trades(start_time, limit).await?;
        let mut records = Vec::new();
        for t in trades.into_iter().filter(|t| t.realized_pnl != 0.0) {
            records.push(ClosedPnlRecord {
                symbol: t.symbol,
                side: match t.position_side {
                    PositionSide::Short => PositionSide::Short,
                    _ => PositionSide::Long,
                },
                entry_price: 0.0,
                exit_price: t.price,
                quantity: t.quantity,
                realized_pnl: t.realized_pnl,
                fee: t.fee,
                entry_time: t.time,
                exit_time: t.time,
                close_type: CloseType::Unknown,
            });
        }
        Ok(records)
    }

    async fn get_open_orders(&self, symbol: &str) -> Result<Vec<PendingOrder>, ExecError> {
        let params = [("symbol", symbol.to_string())];
        let body = self
            .signed_request(
                reqwest::Method::GET,
                "/fapi/v3/openOrders",
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
                order_id: as_i64(&o["orderId"]).to_string(),
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
        trade_limits::ASTER
    }
}
