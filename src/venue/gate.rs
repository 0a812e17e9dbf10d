//! Gate.io USDT-futures (v4) driver
//!
//! Signing: `KEY`/`Timestamp`/`SIGN` headers where SIGN is HMAC-SHA512 over
//! `method\npath\nquery\nsha512(body)\ntimestamp` with an epoch-second
//! timestamp. Contracts are `BTC_USDT` style; order sizes are signed
//! integer contracts scaled by `quanto_multiplier`, converted to base-asset
//! units on both directions.
//!
//! Fills carry neither a book side nor realized PnL, so trade history is
//! replayed through the running-position rule (the same inference the
//! Lighter stream needs); closed-PnL records come from the dedicated
//! `position_close` endpoint instead.

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
use crate::sync::normalizer::from_position_before;
use crate::venue::VenueDriver;
use crate::venue::cache::{TtlCell, TtlMap};
use crate::venue::http::{as_f64, as_i64, build_client, json_body, send_with_retry};
use crate::venue::sign::{hmac_sha512_hex, sha512_hex};
use crate::venue::symbols::{from_underscore, to_underscore};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::warn;

const PREFIX: &str = "/api/v4/futures/usdt";

/// Contract metadata cached per symbol
#[derive(Debug, Clone)]
struct Contract {
    /// Base-asset quantity represented by one contract
    multiplier: f64,
    precision: SymbolPrecision,
}

/// Gate.io futures driver
pub struct GateDriver {
    base_url: String,
    client: Client,
    api_key: String,
    api_secret: String,
    pacer: RequestPacer,
    balance_cache: TtlCell<AccountBalance>,
    position_cache: TtlCell<Vec<VenuePosition>>,
    contract_cache: TtlMap<Contract>,
}

impl GateDriver {
    /// Build a driver from trader config
    pub fn new(config: &TraderConfig) -> Result<Self, ExecError> {
        let (key, secret) = config.credentials.require_hmac()?;
        Ok(Self {
            base_url: base_urls::GATE.to_string(),
            client: build_client(config.http_timeout)?,
            api_key: key.to_string(),
            api_secret: secret.to_string(),
            pacer: RequestPacer::new(),
            balance_cache: TtlCell::new(ACCOUNT_CACHE_TTL),
            position_cache: TtlCell::new(ACCOUNT_CACHE_TTL),
            contract_cache: TtlMap::new(PRECISION_CACHE_TTL),
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
        query: &str,
        body: &str,
    ) -> Result<Vec<(&'static str, String)>, ExecError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let body_hash = sha512_hex(body);
        let to_sign = format!("{method}\n{path}\n{query}\n{body_hash}\n{timestamp}");
        let signature = hmac_sha512_hex(&self.api_secret, &to_sign)?;
        Ok(vec![
            ("KEY", self.api_key.clone()),
            ("Timestamp", timestamp),
            ("SIGN", signature),
            ("Content-Type", "application/json".to_string()),
        ])
    }

    async fn signed_request(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &str,
        body: Option<Value>,
        class: OpClass,
    ) -> Result<Value, ExecError> {
        self.pacer.acquire(class).await;
        let payload = body.map(|b| b.to_string()).unwrap_or_default();
        let url = if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        };
        let mut builder = self.client.request(method.clone(), &url);
        if !payload.is_empty() {
            builder = builder.body(payload.clone());
        }
        for (name, value) in self.auth_headers(method.as_str(), path, query, &payload)? {
            builder = builder.header(name, value);
        }
        let resp = send_with_retry(builder).await?;
        match json_body(resp).await {
            Ok(v) => Ok(v),
            Err(ExecError::Venue { code, message }) => {
                match serde_json::from_str::<Value>(&message) {
                    Ok(v) if v["label"].is_string() => Err(ExecError::Venue {
                        code: v["label"].as_str().unwrap_or(&code).to_string(),
                        message: v["message"].as_str().unwrap_or("").to_string(),
                    }),
                    _ => Err(ExecError::Venue { code, message }),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn contract(&self, symbol: &str) -> Result<Contract, ExecError> {
        if let Some(c) = self.contract_cache.get(symbol).await {
            return Ok(c);
        }
        let contract_name = to_underscore(symbol);
        self.pacer.acquire(OpClass::MarketData).await;
        let url = format!("{}{PREFIX}/contracts/{contract_name}", self.base_url);
        let body = json_body(send_with_retry(self.client.get(&url)).await?)
            .await
            .map_err(|_| ExecError::UnknownSymbol(symbol.to_string()))?;
        let tick = body["order_price_round"].as_str().unwrap_or("0.01");
        let c = Contract {
            multiplier: as_f64(&body["quanto_multiplier"]).max(f64::MIN_POSITIVE),
            precision: SymbolPrecision {
                price_precision: decimals_of(tick),
                quantity_precision: 0,
                tick_size: tick.parse().unwrap_or(0.01),
                step_size: 1.0,
            },
        };
        self.contract_cache.put(symbol, c.clone()).await;
        Ok(c)
    }

    async fn invalidate_account_caches(&self) {
        self.balance_cache.invalidate().await;
        self.position_cache.invalidate().await;
    }

    /// Place a market order expressed in signed contracts. Gate models a
    /// market order as price "0" with IOC.
    async fn place_market(
        &self,
        symbol: &str,
        signed_contracts: i64,
        reduce_only: bool,
        auto_size: Option<&str>,
    ) -> Result<OrderResult, ExecError> {
        let contract_name = to_underscore(symbol);
        let mut order = json!({
            "contract": contract_name,
            "size": signed_contracts,
            "price": "0",
            "tif": "ioc",
            "reduce_only": reduce_only,
        });
        if let Some(auto) = auto_size {
            order["auto_size"] = json!(auto);
        }
        let body = self
            .signed_request(
                reqwest::Method::POST,
                &format!("{PREFIX}/orders"),
                "",
                Some(order),
                OpClass::Trading,
            )
            .await?;
        self.invalidate_account_caches().await;
        let contract = self.contract(symbol).await?;
        Ok(OrderResult {
            order_id: as_i64(&body["id"]).to_string(),
            symbol: symbol.to_string(),
            status: OrderStatus::New,
            quantity: (signed_contracts.unsigned_abs() as f64) * contract.multiplier,
            avg_price: as_f64(&body["fill_price"]),
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
        let contract = self.contract(symbol).await?;
        let contracts = (qty / contract.multiplier).floor() as i64;
        if contracts <= 0 {
            return Err(ExecError::Venue {
                code: "SIZE_TOO_SMALL".into(),
                message: format!("{qty} below one contract ({})", contract.multiplier),
            });
        }
        let signed = match position_side {
            PositionSide::Short => -contracts,
            _ => contracts,
        };
        self.place_market(symbol, signed, false, None).await
    }

    async fn close(
        &self,
        symbol: &str,
        qty: f64,
        position_side: PositionSide,
    ) -> Result<OrderResult, ExecError> {
        let positions = self.get_positions().await?;
        let open_qty = positions
            .iter()
            .find(|p| p.symbol == symbol && p.side == position_side)
            .map(|p| p.position_amt)
            .unwrap_or(0.0);
        if open_qty <= 0.0 {
            return Ok(OrderResult::no_position(symbol));
        }

        let result = if qty <= 0.0 || qty >= open_qty {
            // Full close: size 0 with auto_size picks up the whole book.
            let auto = match position_side {
                PositionSide::Short => "close_short",
                _ => "close_long",
            };
            self.place_market(symbol, 0, true, Some(auto)).await?
        } else {
            let contract = self.contract(symbol).await?;
            let contracts = (qty / contract.multiplier).floor() as i64;
            if contracts <= 0 {
                return Ok(OrderResult::no_position(symbol));
            }
            let signed = match position_side {
                PositionSide::Short => contracts,
                _ => -contracts,
            };
            self.place_market(symbol, signed, true, None).await?
        };
        self.cancel_stop_orders(symbol).await.ok();
        Ok(result)
    }

    async fn place_trigger(
        &self,
        symbol: &str,
        side: PositionSide,
        trigger: f64,
        is_stop_loss: bool,
    ) -> Result<(), ExecError> {
        let contract = self.contract(symbol).await?;
        let contract_name = to_underscore(symbol);
        // rule 1 fires when price >= trigger, rule 2 when price <= trigger.
        let rule = match (side, is_stop_loss) {
            (PositionSide::Short, true) => 1,
            (PositionSide::Short, false) => 2,
            (_, true) => 2,
            (_, false) => 1,
        };
        let auto = match side {
            PositionSide::Short => "close_short",
            _ => "close_long",
        };
        let body = json!({
            "initial": {
                "contract": contract_name,
                "size": 0,
                "price": "0",
                "tif": "ioc",
                "reduce_only": true,
                "auto_size": auto,
            },
            "trigger": {
                "strategy_type": 0,
                "price_type": 1,
                "price": contract.precision.format_price(trigger),
                "rule": rule,
            },
        });
        self.signed_request(
            reqwest::Method::POST,
            &format!("{PREFIX}/price_orders"),
            "",
            Some(body),
            OpClass::Trading,
        )
        .await?;
        Ok(())
    }
}

fn parse_status(body: &Value) -> OrderStatus {
    match body["status"].as_str() {
        Some("open") => {
            if as_f64(&body["left"]) < as_f64(&body["size"]).abs() {
                OrderStatus::PartiallyFilled
            } else {
                OrderStatus::New
            }
        }
        Some("finished") => match body["finish_as"].as_str() {
            Some("filled") | None => OrderStatus::Filled,
            Some("cancelled") => OrderStatus::Canceled,
            Some("ioc") => OrderStatus::Expired,
            _ => OrderStatus::Rejected,
        },
        _ => OrderStatus::Rejected,
    }
}

#[async_trait]
impl VenueDriver for GateDriver {
    fn venue(&self) -> VenueKind {
        VenueKind::Gate
    }

    async fn get_balance(&self) -> Result<AccountBalance, ExecError> {
        if let Some(cached) = self.balance_cache.get().await {
            return Ok(cached);
        }
        let body = self
            .signed_request(
                reqwest::Method::GET,
                &format!("{PREFIX}/accounts"),
                "",
                None,
                OpClass::Account,
            )
            .await?;
        let total = as_f64(&body["total"]);
        let unrealized = as_f64(&body["unrealised_pnl"]);
        let balance = AccountBalance {
            total_equity: total + unrealized,
            total_wallet_balance: total,
            available_balance: as_f64(&body["available"]),
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
                &format!("{PREFIX}/positions"),
                "",
                None,
                OpClass::Account,
            )
            .await?;
        let mut positions = Vec::new();
        for p in body.as_array().into_iter().flatten() {
            let contracts = as_f64(&p["size"]);
            if contracts == 0.0 {
                continue;
            }
            let symbol = from_underscore(p["contract"].as_str().unwrap_or_default());
            let multiplier = match self.contract(&symbol).await {
                Ok(c) => c.multiplier,
                Err(_) => 1.0,
            };
            // Dual mode labels the book in `mode`; single mode signs `size`.
            let side = match p["mode"].as_str() {
                Some("dual_long") => PositionSide::Long,
                Some("dual_short") => PositionSide::Short,
                _ => {
                    if contracts > 0.0 {
                        PositionSide::Long
                    } else {
                        PositionSide::Short
                    }
                }
            };
            positions.push(VenuePosition {
                symbol,
                side,
                position_amt: contracts.abs() * multiplier,
                entry_price: as_f64(&p["entry_price"]),
                mark_price: as_f64(&p["mark_price"]),
                unrealized_profit: as_f64(&p["unrealised_pnl"]),
                leverage: as_f64(&p["leverage"]) as u32,
                liquidation_price: as_f64(&p["liq_price"]),
                created_time: match as_i64(&p["open_time"]) {
                    0 => None,
                    t => Some(t * 1000),
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
        let contract_name = to_underscore(symbol);
        match self
            .signed_request(
                reqwest::Method::POST,
                &format!("{PREFIX}/positions/{contract_name}/leverage"),
                &format!("leverage={leverage}"),
                None,
                OpClass::Trading,
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(ExecError::Venue { code, .. }) if code == "POSITION_HOLDING" => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn set_margin_mode(&self, _symbol: &str, is_cross: bool) -> Result<(), ExecError> {
        // Gate expresses cross as leverage 0 on the position; isolated uses
        // the explicit leverage set per position. Nothing to do up front.
        if !is_cross {
            return Ok(());
        }
        Ok(())
    }

    async fn get_market_price(&self, symbol: &str) -> Result<f64, ExecError> {
        self.pacer.acquire(OpClass::MarketData).await;
        let url = format!(
            "{}{PREFIX}/tickers?contract={}",
            self.base_url,
            to_underscore(symbol)
        );
        let body = json_body(send_with_retry(self.client.get(&url)).await?).await?;
        let price = body
            .as_array()
            .and_then(|a| a.first())
            .map(|t| as_f64(&t["last"]))
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
        self.place_trigger(symbol, side, trigger, true).await
    }

    async fn set_take_profit(
        &self,
        symbol: &str,
        side: PositionSide,
        _qty: f64,
        trigger: f64,
    ) -> Result<(), ExecError> {
        self.place_trigger(symbol, side, trigger, false).await
    }

    async fn cancel_stop_orders(&self, symbol: &str) -> Result<(), ExecError> {
        if let Err(e) = self
            .signed_request(
                reqwest::Method::DELETE,
                &format!("{PREFIX}/price_orders"),
                &format!("contract={}", to_underscore(symbol)),
                None,
                OpClass::Trading,
            )
            .await
        {
            warn!("cancel price orders on {} failed: {}", symbol, e);
        }
        Ok(())
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<(), ExecError> {
        if let Err(e) = self
            .signed_request(
                reqwest::Method::DELETE,
                &format!("{PREFIX}/orders"),
                &format!("contract={}", to_underscore(symbol)),
                None,
                OpClass::Trading,
            )
            .await
        {
            warn!("cancel orders on {} failed: {}", symbol, e);
        }
        self.cancel_stop_orders(symbol).await.ok();
        Ok(())
    }

    async fn format_quantity(&self, symbol: &str, qty: f64) -> Result<String, ExecError> {
        let contract = self.contract(symbol).await?;
        let contracts = (qty / contract.multiplier).floor().max(0.0);
        Ok(crate::model::precision::format_trimmed(
            contracts * contract.multiplier,
            12,
        ))
    }

    async fn get_order_status(
        &self,
        symbol: &str,
        order_id: &str,
    ) -> Result<OrderStatusInfo, ExecError> {
        let body = match self
            .signed_request(
                reqwest::Method::GET,
                &format!("{PREFIX}/orders/{order_id}"),
                "",
                None,
                OpClass::Account,
            )
            .await
        {
            Ok(v) => v,
            Err(ExecError::Venue { code, .. }) if code == "ORDER_NOT_FOUND" => {
                return Err(ExecError::OrderNotFound(order_id.to_string()));
            }
            Err(e) => return Err(e),
        };
        let contract = self.contract(symbol).await?;
        let size = as_f64(&body["size"]).abs();
        let left = as_f64(&body["left"]).abs();
        Ok(OrderStatusInfo {
            order_id: order_id.to_string(),
            status: parse_status(&body),
            avg_price: as_f64(&body["fill_price"]),
            executed_qty: (size - left) * contract.multiplier,
            commission: as_f64(&body["tkfr"]) * (size - left) * contract.multiplier
                * as_f64(&body["fill_price"]),
        })
    }

    async fn get_trades(
        &self,
        start_time: i64,
        limit: u32,
    ) -> Result<Vec<TradeRecord>, ExecError> {
        let body = self
            .signed_request(
                reqwest::Method::GET,
                &format!("{PREFIX}/my_trades"),
                &format!("from={}&limit={}", start_time / 1000, limit.min(self.trade_limit())),
                None,
                OpClass::History,
            )
            .await?;
        let mut raw: Vec<&Value> = body.as_array().into_iter().flatten().collect();
        raw.sort_by_key(|f| as_i64(&f["create_time"]));

        // No book side and no per-fill PnL on this stream: replay signed
        // sizes per contract and let the running position name each fill.
        let mut running: HashMap<String, f64> = HashMap::new();
        let mut trades = Vec::new();
        for f in raw {
            let symbol = from_underscore(f["contract"].as_str().unwrap_or_default());
            let multiplier = match self.contract(&symbol).await {
                Ok(c) => c.multiplier,
                Err(_) => 1.0,
            };
            let signed_contracts = as_f64(&f["size"]);
            let qty = signed_contracts.abs() * multiplier;
            if qty <= 0.0 {
                continue;
            }
            let side = if signed_contracts > 0.0 {
                TradeSide::Buy
            } else {
                TradeSide::Sell
            };
            let before = running.entry(symbol.clone()).or_insert(0.0);
            let records = from_position_before(
                &as_i64(&f["id"]).to_string(),
                &symbol,
                side,
                as_f64(&f["price"]),
                qty,
                0.0,
                as_f64(&f["fee"]).abs(),
                as_i64(&f["create_time"]) * 1000,
                *before,
            );
            *before += signed_contracts * multiplier;
            trades.extend(records);
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
            .signed_request(
                reqwest::Method::GET,
                &format!("{PREFIX}/position_close"),
                &format!("from={}&limit={limit}", start_time / 1000),
                None,
                OpClass::History,
            )
            .await?;
        let mut records = Vec::new();
        for r in body.as_array().into_iter().flatten() {
            let symbol = from_underscore(r["contract"].as_str().unwrap_or_default());
            let multiplier = match self.contract(&symbol).await {
                Ok(c) => c.multiplier,
                Err(_) => 1.0,
            };
            let side = match r["side"].as_str() {
                Some("short") => PositionSide::Short,
                _ => PositionSide::Long,
            };
            // long_price/short_price are the average buy and sell prices of
            // the round-trip; which one is the entry depends on the side.
            let (entry_price, exit_price) = match side {
                PositionSide::Short => (as_f64(&r["short_price"]), as_f64(&r["long_price"])),
                _ => (as_f64(&r["long_price"]), as_f64(&r["short_price"])),
            };
            records.push(ClosedPnlRecord {
                symbol,
                side,
                entry_price,
                exit_price,
                quantity: as_f64(&r["accum_size"]).abs() * multiplier,
                realized_pnl: as_f64(&r["pnl"]),
                fee: as_f64(&r["pnl_fee"]).abs(),
                entry_time: as_i64(&r["first_open_time"]) * 1000,
                exit_time: as_i64(&r["time"]) * 1000,
                close_type: CloseType::Unknown,
            });
        }
        records.sort_by_key(|r| r.exit_time);
        Ok(records)
    }

    async fn get_open_orders(&self, symbol: &str) -> Result<Vec<PendingOrder>, ExecError> {
        let contract_name = to_underscore(symbol);
        let mut orders = Vec::new();

        let open = self
            .signed_request(
                reqwest::Method::GET,
                &format!("{PREFIX}/orders"),
                &format!("contract={contract_name}&status=open"),
                None,
                OpClass::Account,
            )
            .await?;
        let contract = self.contract(symbol).await?;
        for o in open.as_array().into_iter().flatten() {
            let signed = as_f64(&o["size"]);
            orders.push(PendingOrder {
                order_id: as_i64(&o["id"]).to_string(),
                symbol: symbol.to_string(),
                kind: PendingOrderKind::Limit,
                side: if signed > 0.0 { TradeSide::Buy } else { TradeSide::Sell },
                price: as_f64(&o["price"]),
                quantity: signed.abs() * contract.multiplier,
            });
        }

        let triggers = self
            .signed_request(
                reqwest::Method::GET,
                &format!("{PREFIX}/price_orders"),
                &format!("contract={contract_name}&status=open"),
                None,
                OpClass::Account,
            )
            .await?;
        for o in triggers.as_array().into_iter().flatten() {
            let auto = o["initial"]["auto_size"].as_str().unwrap_or("");
            let rule = as_i64(&o["trigger"]["rule"]);
            // For a long book, rule 2 (<= trigger) guards the downside.
            let kind = match (auto, rule) {
                ("close_long", 2) | ("close_short", 1) => PendingOrderKind::StopLoss,
                _ => PendingOrderKind::TakeProfit,
            };
            orders.push(PendingOrder {
                order_id: as_i64(&o["id"]).to_string(),
                symbol: symbol.to_string(),
                kind,
                side: if auto == "close_short" { TradeSide::Buy } else { TradeSide::Sell },
                price: as_f64(&o["trigger"]["price"]),
                quantity: 0.0,
            });
        }
        Ok(orders)
    }

    fn trade_limit(&self) -> u32 {
        trade_limits::GATE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_finished() {
        let body = json!({"status": "finished", "finish_as": "filled"});
        assert_eq!(parse_status(&body), OrderStatus::Filled);
        let body = json!({"status": "finished", "finish_as": "cancelled"});
        assert_eq!(parse_status(&body), OrderStatus::Canceled);
    }

    #[test]
    fn test_parse_status_open_partial() {
        let body = json!({"status": "open", "size": 10, "left": 4});
        assert_eq!(parse_status(&body), OrderStatus::PartiallyFilled);
        let body = json!({"status": "open", "size": 10, "left": 10});
        assert_eq!(parse_status(&body), OrderStatus::New);
    }
}
