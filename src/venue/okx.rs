//! OKX v5 swap driver
//!
//! Signing: HMAC-SHA256 of `timestamp + method + path + body`, Base64
//! encoded, with key/passphrase headers. Sizes on the wire are contracts;
//! the driver converts through the instrument's `ctVal` on both directions
//! so callers only ever see base-asset units.
//!
//! Account position mode is detected once at construction: `posSide` is
//! only sent on `long_short_mode` accounts, net-mode accounts infer the
//! book from the sign of the position.

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
use crate::venue::http::{as_f64, as_i64, build_client, json_body, send_with_retry};
use crate::venue::sign::hmac_sha256_b64;
use crate::venue::symbols::{from_dash_swap, to_dash_swap};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::warn;

/// Contract metadata cached per instrument
#[derive(Debug, Clone)]
struct Instrument {
    /// Base-asset quantity represented by one contract
    ct_val: f64,
    precision: SymbolPrecision,
}

/// Detected account position mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PosMode {
    LongShort,
    Net,
}

/// OKX v5 driver
pub struct OkxDriver {
    base_url: String,
    client: Client,
    api_key: String,
    api_secret: String,
    passphrase: String,
    pos_mode: PosMode,
    is_cross: TtlCell<bool>,
    pacer: RequestPacer,
    balance_cache: TtlCell<AccountBalance>,
    position_cache: TtlCell<Vec<VenuePosition>>,
    instrument_cache: TtlMap<Instrument>,
}

impl OkxDriver {
    /// Construct and detect the account position mode.
    pub async fn connect(config: &TraderConfig) -> Result<Self, ExecError> {
        Self::connect_to(config, base_urls::OKX).await
    }

    /// Same as [`connect`](Self::connect) against a specific base URL (tests)
    pub async fn connect_to(config: &TraderConfig, base_url: &str) -> Result<Self, ExecError> {
        let (key, secret) = config.credentials.require_hmac()?;
        let passphrase = config.credentials.require_passphrase()?;
        let mut driver = Self {
            base_url: base_url.to_string(),
            client: build_client(config.http_timeout)?,
            api_key: key.to_string(),
            api_secret: secret.to_string(),
            passphrase: passphrase.to_string(),
            pos_mode: PosMode::Net,
            is_cross: TtlCell::new(std::time::Duration::from_secs(u64::MAX / 4)),
            pacer: RequestPacer::new(),
            balance_cache: TtlCell::new(ACCOUNT_CACHE_TTL),
            position_cache: TtlCell::new(ACCOUNT_CACHE_TTL),
            instrument_cache: TtlMap::new(PRECISION_CACHE_TTL),
        };
        match driver.fetch_pos_mode().await {
            Ok(mode) => driver.pos_mode = mode,
            Err(e) => warn!("position-mode detection failed, assuming net mode: {}", e),
        }
        Ok(driver)
    }

    /// Point the driver at a different base URL (tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_pos_mode(&self) -> Result<PosMode, ExecError> {
        let body = self
            .signed_get("/api/v5/account/config", OpClass::Account)
            .await?;
        let mode = body["data"]
            .as_array()
            .and_then(|a| a.first())
            .and_then(|c| c["posMode"].as_str())
            .unwrap_or("net_mode");
        Ok(if mode == "long_short_mode" {
            PosMode::LongShort
        } else {
            PosMode::Net
        })
    }

    fn iso_timestamp() -> String {
        chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }

    fn auth_headers(
        &self,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<Vec<(&'static str, String)>, ExecError> {
        let timestamp = Self::iso_timestamp();
        let to_sign = format!("{timestamp}{method}{path}{body}");
        let signature = hmac_sha256_b64(&self.api_secret, &to_sign)?;
        Ok(vec![
            ("OK-ACCESS-KEY", self.api_key.clone()),
            ("OK-ACCESS-SIGN", signature),
            ("OK-ACCESS-TIMESTAMP", timestamp),
            ("OK-ACCESS-PASSPHRASE", self.passphrase.clone()),
            ("Content-Type", "application/json".to_string()),
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

    /// Instrument metadata; must be known before any size conversion.
    async fn instrument(&self, symbol: &str) -> Result<Instrument, ExecError> {
        if let Some(inst) = self.instrument_cache.get(symbol).await {
            return Ok(inst);
        }
        let inst_id = to_dash_swap(symbol);
        self.pacer.acquire(OpClass::MarketData).await;
        let url = format!(
            "{}/api/v5/public/instruments?instType=SWAP&instId={inst_id}",
            self.base_url
        );
        let body = check_code(json_body(send_with_retry(self.client.get(&url)).await?).await?)?;
        let data = body["data"]
            .as_array()
            .and_then(|a| a.first())
            .ok_or_else(|| ExecError::UnknownSymbol(symbol.to_string()))?;
        let tick = data["tickSz"].as_str().unwrap_or("0.1");
        let lot = data["lotSz"].as_str().unwrap_or("1");
        let inst = Instrument {
            ct_val: as_f64(&data["ctVal"]).max(f64::MIN_POSITIVE),
            precision: SymbolPrecision {
                price_precision: decimals_of(tick),
                quantity_precision: decimals_of(lot),
                tick_size: tick.parse().unwrap_or(0.1),
                step_size: lot.parse().unwrap_or(1.0),
            },
        };
        self.instrument_cache.put(symbol, inst.clone()).await;
        Ok(inst)
    }

    async fn margin_mode(&self) -> &'static str {
        match self.is_cross.get().await {
            Some(false) => "isolated",
            _ => "cross",
        }
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
        contracts: f64,
        reduce_only: bool,
    ) -> Result<OrderResult, ExecError> {
        let inst = self.instrument(symbol).await?;
        let sz = inst.precision.format_quantity(contracts);
        let mut order = json!({
            "instId": to_dash_swap(symbol),
            "tdMode": self.margin_mode().await,
            "side": match side { TradeSide::Buy => "buy", TradeSide::Sell => "sell" },
            "ordType": "market",
            "sz": sz,
        });
        if self.pos_mode == PosMode::LongShort {
            order["posSide"] = json!(position_side.label());
        } else if reduce_only {
            order["reduceOnly"] = json!(true);
        }
        let body = self.signed_post("/api/v5/trade/order", order).await?;
        self.invalidate_account_caches().await;
        let data = body["data"]
            .as_array()
            .and_then(|a| a.first())
            .ok_or_else(|| ExecError::InvalidResponse("empty order response".into()))?;
        Ok(OrderResult {
            order_id: data["ordId"].as_str().unwrap_or("").to_string(),
            symbol: symbol.to_string(),
            status: OrderStatus::New,
            quantity: sz.parse::<f64>().unwrap_or(0.0) * inst.ct_val,
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
        let inst = self.instrument(symbol).await?;
        let contracts = qty / inst.ct_val;
        let side = match position_side {
            PositionSide::Short => TradeSide::Sell,
            _ => TradeSide::Buy,
        };
        self.place_market(symbol, side, position_side, contracts, false)
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
        let inst = self.instrument(symbol).await?;
        let contracts = qty / inst.ct_val;
        let side = match position_side {
            PositionSide::Short => TradeSide::Buy,
            _ => TradeSide::Sell,
        };
        let result = self
            .place_market(symbol, side, position_side, contracts, true)
            .await?;
        self.cancel_stop_orders(symbol).await.ok();
        Ok(result)
    }

    async fn place_algo(
        &self,
        symbol: &str,
        side: PositionSide,
        qty: f64,
        trigger: f64,
        is_stop_loss: bool,
    ) -> Result<(), ExecError> {
        let inst = self.instrument(symbol).await?;
        let contracts = if qty > 0.0 {
            inst.precision.format_quantity(qty / inst.ct_val)
        } else {
            // Algo close-all uses the full position.
            "".to_string()
        };
        let trigger_px = inst.precision.format_price(trigger);
        let mut order = json!({
            "instId": to_dash_swap(symbol),
            "tdMode": self.margin_mode().await,
            "side": match side { PositionSide::Short => "buy", _ => "sell" },
            "ordType": "conditional",
        });
        if is_stop_loss {
            order["slTriggerPx"] = json!(trigger_px);
            order["slOrdPx"] = json!("-1");
        } else {
            order["tpTriggerPx"] = json!(trigger_px);
            order["tpOrdPx"] = json!("-1");
        }
        if contracts.is_empty() {
            order["closeFraction"] = json!("1");
        } else {
            order["sz"] = json!(contracts);
        }
        if self.pos_mode == PosMode::LongShort {
            order["posSide"] = json!(side.label());
        }
        self.signed_post("/api/v5/trade/order-algo", order).await?;
        Ok(())
    }
}

fn check_code(body: Value) -> Result<Value, ExecError> {
    let code = body["code"].as_str().unwrap_or(idempotent_codes::OKX_OK);
    if code != idempotent_codes::OKX_OK {
        // Batch endpoints report per-item errors under data[].
        let detail = body["data"]
            .as_array()
            .and_then(|a| a.first())
            .and_then(|d| d["sMsg"].as_str())
            .unwrap_or_else(|| body["msg"].as_str().unwrap_or(""));
        return Err(ExecError::Venue {
            code: code.to_string(),
            message: detail.to_string(),
        });
    }
    Ok(body)
}

fn parse_state(state: &str) -> OrderStatus {
    match state {
        "live" => OrderStatus::New,
        "partially_filled" => OrderStatus::PartiallyFilled,
        "filled" => OrderStatus::Filled,
        "canceled" => OrderStatus::Canceled,
        "mmp_canceled" => OrderStatus::Canceled,
        _ => OrderStatus::Rejected,
    }
}

#[async_trait]
impl VenueDriver for OkxDriver {
    fn venue(&self) -> VenueKind {
        VenueKind::Okx
    }

    async fn get_balance(&self) -> Result<AccountBalance, ExecError> {
        if let Some(cached) = self.balance_cache.get().await {
            return Ok(cached);
        }
        let body = self
            .signed_get("/api/v5/account/balance?ccy=USDT", OpClass::Account)
            .await?;
        let account = body["data"]
            .as_array()
            .and_then(|a| a.first())
            .ok_or_else(|| ExecError::InvalidResponse("empty balance data".into()))?;
        let usdt = account["details"]
            .as_array()
            .and_then(|a| a.iter().find(|d| d["ccy"].as_str() == Some("USDT")));
        let balance = AccountBalance {
            total_equity: as_f64(&account["totalEq"]),
            total_wallet_balance: usdt.map(|d| as_f64(&d["cashBal"])).unwrap_or(0.0),
            available_balance: usdt.map(|d| as_f64(&d["availEq"])).unwrap_or(0.0),
            total_unrealized_profit: usdt.map(|d| as_f64(&d["upl"])).unwrap_or(0.0),
        };
        self.balance_cache.put(balance.clone()).await;
        Ok(balance)
    }

    async fn get_positions(&self) -> Result<Vec<VenuePosition>, ExecError> {
        if let Some(cached) = self.position_cache.get().await {
            return Ok(cached);
        }
        let body = self
            .signed_get("/api/v5/account/positions?instType=SWAP", OpClass::Account)
            .await?;
        let mut positions = Vec::new();
        for p in body["data"].as_array().into_iter().flatten() {
            let contracts = as_f64(&p["pos"]);
            if contracts == 0.0 {
                continue;
            }
            let symbol = from_dash_swap(p["instId"].as_str().unwrap_or_default());
            let ct_val = match self.instrument(&symbol).await {
                Ok(inst) => inst.ct_val,
                Err(_) => 1.0,
            };
            // Net mode reports signed contracts with posSide "net".
            let side = match p["posSide"].as_str() {
                Some("long") => PositionSide::Long,
                Some("short") => PositionSide::Short,
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
                position_amt: contracts.abs() * ct_val,
                entry_price: as_f64(&p["avgPx"]),
                mark_price: as_f64(&p["markPx"]),
                unrealized_profit: as_f64(&p["upl"]),
                leverage: as_f64(&p["lever"]) as u32,
                liquidation_price: as_f64(&p["liqPx"]),
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
            "instId": to_dash_swap(symbol),
            "lever": leverage.to_string(),
            "mgnMode": self.margin_mode().await,
        });
        match self.signed_post("/api/v5/account/set-leverage", body).await {
            Ok(_) => Ok(()),
            // 59000: setting blocked by open position/order; treated as set.
            Err(ExecError::Venue { code, .. }) if code == "59000" => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn set_margin_mode(&self, _symbol: &str, is_cross: bool) -> Result<(), ExecError> {
        // Margin mode rides on each order as tdMode; remember the choice.
        self.is_cross.put(is_cross).await;
        Ok(())
    }

    async fn get_market_price(&self, symbol: &str) -> Result<f64, ExecError> {
        self.pacer.acquire(OpClass::MarketData).await;
        let url = format!(
            "{}/api/v5/market/ticker?instId={}",
            self.base_url,
            to_dash_swap(symbol)
        );
        let body = check_code(json_body(send_with_retry(self.client.get(&url)).await?).await?)?;
        let price = body["data"]
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
        qty: f64,
        trigger: f64,
    ) -> Result<(), ExecError> {
        self.place_algo(symbol, side, qty, trigger, true).await
    }

    async fn set_take_profit(
        &self,
        symbol: &str,
        side: PositionSide,
        qty: f64,
        trigger: f64,
    ) -> Result<(), ExecError> {
        self.place_algo(symbol, side, qty, trigger, false).await
    }

    async fn cancel_stop_orders(&self, symbol: &str) -> Result<(), ExecError> {
        let inst_id = to_dash_swap(symbol);
        let pending = self
            .signed_get(
                &format!("/api/v5/trade/orders-algo-pending?ordType=conditional&instId={inst_id}"),
                OpClass::Account,
            )
            .await?;
        let mut cancels = Vec::new();
        for o in pending["data"].as_array().into_iter().flatten() {
            if let Some(algo_id) = o["algoId"].as_str() {
                cancels.push(json!({"algoId": algo_id, "instId": inst_id}));
            }
        }
        if cancels.is_empty() {
            return Ok(());
        }
        if let Err(e) = self
            .signed_post("/api/v5/trade/cancel-algos", Value::Array(cancels))
            .await
        {
            warn!("cancel algo orders on {} failed: {}", symbol, e);
        }
        Ok(())
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<(), ExecError> {
        let inst_id = to_dash_swap(symbol);
        let pending = self
            .signed_get(
                &format!("/api/v5/trade/orders-pending?instId={inst_id}"),
                OpClass::Account,
            )
            .await?;
        let mut cancels = Vec::new();
        for o in pending["data"].as_array().into_iter().flatten() {
            if let Some(ord_id) = o["ordId"].as_str() {
                cancels.push(json!({"ordId": ord_id, "instId": inst_id}));
            }
        }
        if !cancels.is_empty() {
            if let Err(e) = self
                .signed_post("/api/v5/trade/cancel-batch-orders", Value::Array(cancels))
                .await
            {
                warn!("cancel orders on {} failed: {}", symbol, e);
            }
        }
        self.cancel_stop_orders(symbol).await.ok();
        Ok(())
    }

    async fn format_quantity(&self, symbol: &str, qty: f64) -> Result<String, ExecError> {
        // Formats base-asset quantity on the contract grid.
        let inst = self.instrument(symbol).await?;
        let contracts = inst.precision.floor_quantity(qty / inst.ct_val);
        Ok(crate::model::precision::format_trimmed(
            contracts * inst.ct_val,
            12,
        ))
    }

    async fn get_order_status(
        &self,
        symbol: &str,
        order_id: &str,
    ) -> Result<OrderStatusInfo, ExecError> {
        let inst_id = to_dash_swap(symbol);
        let body = match self
            .signed_get(
                &format!("/api/v5/trade/order?instId={inst_id}&ordId={order_id}"),
                OpClass::Account,
            )
            .await
        {
            Ok(v) => v,
            Err(ExecError::Venue { code, .. }) if code == "51603" => {
                return Err(ExecError::OrderNotFound(order_id.to_string()));
            }
            Err(e) => return Err(e),
        };
        let order = body["data"]
            .as_array()
            .and_then(|a| a.first())
            .ok_or_else(|| ExecError::OrderNotFound(order_id.to_string()))?;
        let inst = self.instrument(symbol).await?;
        Ok(OrderStatusInfo {
            order_id: order_id.to_string(),
            status: parse_state(order["state"].as_str().unwrap_or("")),
            avg_price: as_f64(&order["avgPx"]),
            executed_qty: as_f64(&order["accFillSz"]) * inst.ct_val,
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
                    "/api/v5/trade/fills?instType=SWAP&begin={start_time}&limit={}",
                    limit.min(self.trade_limit())
                ),
                OpClass::History,
            )
            .await?;
        let mut trades = Vec::new();
        for f in body["data"].as_array().into_iter().flatten() {
            let symbol = from_dash_swap(f["instId"].as_str().unwrap_or_default());
            let ct_val = match self.instrument(&symbol).await {
                Ok(inst) => inst.ct_val,
                Err(_) => 1.0,
            };
            let side = match f["side"].as_str() {
                Some("sell") => TradeSide::Sell,
                _ => TradeSide::Buy,
            };
            let position_side = match f["posSide"].as_str() {
                Some("long") => PositionSide::Long,
                Some("short") => PositionSide::Short,
                _ => PositionSide::Both,
            };
            let realized_pnl = as_f64(&f["fillPnl"]);
            trades.push(TradeRecord {
                trade_id: f["tradeId"].as_str().unwrap_or_default().to_string(),
                symbol,
                side,
                position_side,
                order_action: resolve_action(position_side, side, realized_pnl),
                price: as_f64(&f["fillPx"]),
                quantity: as_f64(&f["fillSz"]).abs() * ct_val,
                realized_pnl,
                fee: as_f64(&f["fee"]).abs(),
                time: as_i64(&f["ts"]),
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
                    "/api/v5/account/positions-history?instType=SWAP&after={start_time}&limit={limit}"
                ),
                OpClass::History,
            )
            .await?;
        let mut records = Vec::new();
        for r in body["data"].as_array().into_iter().flatten() {
            let symbol = from_dash_swap(r["instId"].as_str().unwrap_or_default());
            let ct_val = match self.instrument(&symbol).await {
                Ok(inst) => inst.ct_val,
                Err(_) => 1.0,
            };
            let side = match r["posSide"].as_str() {
                Some("short") => PositionSide::Short,
                _ => PositionSide::Long,
            };
            records.push(ClosedPnlRecord {
                symbol,
                side,
                entry_price: as_f64(&r["openAvgPx"]),
                exit_price: as_f64(&r["closeAvgPx"]),
                quantity: as_f64(&r["closeTotalPos"]).abs() * ct_val,
                realized_pnl: as_f64(&r["realizedPnl"]),
                fee: as_f64(&r["fee"]).abs(),
                entry_time: as_i64(&r["cTime"]),
                exit_time: as_i64(&r["uTime"]),
                close_type: match r["type"].as_str() {
                    Some("3") => CloseType::Liquidation,
                    _ => CloseType::Unknown,
                },
            });
        }
        records.sort_by_key(|r| r.exit_time);
        Ok(records)
    }

    async fn get_open_orders(&self, symbol: &str) -> Result<Vec<PendingOrder>, ExecError> {
        let inst_id = to_dash_swap(symbol);
        let mut orders = Vec::new();

        let pending = self
            .signed_get(
                &format!("/api/v5/trade/orders-pending?instId={inst_id}"),
                OpClass::Account,
            )
            .await?;
        for o in pending["data"].as_array().into_iter().flatten() {
            orders.push(PendingOrder {
                order_id: o["ordId"].as_str().unwrap_or_default().to_string(),
                symbol: symbol.to_string(),
                kind: PendingOrderKind::Limit,
                side: match o["side"].as_str() {
                    Some("sell") => TradeSide::Sell,
                    _ => TradeSide::Buy,
                },
                price: as_f64(&o["px"]),
                quantity: as_f64(&o["sz"]),
            });
        }

        let algos = self
            .signed_get(
                &format!("/api/v5/trade/orders-algo-pending?ordType=conditional&instId={inst_id}"),
                OpClass::Account,
            )
            .await?;
        for o in algos["data"].as_array().into_iter().flatten() {
            let sl = as_f64(&o["slTriggerPx"]);
            let kind = if sl > 0.0 {
                PendingOrderKind::StopLoss
            } else {
                PendingOrderKind::TakeProfit
            };
            orders.push(PendingOrder {
                order_id: o["algoId"].as_str().unwrap_or_default().to_string(),
                symbol: symbol.to_string(),
                kind,
                side: match o["side"].as_str() {
                    Some("sell") => TradeSide::Sell,
                    _ => TradeSide::Buy,
                },
                price: if sl > 0.0 { sl } else { as_f64(&o["tpTriggerPx"]) },
                quantity: as_f64(&o["sz"]),
            });
        }
        Ok(orders)
    }

    fn trade_limit(&self) -> u32 {
        trade_limits::OKX
    }
}
