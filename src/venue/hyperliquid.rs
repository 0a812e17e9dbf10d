//! Hyperliquid driver
//!
//! All reads go through the `/info` endpoint; mutations go through
//! `/exchange` as signed L1 actions. An action is msgpack-encoded (in JSON
//! key order), extended with the nonce and vault marker, keccak-hashed, and
//! the hash is signed via the phantom-agent EIP-712 scheme. The JSON body
//! must keep the exact key order used for hashing, which is why actions are
//! built as ordered maps.
//!
//! Prices round to five significant figures; sizes round to the asset's
//! `szDecimals`. Market orders are aggressive IOC limits at ±5 % of mark.
//!
//! HIP-3 builder dexes (`xyz:SILVER` style coins) resolve through the dex
//! meta with asset indices `100000 + dexIndex*10000 + metaIndex`, and their
//! mids come from `allMids` with the `dex` field set.

use crate::config::TraderConfig;
use crate::constants::{ACCOUNT_CACHE_TTL, PRECISION_CACHE_TTL, base_urls, hip3, trade_limits};
use crate::error::ExecError;
use crate::model::precision::{format_trimmed, round_sig_figs};
use crate::model::types::OrderAction;
use crate::model::{
    AccountBalance, ClosedPnlRecord, CloseType, OrderResult, OrderStatus, OrderStatusInfo,
    PendingOrder, PendingOrderKind, PositionSide, TradeRecord, TradeSide, VenueKind,
    VenuePosition,
};
use crate::rate_limit::{OpClass, RequestPacer};
use crate::venue::VenueDriver;
use crate::venue::cache::{TtlCell, TtlMap};
use crate::venue::http::{as_f64, as_i64, build_client, json_body, now_millis, send_with_retry};
use crate::venue::sign::{WireSignature, action_hash, sign_agent};
use crate::venue::symbols::{from_coin, to_coin};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

/// Per-coin asset metadata
#[derive(Debug, Clone)]
struct AssetInfo {
    index: u32,
    sz_decimals: u32,
}

/// Hyperliquid driver
pub struct HyperliquidDriver {
    base_url: String,
    client: Client,
    wallet_address: String,
    private_key: String,
    mainnet: bool,
    pacer: RequestPacer,
    balance_cache: TtlCell<AccountBalance>,
    position_cache: TtlCell<Vec<VenuePosition>>,
    assets: TtlMap<AssetInfo>,
}

/// Python-SDK `float_to_wire`: eight decimals, trailing zeros stripped
fn float_to_wire(x: f64) -> String {
    format_trimmed(x, 8)
}

/// Size rounded to the asset's declared decimals
fn round_size(size: f64, sz_decimals: u32) -> f64 {
    let factor = 10f64.powi(sz_decimals as i32);
    (size * factor).round() / factor
}

impl HyperliquidDriver {
    /// Build a driver from trader config
    pub fn new(config: &TraderConfig) -> Result<Self, ExecError> {
        let private_key = config.credentials.require_private_key()?;
        let wallet_address = config.credentials.require_wallet()?.to_string();
        Ok(Self {
            base_url: base_urls::HYPERLIQUID.to_string(),
            client: build_client(config.http_timeout)?,
            wallet_address,
            private_key,
            mainnet: true,
            pacer: RequestPacer::new(),
            balance_cache: TtlCell::new(ACCOUNT_CACHE_TTL),
            position_cache: TtlCell::new(ACCOUNT_CACHE_TTL),
            assets: TtlMap::new(PRECISION_CACHE_TTL),
        })
    }

    /// Point the driver at a different base URL (tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn post_info(&self, payload: Value, class: OpClass) -> Result<Value, ExecError> {
        self.pacer.acquire(class).await;
        let builder = self
            .client
            .post(format!("{}/info", self.base_url))
            .json(&payload);
        let body = json_body(send_with_retry(builder).await?).await?;
        if let Some(err) = body["error"].as_str() {
            if err.contains("rate limited") {
                return Err(ExecError::RateLimited);
            }
            return Err(ExecError::Venue {
                code: "info".into(),
                message: err.to_string(),
            });
        }
        Ok(body)
    }

    async fn post_exchange(
        &self,
        action: Value,
        nonce: u64,
        signature: WireSignature,
    ) -> Result<Value, ExecError> {
        self.pacer.acquire(OpClass::Trading).await;
        let payload = json!({
            "action": action,
            "nonce": nonce,
            "signature": signature,
            "vaultAddress": Value::Null,
        });
        let builder = self
            .client
            .post(format!("{}/exchange", self.base_url))
            .json(&payload);
        let body = json_body(send_with_retry(builder).await?).await?;
        if body["status"].as_str() == Some("err") {
            let message = body["response"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| body["response"]["data"]["error"].as_str().unwrap_or("").to_string());
            if message.contains("rate limited") {
                return Err(ExecError::RateLimited);
            }
            return Err(ExecError::Venue {
                code: "exchange".into(),
                message,
            });
        }
        // An "ok" envelope can still carry a per-order error.
        if let Some(statuses) = body["response"]["data"]["statuses"].as_array() {
            if let Some(err) = statuses.first().and_then(|s| s["error"].as_str()) {
                return Err(ExecError::Venue {
                    code: "order".into(),
                    message: err.to_string(),
                });
            }
        }
        Ok(body)
    }

    /// Sign and submit an ordered action map.
    async fn submit_action(&self, action: Value) -> Result<Value, ExecError> {
        let nonce = now_millis() as u64;
        let msgpack = rmp_serde::to_vec_named(&action)
            .map_err(|e| ExecError::InvalidResponse(format!("action encode: {e}")))?;
        let hash = action_hash(&msgpack, nonce, None);
        let signature = sign_agent(&self.private_key, hash, self.mainnet)?;
        self.post_exchange(action, nonce, signature).await
    }

    /// Load the universe for the main dex or a builder dex into the cache.
    async fn load_universe(&self, dex: Option<&str>) -> Result<(), ExecError> {
        let mut payload = Map::new();
        payload.insert("type".into(), json!("meta"));
        if let Some(dex) = dex {
            payload.insert("dex".into(), json!(dex));
        }
        let body = self.post_info(Value::Object(payload), OpClass::MarketData).await?;
        let universe = body["universe"]
            .as_array()
            .ok_or_else(|| ExecError::InvalidResponse("meta without universe".into()))?;
        let base = match dex {
            // `100000 + perpDexIndex*10000 + metaIndex`; xyz is dex 1.
            Some(_) => hip3::ASSET_BASE + hip3::XYZ_DEX_INDEX * hip3::DEX_STRIDE,
            None => 0,
        };
        for (i, asset) in universe.iter().enumerate() {
            let Some(name) = asset["name"].as_str() else {
                continue;
            };
            let coin = match dex {
                Some(dex) => format!("{dex}:{name}"),
                None => name.to_string(),
            };
            self.assets
                .put(
                    &coin,
                    AssetInfo {
                        index: base + i as u32,
                        sz_decimals: asset["szDecimals"].as_u64().unwrap_or(4) as u32,
                    },
                )
                .await;
        }
        Ok(())
    }

    async fn asset(&self, coin: &str) -> Result<AssetInfo, ExecError> {
        if let Some(info) = self.assets.get(coin).await {
            return Ok(info);
        }
        let dex = coin.split_once(':').map(|(dex, _)| dex);
        self.load_universe(dex).await?;
        self.assets
            .get(coin)
            .await
            .ok_or_else(|| ExecError::UnknownSymbol(coin.to_string()))
    }

    async fn mid_price(&self, coin: &str) -> Result<f64, ExecError> {
        let mut payload = Map::new();
        payload.insert("type".into(), json!("allMids"));
        if let Some((dex, _)) = coin.split_once(':') {
            payload.insert("dex".into(), json!(dex));
        }
        let body = self.post_info(Value::Object(payload), OpClass::MarketData).await?;
        let mid = as_f64(&body[coin]);
        if mid <= 0.0 {
            return Err(ExecError::UnknownSymbol(coin.to_string()));
        }
        Ok(mid)
    }

    async fn invalidate_account_caches(&self) {
        self.balance_cache.invalidate().await;
        self.position_cache.invalidate().await;
    }

    /// Ordered order wire: a, b, p, s, r, t
    fn order_wire(asset: u32, is_buy: bool, px: &str, sz: &str, reduce_only: bool, t: Value) -> Value {
        let mut order = Map::new();
        order.insert("a".into(), json!(asset));
        order.insert("b".into(), json!(is_buy));
        order.insert("p".into(), json!(px));
        order.insert("s".into(), json!(sz));
        order.insert("r".into(), json!(reduce_only));
        order.insert("t".into(), t);
        Value::Object(order)
    }

    /// Ordered action wire: type, orders, grouping
    fn order_action(orders: Vec<Value>) -> Value {
        let mut action = Map::new();
        action.insert("type".into(), json!("order"));
        action.insert("orders".into(), Value::Array(orders));
        action.insert("grouping".into(), json!("na"));
        Value::Object(action)
    }

    /// Place an aggressive IOC limit that behaves like a market order.
    async fn place_market(
        &self,
        symbol: &str,
        is_buy: bool,
        qty: f64,
        reduce_only: bool,
    ) -> Result<OrderResult, ExecError> {
        let coin = to_coin(symbol);
        let info = self.asset(&coin).await?;
        let mid = self.mid_price(&coin).await?;
        let slippage = hip3::XYZ_SLIPPAGE;
        let aggressive = if is_buy { mid * (1.0 + slippage) } else { mid * (1.0 - slippage) };
        let px = float_to_wire(round_sig_figs(aggressive, 5));
        let sz = float_to_wire(round_size(qty, info.sz_decimals));

        let t = json!({"limit": {"tif": "Ioc"}});
        let action = Self::order_action(vec![Self::order_wire(
            info.index,
            is_buy,
            &px,
            &sz,
            reduce_only,
            t,
        )]);
        let body = self.submit_action(action).await?;
        self.invalidate_account_caches().await;

        let status_entry = &body["response"]["data"]["statuses"][0];
        let (order_id, status, avg_price) = if !status_entry["filled"].is_null() {
            (
                as_i64(&status_entry["filled"]["oid"]).to_string(),
                OrderStatus::Filled,
                as_f64(&status_entry["filled"]["avgPx"]),
            )
        } else if !status_entry["resting"].is_null() {
            (
                as_i64(&status_entry["resting"]["oid"]).to_string(),
                OrderStatus::New,
                0.0,
            )
        } else {
            (String::new(), OrderStatus::New, 0.0)
        };
        Ok(OrderResult {
            order_id,
            symbol: symbol.to_string(),
            status,
            quantity: sz.parse().unwrap_or(0.0),
            avg_price,
        })
    }

    async fn open(
        &self,
        symbol: &str,
        qty: f64,
        leverage: u32,
        is_buy: bool,
    ) -> Result<OrderResult, ExecError> {
        self.cancel_all_orders(symbol).await.ok();
        if let Err(e) = self.set_leverage(symbol, leverage).await {
            warn!("leverage setup for {} failed, continuing: {}", symbol, e);
        }
        self.place_market(symbol, is_buy, qty, false).await
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
        let is_buy = position_side == PositionSide::Short;
        let result = self.place_market(symbol, is_buy, qty, true).await?;
        self.cancel_stop_orders(symbol).await.ok();
        Ok(result)
    }

    async fn place_trigger(
        &self,
        symbol: &str,
        side: PositionSide,
        qty: f64,
        trigger: f64,
        tpsl: &str,
    ) -> Result<(), ExecError> {
        let coin = to_coin(symbol);
        let info = self.asset(&coin).await?;
        let qty = if qty > 0.0 {
            qty
        } else {
            self.get_positions()
                .await?
                .iter()
                .find(|p| p.symbol == symbol && p.side == side)
                .map(|p| p.position_amt)
                .unwrap_or(0.0)
        };
        if qty <= 0.0 {
            return Ok(());
        }
        let px = float_to_wire(round_sig_figs(trigger, 5));
        let sz = float_to_wire(round_size(qty, info.sz_decimals));
        let is_buy = side == PositionSide::Short;
        let t = json!({
            "trigger": {
                "isMarket": true,
                "triggerPx": px,
                "tpsl": tpsl,
            }
        });
        let action =
            Self::order_action(vec![Self::order_wire(info.index, is_buy, &px, &sz, true, t)]);
        self.submit_action(action).await?;
        Ok(())
    }

    async fn open_orders_raw(&self) -> Result<Vec<Value>, ExecError> {
        let body = self
            .post_info(
                json!({"type": "openOrders", "user": self.wallet_address}),
                OpClass::Account,
            )
            .await?;
        Ok(body.as_array().cloned().unwrap_or_default())
    }

    async fn cancel_by_oid(&self, coin: &str, oid: i64) -> Result<(), ExecError> {
        let info = self.asset(coin).await?;
        let mut cancel = Map::new();
        cancel.insert("a".into(), json!(info.index));
        cancel.insert("o".into(), json!(oid));
        let mut action = Map::new();
        action.insert("type".into(), json!("cancel"));
        action.insert("cancels".into(), Value::Array(vec![Value::Object(cancel)]));
        self.submit_action(Value::Object(action)).await?;
        Ok(())
    }
}

/// Map the fill `dir` label to an order action
fn parse_dir(dir: &str, side: TradeSide, closed_pnl: f64) -> OrderAction {
    match dir {
        "Open Long" => OrderAction::OpenLong,
        "Open Short" => OrderAction::OpenShort,
        "Close Long" | "Long > Short" => OrderAction::CloseLong,
        "Close Short" | "Short > Long" => OrderAction::CloseShort,
        "Liquidated Long" => OrderAction::CloseLong,
        "Liquidated Short" => OrderAction::CloseShort,
        _ => crate::sync::normalizer::oneway_action(side, closed_pnl),
    }
}

#[async_trait]
impl VenueDriver for HyperliquidDriver {
    fn venue(&self) -> VenueKind {
        VenueKind::Hyperliquid
    }

    async fn get_balance(&self) -> Result<AccountBalance, ExecError> {
        if let Some(cached) = self.balance_cache.get().await {
            return Ok(cached);
        }
        let body = self
            .post_info(
                json!({"type": "clearinghouseState", "user": self.wallet_address}),
                OpClass::Account,
            )
            .await?;
        let account_value = as_f64(&body["marginSummary"]["accountValue"]);
        let withdrawable = as_f64(&body["withdrawable"]);
        let unrealized: f64 = body["assetPositions"]
            .as_array()
            .into_iter()
            .flatten()
            .map(|p| as_f64(&p["position"]["unrealizedPnl"]))
            .sum();
        let balance = AccountBalance {
            total_equity: account_value,
            total_wallet_balance: account_value - unrealized,
            available_balance: withdrawable,
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
            .post_info(
                json!({"type": "clearinghouseState", "user": self.wallet_address}),
                OpClass::Account,
            )
            .await?;
        let mut positions = Vec::new();
        for p in body["assetPositions"].as_array().into_iter().flatten() {
            let pos = &p["position"];
            let szi = as_f64(&pos["szi"]);
            if szi.abs() < 1e-12 {
                continue;
            }
            let coin = pos["coin"].as_str().unwrap_or_default();
            positions.push(VenuePosition {
                symbol: from_coin(coin),
                side: if szi > 0.0 { PositionSide::Long } else { PositionSide::Short },
                position_amt: szi.abs(),
                entry_price: as_f64(&pos["entryPx"]),
                mark_price: as_f64(&pos["positionValue"]) / szi.abs(),
                unrealized_profit: as_f64(&pos["unrealizedPnl"]),
                leverage: as_f64(&pos["leverage"]["value"]) as u32,
                liquidation_price: as_f64(&pos["liquidationPx"]),
                created_time: None,
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
        self.open(symbol, qty, leverage, true).await
    }

    async fn open_short(
        &self,
        symbol: &str,
        qty: f64,
        leverage: u32,
    ) -> Result<OrderResult, ExecError> {
        self.open(symbol, qty, leverage, false).await
    }

    async fn close_long(&self, symbol: &str, qty: f64) -> Result<OrderResult, ExecError> {
        self.close(symbol, qty, PositionSide::Long).await
    }

    async fn close_short(&self, symbol: &str, qty: f64) -> Result<OrderResult, ExecError> {
        self.close(symbol, qty, PositionSide::Short).await
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExecError> {
        let info = self.asset(&to_coin(symbol)).await?;
        let mut action = Map::new();
        action.insert("type".into(), json!("updateLeverage"));
        action.insert("asset".into(), json!(info.index));
        action.insert("isCross".into(), json!(true));
        action.insert("leverage".into(), json!(leverage));
        match self.submit_action(Value::Object(action)).await {
            Ok(_) => Ok(()),
            Err(ExecError::Venue { message, .. })
                if message.contains("Cannot switch") || message.contains("open position") =>
            {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn set_margin_mode(&self, symbol: &str, is_cross: bool) -> Result<(), ExecError> {
        // Margin mode is part of updateLeverage; reuse the current leverage.
        let positions = self.get_positions().await?;
        let leverage = positions
            .iter()
            .find(|p| p.symbol == symbol)
            .map(|p| p.leverage)
            .unwrap_or(1)
            .max(1);
        let info = self.asset(&to_coin(symbol)).await?;
        let mut action = Map::new();
        action.insert("type".into(), json!("updateLeverage"));
        action.insert("asset".into(), json!(info.index));
        action.insert("isCross".into(), json!(is_cross));
        action.insert("leverage".into(), json!(leverage));
        match self.submit_action(Value::Object(action)).await {
            Ok(_) => Ok(()),
            Err(ExecError::Venue { message, .. }) if message.contains("open position") => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn get_market_price(&self, symbol: &str) -> Result<f64, ExecError> {
        self.mid_price(&to_coin(symbol)).await
    }

    async fn set_stop_loss(
        &self,
        symbol: &str,
        side: PositionSide,
        qty: f64,
        trigger: f64,
    ) -> Result<(), ExecError> {
        self.place_trigger(symbol, side, qty, trigger, "sl").await
    }

    async fn set_take_profit(
        &self,
        symbol: &str,
        side: PositionSide,
        qty: f64,
        trigger: f64,
    ) -> Result<(), ExecError> {
        self.place_trigger(symbol, side, qty, trigger, "tp").await
    }

    async fn cancel_stop_orders(&self, symbol: &str) -> Result<(), ExecError> {
        let coin = to_coin(symbol);
        for order in self.open_orders_raw().await? {
            if order["coin"].as_str() != Some(coin.as_str()) {
                continue;
            }
            // Trigger orders surface with a triggerPx; plain limits do not.
            if order["triggerPx"].is_null() && order["orderType"].as_str() != Some("Trigger") {
                continue;
            }
            let oid = as_i64(&order["oid"]);
            if let Err(e) = self.cancel_by_oid(&coin, oid).await {
                warn!("cancel trigger {} on {} failed: {}", oid, symbol, e);
            }
        }
        Ok(())
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<(), ExecError> {
        let coin = to_coin(symbol);
        for order in self.open_orders_raw().await? {
            if order["coin"].as_str() != Some(coin.as_str()) {
                continue;
            }
            let oid = as_i64(&order["oid"]);
            if let Err(e) = self.cancel_by_oid(&coin, oid).await {
                warn!("cancel order {} on {} failed: {}", oid, symbol, e);
            }
        }
        Ok(())
    }

    async fn format_quantity(&self, symbol: &str, qty: f64) -> Result<String, ExecError> {
        let info = self.asset(&to_coin(symbol)).await?;
        // Floor, not round: a formatted order may never exceed the input.
        let factor = 10f64.powi(info.sz_decimals as i32);
        let floored = ((qty * factor) + 1e-9).floor() / factor;
        Ok(float_to_wire(floored))
    }

    async fn get_order_status(
        &self,
        symbol: &str,
        order_id: &str,
    ) -> Result<OrderStatusInfo, ExecError> {
        let oid: i64 = order_id
            .parse()
            .map_err(|_| ExecError::OrderNotFound(order_id.to_string()))?;
        let body = self
            .post_info(
                json!({"type": "orderStatus", "user": self.wallet_address, "oid": oid}),
                OpClass::Account,
            )
            .await?;
        if body["status"].as_str() == Some("unknownOid") {
            return Err(ExecError::OrderNotFound(order_id.to_string()));
        }
        let order = &body["order"];
        let status = match order["status"].as_str() {
            Some("open") => OrderStatus::New,
            Some("filled") => OrderStatus::Filled,
            Some("canceled") | Some("marginCanceled") => OrderStatus::Canceled,
            Some("rejected") => OrderStatus::Rejected,
            _ => OrderStatus::New,
        };
        let orig_sz = as_f64(&order["order"]["origSz"]);
        let remaining = as_f64(&order["order"]["sz"]);
        // Commission comes from the fills; approximate from recent history.
        let fills = self
            .post_info(
                json!({"type": "userFills", "user": self.wallet_address}),
                OpClass::History,
            )
            .await?;
        let mut avg_px = 0.0;
        let mut filled_qty = 0.0;
        let mut commission = 0.0;
        for f in fills.as_array().into_iter().flatten() {
            if as_i64(&f["oid"]) != oid {
                continue;
            }
            let sz = as_f64(&f["sz"]);
            avg_px = (avg_px * filled_qty + as_f64(&f["px"]) * sz) / (filled_qty + sz).max(1e-12);
            filled_qty += sz;
            commission += as_f64(&f["fee"]);
        }
        if filled_qty == 0.0 {
            filled_qty = (orig_sz - remaining).max(0.0);
        }
        debug!("order {} status {:?} filled {}", symbol, status, filled_qty);
        Ok(OrderStatusInfo {
            order_id: order_id.to_string(),
            status,
            avg_price: avg_px,
            executed_qty: filled_qty,
            commission,
        })
    }

    async fn get_trades(
        &self,
        start_time: i64,
        limit: u32,
    ) -> Result<Vec<TradeRecord>, ExecError> {
        let body = self
            .post_info(
                json!({
                    "type": "userFillsByTime",
                    "user": self.wallet_address,
                    "startTime": start_time,
                }),
                OpClass::History,
            )
            .await?;
        let mut trades = Vec::new();
        for f in body.as_array().into_iter().flatten().take(limit as usize) {
            let coin = f["coin"].as_str().unwrap_or_default();
            let side = match f["side"].as_str() {
                // A = ask (sell), B = bid (buy).
                Some("A") => TradeSide::Sell,
                _ => TradeSide::Buy,
            };
            let closed_pnl = as_f64(&f["closedPnl"]);
            let dir = f["dir"].as_str().unwrap_or("");
            let order_action = parse_dir(dir, side, closed_pnl);
            trades.push(TradeRecord {
                trade_id: as_i64(&f["tid"]).to_string(),
                symbol: from_coin(coin),
                side,
                position_side: order_action.position_side().unwrap_or(PositionSide::Both),
                order_action,
                price: as_f64(&f["px"]),
                quantity: as_f64(&f["sz"]).abs(),
                realized_pnl: closed_pnl,
                fee: as_f64(&f["fee"]),
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
        // No dedicated endpoint; closing fills carry the realized PnL.
        let trades = self.get_trades(start_time, limit).await?;
        let mut records = Vec::new();
        for t in trades.into_iter().filter(|t| t.realized_pnl != 0.0) {
            let side = match t.order_action {
                OrderAction::CloseShort => PositionSide::Short,
                _ => PositionSide::Long,
            };
            records.push(ClosedPnlRecord {
                symbol: t.symbol,
                side,
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
        let coin = to_coin(symbol);
        let mut orders = Vec::new();
        for o in self.open_orders_raw().await? {
            if o["coin"].as_str() != Some(coin.as_str()) {
                continue;
            }
            let trigger_px = as_f64(&o["triggerPx"]);
            let kind = if trigger_px > 0.0 {
                match o["orderType"].as_str() {
                    Some("Take Profit Market") | Some("Take Profit Limit") => {
                        PendingOrderKind::TakeProfit
                    }
                    _ => PendingOrderKind::StopLoss,
                }
            } else {
                PendingOrderKind::Limit
            };
            orders.push(PendingOrder {
                order_id: as_i64(&o["oid"]).to_string(),
                symbol: symbol.to_string(),
                kind,
                side: match o["side"].as_str() {
                    Some("A") => TradeSide::Sell,
                    _ => TradeSide::Buy,
                },
                price: if trigger_px > 0.0 { trigger_px } else { as_f64(&o["limitPx"]) },
                quantity: as_f64(&o["sz"]),
            });
        }
        Ok(orders)
    }

    fn trade_limit(&self) -> u32 {
        trade_limits::HYPERLIQUID
    }
}
