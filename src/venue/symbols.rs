//! Canonical-symbol translation helpers
//!
//! Inputs to every driver are canonical USDT-quoted symbols (`BTCUSDT`).
//! Each venue translates to its own form on egress and back to canonical on
//! ingress, so the rest of the core never sees venue spellings.

/// Base asset of a canonical USDT-quoted symbol (`BTCUSDT` → `BTC`)
pub fn base_asset(symbol: &str) -> &str {
    symbol.strip_suffix("USDT").unwrap_or(symbol)
}

/// Canonical → dash-separated swap form (`BTCUSDT` → `BTC-USDT-SWAP`, OKX)
pub fn to_dash_swap(symbol: &str) -> String {
    format!("{}-USDT-SWAP", base_asset(symbol))
}

/// Dash-separated swap form → canonical (`BTC-USDT-SWAP` → `BTCUSDT`)
pub fn from_dash_swap(inst_id: &str) -> String {
    let base = inst_id.split('-').next().unwrap_or(inst_id);
    format!("{base}USDT")
}

/// Canonical → underscore form (`BTCUSDT` → `BTC_USDT`, Gate.io)
pub fn to_underscore(symbol: &str) -> String {
    format!("{}_USDT", base_asset(symbol))
}

/// Underscore form → canonical (`BTC_USDT` → `BTCUSDT`)
pub fn from_underscore(contract: &str) -> String {
    let base = contract.split('_').next().unwrap_or(contract);
    format!("{base}USDT")
}

/// Canonical → bare coin (`BTCUSDT` → `BTC`, Hyperliquid / Lighter)
pub fn to_coin(symbol: &str) -> String {
    base_asset(symbol).to_string()
}

/// Bare coin → canonical (`BTC` → `BTCUSDT`). HIP-3 coins like `xyz:SILVER`
/// keep their dex prefix inside the base: `xyz:SILVER` → `xyz:SILVERUSDT`.
pub fn from_coin(coin: &str) -> String {
    format!("{coin}USDT")
}

/// Whether a canonical symbol targets a HIP-3 builder dex (`xyz:SILVERUSDT`)
pub fn hip3_dex(symbol: &str) -> Option<(&str, &str)> {
    let base = base_asset(symbol);
    base.split_once(':')
}
