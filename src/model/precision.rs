//! Symbol precision rules and rounding helpers

use pretty_simple_display::{DebugPretty, DisplaySimple};
use serde::{Deserialize, Serialize};

/// Price/quantity formatting rules for one symbol on one venue.
///
/// Fetched lazily and cached per venue for five minutes.
#[derive(DebugPretty, DisplaySimple, Clone, Serialize, Deserialize)]
pub struct SymbolPrecision {
    /// Decimal places allowed in prices
    pub price_precision: u32,
    /// Decimal places allowed in quantities
    pub quantity_precision: u32,
    /// Smallest price increment
    pub tick_size: f64,
    /// Smallest quantity increment
    pub step_size: f64,
}

impl SymbolPrecision {
    /// Build from decimal places alone (venues that only declare precision)
    pub fn from_decimals(price_precision: u32, quantity_precision: u32) -> Self {
        Self {
            price_precision,
            quantity_precision,
            tick_size: 10f64.powi(-(price_precision as i32)),
            step_size: 10f64.powi(-(quantity_precision as i32)),
        }
    }

    /// Round a price to the nearest tick
    pub fn round_price(&self, price: f64) -> f64 {
        if self.tick_size <= 0.0 {
            return price;
        }
        (price / self.tick_size).round() * self.tick_size
    }

    /// Floor a quantity to the step grid. Never rounds up so a formatted
    /// order can never spend more than requested.
    pub fn floor_quantity(&self, qty: f64) -> f64 {
        if self.step_size <= 0.0 {
            return qty;
        }
        // Nudge before flooring so 0.30000000000000004 / 0.1 still counts as 3 steps.
        ((qty / self.step_size) + 1e-9).floor() * self.step_size
    }

    /// Format a quantity floored to the step grid as a wire string
    pub fn format_quantity(&self, qty: f64) -> String {
        let floored = self.floor_quantity(qty);
        format_trimmed(floored, self.quantity_precision)
    }

    /// Format a price rounded to the tick grid as a wire string
    pub fn format_price(&self, price: f64) -> String {
        let rounded = self.round_price(price);
        format_trimmed(rounded, self.price_precision)
    }
}

/// Count decimal places implied by an increment string like `"0.001"`
pub fn decimals_of(increment: &str) -> u32 {
    match increment.split('.').nth(1) {
        Some(frac) => frac.trim_end_matches('0').len() as u32,
        None => 0,
    }
}

/// Round to a number of significant figures (Hyperliquid price rule)
pub fn round_sig_figs(val: f64, figs: i32) -> f64 {
    if val == 0.0 {
        return 0.0;
    }
    let d = figs - 1 - (val.abs().log10().floor() as i32);
    let d = d.clamp(0, 10);
    let factor = 10f64.powi(d);
    (val * factor).round() / factor
}

/// Fixed-precision format with trailing zeros (and a bare dot) stripped
pub fn format_trimmed(val: f64, precision: u32) -> String {
    let s = format!("{:.*}", precision as usize, val);
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_quantity_never_rounds_up() {
        let p = SymbolPrecision {
            price_precision: 2,
            quantity_precision: 3,
            tick_size: 0.01,
            step_size: 0.001,
        };
        assert!((p.floor_quantity(0.12345) - 0.123).abs() < 1e-9);
        assert!(p.floor_quantity(0.9999) <= 0.9999);
    }

    #[test]
    fn test_format_quantity_idempotent() {
        let p = SymbolPrecision {
            price_precision: 1,
            quantity_precision: 2,
            tick_size: 0.1,
            step_size: 0.01,
        };
        let once = p.format_quantity(1.2391);
        let twice = p.format_quantity(once.parse::<f64>().unwrap());
        assert_eq!(once, twice);
        assert_eq!(once, "1.23");
    }

    #[test]
    fn test_exact_multiple_survives_flooring() {
        let p = SymbolPrecision {
            price_precision: 2,
            quantity_precision: 1,
            tick_size: 0.01,
            step_size: 0.1,
        };
        // 0.3 is not exactly representable; the epsilon nudge keeps all 3 steps.
        assert_eq!(p.format_quantity(0.3), "0.3");
    }

    #[test]
    fn test_round_sig_figs() {
        assert!((round_sig_figs(12345.678, 5) - 12346.0).abs() < 1e-9);
        assert!((round_sig_figs(0.0012345678, 5) - 0.0012346).abs() < 1e-12);
        assert_eq!(round_sig_figs(0.0, 5), 0.0);
    }

    #[test]
    fn test_decimals_of() {
        assert_eq!(decimals_of("0.001"), 3);
        assert_eq!(decimals_of("1"), 0);
        assert_eq!(decimals_of("0.0100"), 2);
    }
}
