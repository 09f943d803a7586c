//! Volatility-based risk sizer.
//!
//! Turns an actionable signal into a concrete order plan: stop and target a
//! fixed number of ATRs from the entry, quantity chosen so that hitting the
//! stop loses `risk_fraction` of equity, leverage inversely proportional to
//! ATR within bounds.
//!
//! # Formula
//! ```text
//! stop      = entry - dir * stop_atr_mult * ATR
//! target    = entry + dir * target_atr_mult * ATR
//! quantity  = round(equity * risk_fraction / |entry - stop|, 4)
//! leverage  = clamp(round(leverage_numerator / ATR), leverage_min, leverage_max)
//! ```
//!
//! # Example
//! - Equity: 1000 USDT, risk 1% (10 USDT)
//! - Entry 100, ATR 1 -> stop 99, target 102
//! - Quantity: 10 / 1 = 10 contracts, leverage clamp(2, 5, 50) = 5

use crate::domain::{Brackets, OrderPlan, Side, Signal};
use serde::{Deserialize, Serialize};

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Decimal places used for order quantities.
pub const QUANTITY_DECIMALS: i32 = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSizer {
    /// Share of equity lost when the stop is hit (0.01 = 1%).
    pub risk_fraction: f64,
    pub stop_atr_mult: f64,
    pub target_atr_mult: f64,
    pub leverage_numerator: f64,
    pub leverage_min: u32,
    pub leverage_max: u32,
}

impl Default for RiskSizer {
    fn default() -> Self {
        Self {
            risk_fraction: 0.01,
            stop_atr_mult: 1.0,
            target_atr_mult: 2.0,
            leverage_numerator: 2.0,
            leverage_min: 5,
            leverage_max: 50,
        }
    }
}

impl RiskSizer {
    /// Size an order for `signal`. `None` for wait, non-positive equity,
    /// a degenerate stop distance, or a quantity that rounds to zero.
    pub fn size(&self, signal: &Signal, price: f64, equity: f64, atr: f64) -> Option<OrderPlan> {
        let side = signal.decision.side()?;
        if !(equity > 0.0) || !(price.is_finite() && price > 0.0) {
            return None;
        }

        let brackets = self.brackets(side, price, atr);
        let distance = (price - brackets.stop_price).abs();
        if !(distance.is_finite() && distance > 0.0) {
            return None;
        }

        let quantity = round_to(equity * self.risk_fraction / distance, QUANTITY_DECIMALS);
        if quantity <= 0.0 {
            return None;
        }

        Some(OrderPlan {
            symbol: signal.symbol.clone(),
            side,
            entry_price: price,
            stop_price: brackets.stop_price,
            target_price: brackets.target_price,
            leverage: self.leverage_for(atr),
            quantity,
        })
    }

    /// Leverage for a volatility level. ATR <= 0 (or NaN) maps to the maximum.
    pub fn leverage_for(&self, atr: f64) -> u32 {
        if !(atr > 0.0) {
            return self.leverage_max;
        }
        let raw = (self.leverage_numerator / atr).round();
        raw.clamp(self.leverage_min as f64, self.leverage_max as f64) as u32
    }

    /// Stop and target around an arbitrary entry.
    pub fn brackets(&self, side: Side, entry: f64, atr: f64) -> Brackets {
        let dir = side.direction();
        Brackets {
            stop_price: entry - dir * self.stop_atr_mult * atr,
            target_price: entry + dir * self.target_atr_mult * atr,
        }
    }

    /// Every violated constraint, empty when usable.
    pub fn problems(&self) -> Vec<String> {
        let mut out = Vec::new();
        if !(self.risk_fraction > 0.0 && self.risk_fraction < 1.0) {
            out.push(format!("risk_fraction must be in (0, 1), got {}", self.risk_fraction));
        }
        if !(self.stop_atr_mult > 0.0) {
            out.push(format!("stop_atr_mult must be > 0, got {}", self.stop_atr_mult));
        }
        if !(self.target_atr_mult > 0.0) {
            out.push(format!("target_atr_mult must be > 0, got {}", self.target_atr_mult));
        }
        if !(self.leverage_numerator > 0.0) {
            out.push(format!(
                "leverage_numerator must be > 0, got {}",
                self.leverage_numerator
            ));
        }
        if self.leverage_min == 0 || self.leverage_min > self.leverage_max {
            out.push(format!(
                "leverage bounds must satisfy 1 <= min ({}) <= max ({})",
                self.leverage_min, self.leverage_max
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Decision;
    use chrono::Utc;

    fn signal(decision: Decision) -> Signal {
        Signal {
            symbol: "BTCUSDT".into(),
            decision,
            reference_price: 100.0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn quantity_from_risk_budget() {
        let plan = RiskSizer::default()
            .size(&signal(Decision::Long), 100.0, 1000.0, 1.0)
            .unwrap();
        assert_eq!(plan.stop_price, 99.0);
        assert_eq!(plan.target_price, 102.0);
        assert_eq!(plan.quantity, 10.0);
        assert_eq!(plan.leverage, 5);
    }

    #[test]
    fn short_brackets_flip() {
        let plan = RiskSizer::default()
            .size(&signal(Decision::Short), 100.0, 1000.0, 2.0)
            .unwrap();
        assert_eq!(plan.side, Side::Short);
        assert_eq!(plan.stop_price, 102.0);
        assert_eq!(plan.target_price, 96.0);
        assert_eq!(plan.quantity, 5.0);
    }

    #[test]
    fn wait_has_no_plan() {
        assert!(RiskSizer::default()
            .size(&signal(Decision::Wait), 100.0, 1000.0, 1.0)
            .is_none());
    }

    #[test]
    fn zero_equity_has_no_plan() {
        let s = signal(Decision::Long);
        assert!(RiskSizer::default().size(&s, 100.0, 0.0, 1.0).is_none());
        assert!(RiskSizer::default().size(&s, 100.0, -5.0, 1.0).is_none());
    }

    #[test]
    fn zero_atr_has_no_plan_and_max_leverage() {
        let sizer = RiskSizer::default();
        assert!(sizer.size(&signal(Decision::Long), 100.0, 1000.0, 0.0).is_none());
        assert_eq!(sizer.leverage_for(0.0), 50);
        assert_eq!(sizer.leverage_for(f64::NAN), 50);
    }

    #[test]
    fn leverage_bounds() {
        let sizer = RiskSizer::default();
        assert_eq!(sizer.leverage_for(1e-12), 50);
        assert_eq!(sizer.leverage_for(0.1), 20);
        assert_eq!(sizer.leverage_for(1e12), 5);
        assert_eq!(sizer.leverage_for(f64::INFINITY), 5);
    }

    #[test]
    fn quantity_rounded_to_four_decimals() {
        let plan = RiskSizer::default()
            .size(&signal(Decision::Long), 30000.0, 1234.0, 37.0)
            .unwrap();
        assert_eq!(plan.quantity, round_to(12.34 / 37.0, 4));
    }

    #[test]
    fn default_sizer_is_valid() {
        assert!(RiskSizer::default().problems().is_empty());
    }
}
