use super::signal::Side;
use serde::{Deserialize, Serialize};

/// Stop and target around an entry price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Brackets {
    pub stop_price: f64,
    pub target_price: f64,
}

impl Brackets {
    /// True if `price` has reached the target for a position on `side`.
    pub fn target_hit(&self, side: Side, price: f64) -> bool {
        match side {
            Side::Long => price >= self.target_price,
            Side::Short => price <= self.target_price,
        }
    }

    /// True if `price` has reached the stop for a position on `side`.
    pub fn stop_hit(&self, side: Side, price: f64) -> bool {
        match side {
            Side::Long => price <= self.stop_price,
            Side::Short => price >= self.stop_price,
        }
    }
}

/// Concrete sized order derived from a signal, equity and volatility.
///
/// `quantity * |entry_price - stop_price|` is approximately
/// `equity * risk_fraction`, up to the four-decimal quantity rounding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlan {
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub leverage: u32,
    pub quantity: f64,
}

impl OrderPlan {
    pub fn brackets(&self) -> Brackets {
        Brackets {
            stop_price: self.stop_price,
            target_price: self.target_price,
        }
    }

    /// Loss if the stop is hit, ignoring fees.
    pub fn risk_amount(&self) -> f64 {
        self.quantity * (self.entry_price - self.stop_price).abs()
    }
}
