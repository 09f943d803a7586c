use super::signal::Side;
use serde::{Deserialize, Serialize};

/// Exchange-reported position. Never authoritative locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    /// Absolute contract size, always positive.
    pub size: f64,
    pub average_entry_price: f64,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.size > 0.0
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.side.direction() * self.size * (current_price - self.average_entry_price)
    }
}

/// Order direction on the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Side of the order that opens a position on `side`.
    pub fn opening(side: Side) -> Self {
        match side {
            Side::Long => Self::Buy,
            Side::Short => Self::Sell,
        }
    }

    /// Side of the order that reduces a position on `side`.
    pub fn closing(side: Side) -> Self {
        Self::opening(side.opposite())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}
