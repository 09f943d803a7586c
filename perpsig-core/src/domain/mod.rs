//! Domain types for perpsig

pub mod candle;
pub mod plan;
pub mod position;
pub mod signal;

pub use candle::{normalize_series, validate_series, Candle, MarketSeries, SeriesError, Timeframe};
pub use plan::{Brackets, OrderPlan};
pub use position::{OrderSide, Position};
pub use signal::{Decision, Side, Signal};

/// Symbol type alias
pub type Symbol = String;
