//! Strategy selection from configuration.

use super::{BandAdx, Breakout, SignalStrategy, Trend};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configured strategy name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Breakout,
    BandAdx,
    Trend,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Breakout => "breakout",
            Self::BandAdx => "band_adx",
            Self::Trend => "trend",
        })
    }
}

/// Create the strategy for a configured kind.
pub fn create_strategy(kind: StrategyKind) -> Box<dyn SignalStrategy> {
    match kind {
        StrategyKind::Breakout => Box::new(Breakout),
        StrategyKind::BandAdx => Box::new(BandAdx),
        StrategyKind::Trend => Box::new(Trend),
    }
}
