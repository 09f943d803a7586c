//! Bollinger band break filtered by trend strength.
//!
//! Long: close > upper band AND RSI < rsi_hi AND ADX > adx_threshold.
//! Short: close < lower band AND RSI > rsi_lo AND ADX > adx_threshold.
//! Reads the fast series only.

use super::{RequiredLen, SignalStrategy, StrategyParams};
use crate::domain::Decision;
use crate::indicators::bollinger::bands;
use crate::indicators::Snapshot;

#[derive(Debug, Clone, Default)]
pub struct BandAdx;

impl SignalStrategy for BandAdx {
    fn name(&self) -> &str {
        "band_adx"
    }

    fn required_len(&self, params: &StrategyParams) -> RequiredLen {
        RequiredLen {
            fast: params
                .band_period
                .max(params.rsi_period + 1)
                .max(params.adx_period + 1),
            slow: 0,
        }
    }

    fn classify(&self, s: &Snapshot, params: &StrategyParams) -> Decision {
        let (Some(price), Some(middle), Some(stddev), Some(rsi), Some(adx)) =
            (s.price, s.band_middle, s.band_stddev, s.rsi, s.adx)
        else {
            return Decision::Wait;
        };

        let (upper, lower) = bands(middle, stddev, params.band_mult);
        let trending = adx > params.adx_threshold;
        let long = price > upper && rsi < params.rsi_hi && trending;
        let short = price < lower && rsi > params.rsi_lo && trending;
        Decision::from_conditions(long, short)
    }
}
