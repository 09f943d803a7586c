//! Moving-average trend with an ATR extension filter.
//!
//! Long: price > long MA AND short MA > long MA AND
//! (price - long MA) > trend_atr_mult * ATR. Short mirrors.

use super::{RequiredLen, SignalStrategy, StrategyParams};
use crate::domain::Decision;
use crate::indicators::Snapshot;

#[derive(Debug, Clone, Default)]
pub struct Trend;

impl SignalStrategy for Trend {
    fn name(&self) -> &str {
        "trend"
    }

    fn required_len(&self, params: &StrategyParams) -> RequiredLen {
        RequiredLen {
            fast: params.ma_long.max(params.atr_lookback() + 1),
            slow: 0,
        }
    }

    fn classify(&self, s: &Snapshot, params: &StrategyParams) -> Decision {
        let (Some(price), Some(short_ma), Some(long_ma), Some(atr)) =
            (s.price, s.ma_short, s.ma_long, s.atr)
        else {
            return Decision::Wait;
        };

        let extension = params.trend_atr_mult * atr;
        let long = price > long_ma && short_ma > long_ma && price - long_ma > extension;
        let short = price < long_ma && short_ma < long_ma && long_ma - price > extension;
        Decision::from_conditions(long, short)
    }
}
