//! Precomputed indicator series over a fast/slow pair and per-candle snapshots.
//!
//! Built once per (series, window set), then queried by fast-series index.
//! The optimizer reuses one frame for every threshold combination that
//! shares the same windows.

use super::{Adx, AtrProxy, Bollinger, Channel, Indicator, Macd, Rsi, Sma};
use crate::domain::{Candle, MarketSeries};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Window sizes that determine the indicator series. Thresholds are not part
/// of it; two parameter sets with equal specs share a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndicatorSpec {
    /// `None` averages the ATR proxy over the whole fast series.
    pub atr_period: Option<usize>,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub channel_window: usize,
    pub band_period: usize,
    pub adx_period: usize,
    pub ma_short: usize,
    pub ma_long: usize,
}

/// Indicator values as of one fast candle. `None` means undefined.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub price: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub atr: Option<f64>,
    pub rsi: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub channel_high: Option<f64>,
    pub channel_low: Option<f64>,
    pub band_middle: Option<f64>,
    pub band_stddev: Option<f64>,
    pub adx: Option<f64>,
    pub ma_short: Option<f64>,
    pub ma_long: Option<f64>,
}

/// All series a strategy can read, aligned to the fast series.
#[derive(Debug, Clone)]
pub struct IndicatorFrame {
    spec: IndicatorSpec,
    prices: Vec<f64>,
    timestamps: Vec<DateTime<Utc>>,
    atr: Vec<f64>,
    rsi: Vec<f64>,
    band_middle: Vec<f64>,
    band_stddev: Vec<f64>,
    adx: Vec<f64>,
    ma_short: Vec<f64>,
    ma_long: Vec<f64>,
    macd_histogram: Vec<f64>,
    channel_high: Vec<f64>,
    channel_low: Vec<f64>,
    /// Per fast index: number of slow candles opened at or before it.
    slow_at_or_before: Vec<usize>,
    /// Per fast index: number of slow candles opened strictly before it.
    slow_before: Vec<usize>,
}

impl IndicatorFrame {
    pub fn compute(series: MarketSeries<'_>, spec: IndicatorSpec) -> Self {
        let fast = series.fast;
        let slow = series.slow;
        let (slow_at_or_before, slow_before) = align(fast, slow);

        Self {
            spec,
            prices: fast.iter().map(|c| c.close).collect(),
            timestamps: fast.iter().map(|c| c.timestamp).collect(),
            atr: AtrProxy::from_window(spec.atr_period).compute(fast),
            rsi: Rsi::new(spec.rsi_period).compute(fast),
            band_middle: Bollinger::middle(spec.band_period).compute(fast),
            band_stddev: Bollinger::stddev(spec.band_period).compute(fast),
            adx: Adx::new(spec.adx_period).compute(fast),
            ma_short: Sma::new(spec.ma_short).compute(fast),
            ma_long: Sma::new(spec.ma_long).compute(fast),
            macd_histogram: Macd::histogram(spec.macd_fast, spec.macd_slow, spec.macd_signal)
                .compute(slow),
            channel_high: Channel::high(spec.channel_window).compute(slow),
            channel_low: Channel::low(spec.channel_window).compute(slow),
            slow_at_or_before,
            slow_before,
        }
    }

    pub fn spec(&self) -> &IndicatorSpec {
        &self.spec
    }

    /// Number of fast candles.
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Snapshot as of fast candle `index`. Out of range yields all-`None`.
    pub fn snapshot_at(&self, index: usize) -> Snapshot {
        if index >= self.len() {
            return Snapshot::default();
        }
        let le = self.slow_at_or_before[index];
        let lt = self.slow_before[index];
        Snapshot {
            price: defined(self.prices[index]),
            timestamp: Some(self.timestamps[index]),
            atr: defined(self.atr[index]),
            rsi: defined(self.rsi[index]),
            macd_histogram: le.checked_sub(1).and_then(|j| defined(self.macd_histogram[j])),
            channel_high: lt.checked_sub(1).and_then(|j| defined(self.channel_high[j])),
            channel_low: lt.checked_sub(1).and_then(|j| defined(self.channel_low[j])),
            band_middle: defined(self.band_middle[index]),
            band_stddev: defined(self.band_stddev[index]),
            adx: defined(self.adx[index]),
            ma_short: defined(self.ma_short[index]),
            ma_long: defined(self.ma_long[index]),
        }
    }

    /// Snapshot as of the newest fast candle.
    pub fn latest(&self) -> Snapshot {
        match self.len() {
            0 => Snapshot::default(),
            n => self.snapshot_at(n - 1),
        }
    }
}

fn defined(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

/// Two-pointer walk; both series are oldest-first.
fn align(fast: &[Candle], slow: &[Candle]) -> (Vec<usize>, Vec<usize>) {
    let mut at_or_before = Vec::with_capacity(fast.len());
    let mut before = Vec::with_capacity(fast.len());
    let mut le = 0usize;
    let mut lt = 0usize;
    for candle in fast {
        while le < slow.len() && slow[le].timestamp <= candle.timestamp {
            le += 1;
        }
        while lt < slow.len() && slow[lt].timestamp < candle.timestamp {
            lt += 1;
        }
        at_or_before.push(le);
        before.push(lt);
    }
    (at_or_before, before)
}
