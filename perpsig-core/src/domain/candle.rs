//! Candle: the fundamental market data unit.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// OHLCV candle for a single symbol on a single timeframe.
///
/// `timestamp` is the candle's open time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Returns true if any price field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic sanity check: positive close, high above low, no NaN.
    pub fn is_sane(&self) -> bool {
        !self.is_void() && self.close > 0.0 && self.high >= self.low
    }
}

/// Problems found when validating a candle series.
#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("timestamps not strictly increasing at index {index}")]
    NonMonotonic { index: usize },

    #[error("candle at index {index} has non-positive or missing close")]
    BadClose { index: usize },
}

/// Check the series invariants: strictly increasing timestamps, close > 0.
pub fn validate_series(candles: &[Candle]) -> Result<(), SeriesError> {
    for (i, c) in candles.iter().enumerate() {
        if !(c.close > 0.0) {
            return Err(SeriesError::BadClose { index: i });
        }
        if i > 0 && c.timestamp <= candles[i - 1].timestamp {
            return Err(SeriesError::NonMonotonic { index: i });
        }
    }
    Ok(())
}

/// Put a series produced by an adapter into canonical form.
///
/// Sorts oldest-first, drops duplicate timestamps (last one wins) and
/// discards candles that fail [`Candle::is_sane`].
pub fn normalize_series(mut candles: Vec<Candle>) -> Vec<Candle> {
    candles.retain(Candle::is_sane);
    candles.sort_by_key(|c| c.timestamp);
    let mut out: Vec<Candle> = Vec::with_capacity(candles.len());
    for c in candles {
        match out.last_mut() {
            Some(last) if last.timestamp == c.timestamp => *last = c,
            _ => out.push(c),
        }
    }
    out
}

/// Candle granularity, using the exchange's wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1H")]
    H1,
    #[serde(rename = "4H")]
    H4,
    #[serde(rename = "1D")]
    D1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M3 => "3m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::M30 => "30m",
            Self::H1 => "1H",
            Self::H4 => "4H",
            Self::D1 => "1D",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Self::M1 => Duration::minutes(1),
            Self::M3 => Duration::minutes(3),
            Self::M5 => Duration::minutes(5),
            Self::M15 => Duration::minutes(15),
            Self::M30 => Duration::minutes(30),
            Self::H1 => Duration::hours(1),
            Self::H4 => Duration::hours(4),
            Self::D1 => Duration::days(1),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Self::M1),
            "3m" => Ok(Self::M3),
            "5m" => Ok(Self::M5),
            "15m" => Ok(Self::M15),
            "30m" => Ok(Self::M30),
            "1H" | "1h" => Ok(Self::H1),
            "4H" | "4h" => Ok(Self::H4),
            "1D" | "1d" => Ok(Self::D1),
            other => Err(format!("unknown timeframe: {other}")),
        }
    }
}

/// The two series a strategy evaluates against.
///
/// `fast` supplies the reference price, ATR proxy and RSI; `slow` supplies
/// MACD and the breakout channel. Single-timeframe callers (the optimizer)
/// pass the same slice for both.
#[derive(Debug, Clone, Copy)]
pub struct MarketSeries<'a> {
    pub fast: &'a [Candle],
    pub slow: &'a [Candle],
}

impl<'a> MarketSeries<'a> {
    pub fn new(fast: &'a [Candle], slow: &'a [Candle]) -> Self {
        Self { fast, slow }
    }

    pub fn single(candles: &'a [Candle]) -> Self {
        Self {
            fast: candles,
            slow: candles,
        }
    }
}

/// Build candles from close prices, one minute apart. Test helper.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    let base = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: base + Duration::minutes(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_series_passes() {
        let candles = make_candles(&[100.0, 101.0, 102.0]);
        assert_eq!(validate_series(&candles), Ok(()));
    }

    #[test]
    fn duplicate_timestamp_rejected() {
        let mut candles = make_candles(&[100.0, 101.0, 102.0]);
        candles[2].timestamp = candles[1].timestamp;
        assert_eq!(
            validate_series(&candles),
            Err(SeriesError::NonMonotonic { index: 2 })
        );
    }

    #[test]
    fn zero_close_rejected() {
        let mut candles = make_candles(&[100.0, 101.0]);
        candles[1].close = 0.0;
        assert_eq!(
            validate_series(&candles),
            Err(SeriesError::BadClose { index: 1 })
        );
    }

    #[test]
    fn normalize_sorts_and_dedups() {
        let mut candles = make_candles(&[100.0, 101.0, 102.0]);
        candles.reverse();
        let mut dup = candles[0].clone();
        dup.close = 105.0;
        candles.push(dup);
        let out = normalize_series(candles);
        assert_eq!(out.len(), 3);
        assert_eq!(validate_series(&out), Ok(()));
        assert_eq!(out[2].close, 105.0);
    }

    #[test]
    fn normalize_drops_insane() {
        let mut candles = make_candles(&[100.0, 101.0, 102.0]);
        candles[1].close = f64::NAN;
        assert_eq!(normalize_series(candles).len(), 2);
    }

    #[test]
    fn timeframe_wire_names() {
        assert_eq!(Timeframe::M15.as_str(), "15m");
        assert_eq!("1H".parse::<Timeframe>(), Ok(Timeframe::H1));
        let json = serde_json::to_string(&Timeframe::M1).unwrap();
        assert_eq!(json, "\"1m\"");
    }
}
