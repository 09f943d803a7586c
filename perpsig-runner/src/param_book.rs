//! Optimized per-symbol parameters, persisted as JSON.
//!
//! Written by `perpsig optimize`, read by the live scheduler. Each entry
//! carries a blake3 fingerprint of the candles and grid it was tuned on.

use crate::backtest::BacktestScore;
use crate::optimizer::{Optimization, ParamGrid};
use chrono::{DateTime, Utc};
use perpsig_core::domain::{Candle, Timeframe};
use perpsig_core::strategy::{StrategyKind, StrategyParams};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookError {
    #[error("parameter book {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parameter book is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookEntry {
    pub params: StrategyParams,
    pub win_rate: f64,
    pub trades: usize,
    pub wins: usize,
    pub evaluated: usize,
    pub candle_count: usize,
    pub fingerprint: String,
}

impl BookEntry {
    pub fn from_optimization(result: &Optimization, fingerprint: String) -> Self {
        let BacktestScore {
            trades,
            wins,
            win_rate,
        } = result.score;
        Self {
            params: result.best.clone(),
            win_rate,
            trades,
            wins,
            evaluated: result.evaluated,
            candle_count: result.candle_count,
            fingerprint,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterBook {
    pub created_at: DateTime<Utc>,
    /// Strategy the entries were tuned for; ignored by other strategies.
    pub strategy: StrategyKind,
    pub timeframe: Timeframe,
    pub entries: BTreeMap<String, BookEntry>,
}

impl ParameterBook {
    pub fn new(strategy: StrategyKind, timeframe: Timeframe) -> Self {
        Self {
            created_at: Utc::now(),
            strategy,
            timeframe,
            entries: BTreeMap::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, BookError> {
        let text = std::fs::read_to_string(path).map_err(|source| BookError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write atomically: a sibling temp file renamed over `path`.
    pub fn save(&self, path: &Path) -> Result<(), BookError> {
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        let io = |source| BookError::Io {
            path: path.to_path_buf(),
            source,
        };
        std::fs::write(&tmp, json).map_err(io)?;
        std::fs::rename(&tmp, path).map_err(io)
    }
}

/// Content hash of an optimization input.
pub fn fingerprint(kind: StrategyKind, candles: &[Candle], grid: &ParamGrid) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(kind.to_string().as_bytes());
    for c in candles {
        hasher.update(&c.timestamp.timestamp_millis().to_le_bytes());
        for v in [c.open, c.high, c.low, c.close, c.volume] {
            hasher.update(&v.to_le_bytes());
        }
    }
    for axis in [
        &grid.band_mult,
        &grid.rsi_hi,
        &grid.rsi_lo,
        &grid.adx_threshold,
        &grid.trend_atr_mult,
    ] {
        hasher.update(&(axis.len() as u64).to_le_bytes());
        for v in axis {
            hasher.update(&v.to_le_bytes());
        }
    }
    for axis in [&grid.channel_window, &grid.band_period, &grid.ma_short, &grid.ma_long] {
        hasher.update(&(axis.len() as u64).to_le_bytes());
        for v in axis {
            hasher.update(&(*v as u64).to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn candles(n: usize) -> Vec<Candle> {
        let base = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        (0..n)
            .map(|i| Candle {
                timestamp: base + Duration::minutes(i as i64),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0 + i as f64,
                volume: 1.0,
            })
            .collect()
    }

    #[test]
    fn fingerprint_is_deterministic_and_sensitive() {
        let grid = ParamGrid::default();
        let a = fingerprint(StrategyKind::Breakout, &candles(10), &grid);
        assert_eq!(a, fingerprint(StrategyKind::Breakout, &candles(10), &grid));
        assert_eq!(a.len(), 64);
        assert_ne!(a, fingerprint(StrategyKind::Trend, &candles(10), &grid));
        assert_ne!(a, fingerprint(StrategyKind::Breakout, &candles(11), &grid));
        let narrower = ParamGrid {
            band_mult: vec![2.0],
            ..ParamGrid::default()
        };
        assert_ne!(a, fingerprint(StrategyKind::Breakout, &candles(10), &narrower));
        let with_ma = ParamGrid {
            ma_long: vec![20, 30],
            ..ParamGrid::default()
        };
        assert_ne!(a, fingerprint(StrategyKind::Breakout, &candles(10), &with_ma));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.json");
        let mut book = ParameterBook::new(StrategyKind::BandAdx, Timeframe::M15);
        book.entries.insert(
            "ETHUSDT".to_string(),
            BookEntry {
                params: StrategyParams::default(),
                win_rate: 0.55,
                trades: 20,
                wins: 11,
                evaluated: 81,
                candle_count: 1000,
                fingerprint: "abc".to_string(),
            },
        );
        book.save(&path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(ParameterBook::load(&path).unwrap(), book);
    }

    #[test]
    fn missing_book_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ParameterBook::load(&dir.path().join("none.json")),
            Err(BookError::Io { .. })
        ));
    }
}
