//! Historical candles from CSV, for offline optimization.
//!
//! One file per symbol, `{dir}/{SYMBOL}.csv`, with a header row
//! `timestamp,open,high,low,close,volume`. The timestamp is either epoch
//! milliseconds (the exchange's own format) or RFC 3339.

use chrono::{DateTime, Utc};
use perpsig_core::domain::{normalize_series, Candle};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from the CSV loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: unreadable timestamp {value:?}")]
    BadTimestamp { row: usize, value: String },

    #[error("{path} contains no usable candles")]
    Empty { path: PathBuf },
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

/// Path of a symbol's file inside `dir`.
pub fn symbol_path(dir: &Path, symbol: &str) -> PathBuf {
    dir.join(format!("{symbol}.csv"))
}

/// Load and normalize one symbol's candles from `dir`.
pub fn load_symbol(dir: &Path, symbol: &str) -> Result<Vec<Candle>, LoadError> {
    load_candles_csv(&symbol_path(dir, symbol))
}

/// Load a CSV file into an oldest-first, de-duplicated series.
pub fn load_candles_csv(path: &Path) -> Result<Vec<Candle>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

    let mut candles = Vec::new();
    for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::BadTimestamp {
            row: i + 1,
            value: row.timestamp.clone(),
        })?;
        candles.push(Candle {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }

    let read = candles.len();
    let candles = normalize_series(candles);
    if candles.len() < read {
        warn!(
            path = %path.display(),
            dropped = read - candles.len(),
            "dropped duplicate or invalid rows"
        );
    }
    if candles.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }
    debug!(path = %path.display(), candles = candles.len(), "loaded candles");
    Ok(candles)
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ms) = value.parse::<i64>() {
        return DateTime::from_timestamp_millis(ms);
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
