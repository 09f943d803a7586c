//! Engine configuration, loaded once from TOML and validated at startup.
//!
//! Every section carries `#[serde(default)]`, so an empty file is a valid
//! advisory-mode configuration over the default universe.

use crate::optimizer::ParamGrid;
use crate::param_book::ParameterBook;
use perpsig_core::domain::Timeframe;
use perpsig_core::exchange::BitgetConfig;
use perpsig_core::execution::ExecutionSettings;
use perpsig_core::sizer::RiskSizer;
use perpsig_core::strategy::{create_strategy, StrategyKind, StrategyParams};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Errors from loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}

/// Advisory sends recommendations only; live drives the execution machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Advisory,
    Live,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Advisory => "advisory",
            Self::Live => "live",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    pub symbols: Vec<String>,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        let symbols = [
            "BTCUSDT", "ETHUSDT", "SOLUSDT", "BNBUSDT", "XRPUSDT", "ADAUSDT", "MATICUSDT",
            "DOGEUSDT", "LINKUSDT", "AVAXUSDT",
        ];
        Self {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Fast series: price, ATR proxy, RSI. Slow series: MACD and the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeframeConfig {
    pub fast: Timeframe,
    pub fast_limit: usize,
    pub slow: Timeframe,
    pub slow_limit: usize,
}

impl Default for TimeframeConfig {
    fn default() -> Self {
        Self {
            fast: Timeframe::M1,
            fast_limit: 50,
            slow: Timeframe::M15,
            slow_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub kind: StrategyKind,
    pub params: StrategyParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub mode: Mode,
    pub grid_entries: usize,
    pub entry_pause_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        let settings = ExecutionSettings::default();
        Self {
            mode: Mode::Advisory,
            grid_entries: settings.grid_entries,
            entry_pause_ms: settings.entry_pause_ms,
        }
    }
}

impl ExecutionConfig {
    pub fn settings(&self) -> ExecutionSettings {
        ExecutionSettings {
            grid_entries: self.grid_entries,
            entry_pause_ms: self.entry_pause_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub loop_interval_secs: u64,
    pub symbol_pause_ms: u64,
    /// Sleep used instead of the loop interval when equity is unavailable.
    pub equity_retry_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            loop_interval_secs: 300,
            symbol_pause_ms: 1000,
            equity_retry_secs: 30,
        }
    }
}

impl ScheduleConfig {
    pub fn loop_interval(&self) -> Duration {
        Duration::from_secs(self.loop_interval_secs)
    }

    pub fn symbol_pause(&self) -> Duration {
        Duration::from_millis(self.symbol_pause_ms)
    }

    pub fn equity_retry(&self) -> Duration {
        Duration::from_secs(self.equity_retry_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Explicit grid. Unset uses the configured strategy's default grid.
    pub grid: Option<ParamGrid>,
    pub timeframe: Timeframe,
    pub history_limit: usize,
    /// Upper bound on |grid| x candles for one pass.
    pub max_evaluations: usize,
    /// Where `optimize` writes the parameter book and `run` reads it.
    pub param_book: PathBuf,
}

impl OptimizerConfig {
    /// The grid searched for `kind`.
    pub fn grid_for(&self, kind: StrategyKind) -> ParamGrid {
        self.grid
            .clone()
            .unwrap_or_else(|| ParamGrid::for_strategy(kind))
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            grid: None,
            timeframe: Timeframe::M15,
            history_limit: 1000,
            max_evaluations: 2_000_000,
            param_book: PathBuf::from("param_book.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self { timeout_secs: 5 }
    }
}

impl NotifyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub enabled: bool,
    pub bind: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Top-level configuration. Immutable once validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub universe: UniverseConfig,
    pub timeframes: TimeframeConfig,
    pub strategy: StrategyConfig,
    pub risk: RiskSizer,
    pub execution: ExecutionConfig,
    pub schedule: ScheduleConfig,
    pub optimizer: OptimizerConfig,
    pub exchange: BitgetConfig,
    pub notify: NotifyConfig,
    pub health: HealthConfig,
    /// Per-symbol partial overrides of `strategy.params`, e.g.
    /// `[params.BTCUSDT] rsi_hi = 75`.
    pub params: BTreeMap<String, toml::Table>,
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check every constraint and report all violations together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.universe.symbols.is_empty() {
            problems.push("universe.symbols must not be empty".to_string());
        }
        let mut seen = std::collections::BTreeSet::new();
        for symbol in &self.universe.symbols {
            if symbol.trim().is_empty() {
                problems.push("universe.symbols contains an empty symbol".to_string());
            } else if !seen.insert(symbol.as_str()) {
                problems.push(format!("universe.symbols lists {symbol} twice"));
            }
        }

        let tf = &self.timeframes;
        for (name, limit) in [("fast_limit", tf.fast_limit), ("slow_limit", tf.slow_limit)] {
            if limit == 0 || limit > 1000 {
                problems.push(format!("timeframes.{name} must be in 1..=1000, got {limit}"));
            }
        }

        problems.extend(
            self.strategy
                .params
                .problems()
                .into_iter()
                .map(|p| format!("strategy.params: {p}")),
        );
        if self.strategy.params.problems().is_empty() {
            let required = create_strategy(self.strategy.kind).required_len(&self.strategy.params);
            if tf.fast_limit < required.fast {
                problems.push(format!(
                    "timeframes.fast_limit ({}) is below the {} strategy's requirement of {}",
                    tf.fast_limit, self.strategy.kind, required.fast
                ));
            }
            if tf.slow_limit < required.slow {
                problems.push(format!(
                    "timeframes.slow_limit ({}) is below the {} strategy's requirement of {}",
                    tf.slow_limit, self.strategy.kind, required.slow
                ));
            }
        }

        problems.extend(self.risk.problems().into_iter().map(|p| format!("risk: {p}")));

        if self.execution.grid_entries == 0 {
            problems.push("execution.grid_entries must be >= 1".to_string());
        }
        if self.schedule.loop_interval_secs == 0 {
            problems.push("schedule.loop_interval_secs must be >= 1".to_string());
        }

        let opt = &self.optimizer;
        let grid = opt.grid_for(self.strategy.kind);
        if !grid.searches(self.strategy.kind) {
            problems.push(format!(
                "optimizer.grid varies nothing the {} strategy reads",
                self.strategy.kind
            ));
        }
        if opt.history_limit == 0 || opt.history_limit > 1000 {
            problems.push(format!(
                "optimizer.history_limit must be in 1..=1000, got {}",
                opt.history_limit
            ));
        }
        let evaluations = grid.size().saturating_mul(opt.history_limit);
        if evaluations > opt.max_evaluations {
            problems.push(format!(
                "optimizer pass needs {evaluations} evaluations, above max_evaluations {}",
                opt.max_evaluations
            ));
        }

        if tf.fast_limit < 2 && self.strategy.params.atr_period.is_none() {
            problems.push("timeframes.fast_limit must be >= 2 for the ATR proxy".to_string());
        }

        if self.exchange.market_timeout_secs == 0 || self.exchange.private_timeout_secs == 0 {
            problems.push("exchange timeouts must be >= 1 second".to_string());
        }
        if self.notify.timeout_secs == 0 {
            problems.push("notify.timeout_secs must be >= 1".to_string());
        }
        if self.health.enabled && self.health.bind.parse::<std::net::SocketAddr>().is_err() {
            problems.push(format!("health.bind is not a socket address: {}", self.health.bind));
        }

        for (symbol, overrides) in &self.params {
            if !self.universe.symbols.contains(symbol) {
                problems.push(format!("params.{symbol} overrides a symbol outside the universe"));
            }
            match self.apply_overrides(overrides) {
                Ok(params) => problems.extend(
                    params
                        .problems()
                        .into_iter()
                        .map(|p| format!("params.{symbol}: {p}")),
                ),
                Err(e) => problems.push(format!("params.{symbol}: {e}")),
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    /// Parameters for `symbol`: the optimized book entry wins over a
    /// `[params.SYMBOL]` override, which wins over `strategy.params`. An
    /// unset ATR window becomes the whole fast fetch, `fast_limit - 1`
    /// differences.
    pub fn params_for(&self, symbol: &str, book: Option<&ParameterBook>) -> StrategyParams {
        let mut params = self.unresolved_params_for(symbol, book);
        if params.atr_period.is_none() {
            params.atr_period = Some(self.timeframes.fast_limit.saturating_sub(1).max(1));
        }
        params
    }

    fn unresolved_params_for(&self, symbol: &str, book: Option<&ParameterBook>) -> StrategyParams {
        if let Some(entry) = book
            .filter(|b| b.strategy == self.strategy.kind)
            .and_then(|b| b.entries.get(symbol))
        {
            return entry.params.clone();
        }
        match self.params.get(symbol) {
            Some(overrides) => match self.apply_overrides(overrides) {
                Ok(params) => params,
                Err(e) => {
                    warn!(symbol, error = %e, "ignoring unreadable parameter override");
                    self.strategy.params.clone()
                }
            },
            None => self.strategy.params.clone(),
        }
    }

    /// Merge a partial table over the base parameters.
    fn apply_overrides(&self, overrides: &toml::Table) -> Result<StrategyParams, String> {
        let mut merged = match toml::Value::try_from(&self.strategy.params) {
            Ok(toml::Value::Table(table)) => table,
            Ok(_) => return Err("parameters did not serialize to a table".to_string()),
            Err(e) => return Err(e.to_string()),
        };
        for (key, value) in overrides {
            merged.insert(key.clone(), value.clone());
        }
        toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| e.to_string())
    }
}
