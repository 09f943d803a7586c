//! The live polling loop.
//!
//! One cycle reads equity once, then walks the universe sequentially:
//! fetch candles, evaluate, size, and either send a recommendation
//! (advisory) or advance the execution machine (live). Nothing after
//! startup is fatal; a stop request is honoured between cycles.

use crate::config::{EngineConfig, Mode};
use crate::messages;
use crate::param_book::ParameterBook;
use perpsig_core::domain::{Candle, MarketSeries, OrderPlan, Signal};
use perpsig_core::exchange::{Exchange, MarketData};
use perpsig_core::execution::{ExecutionEvent, ExecutionMachine, StepInput, StepReport};
use perpsig_core::notify::Notifier;
use perpsig_core::pacing::Pacer;
use perpsig_core::strategy::{create_strategy, SignalStrategy, StrategyParams};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// What happened to one symbol in a cycle.
#[derive(Debug, Clone)]
pub struct SymbolOutcome {
    pub symbol: String,
    pub signal: Option<Signal>,
    pub plan: Option<OrderPlan>,
    /// Live mode only.
    pub step: Option<StepReport>,
    /// Why the symbol was not evaluated.
    pub skipped: Option<String>,
}

#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Completed {
        equity: f64,
        symbols: Vec<SymbolOutcome>,
    },
    /// Equity missing or not positive; nothing was evaluated.
    EquityUnavailable,
}

/// Collaborators the scheduler drives.
pub struct Collaborators {
    pub market: Arc<dyn MarketData>,
    pub exchange: Arc<dyn Exchange>,
    pub notifier: Arc<dyn Notifier>,
    pub pacer: Arc<dyn Pacer>,
}

pub struct Scheduler {
    config: EngineConfig,
    market: Arc<dyn MarketData>,
    exchange: Arc<dyn Exchange>,
    notifier: Arc<dyn Notifier>,
    pacer: Arc<dyn Pacer>,
    strategy: Box<dyn SignalStrategy>,
    params: BTreeMap<String, StrategyParams>,
    machine: ExecutionMachine,
}

impl Scheduler {
    /// `config` must already be validated. Per-symbol parameters are
    /// resolved here, once.
    pub fn new(
        config: EngineConfig,
        collaborators: Collaborators,
        book: Option<&ParameterBook>,
    ) -> Self {
        let params = config
            .universe
            .symbols
            .iter()
            .map(|s| (s.clone(), config.params_for(s, book)))
            .collect();
        let machine = ExecutionMachine::new(config.execution.settings(), config.risk.clone());
        Self {
            strategy: create_strategy(config.strategy.kind),
            market: collaborators.market,
            exchange: collaborators.exchange,
            notifier: collaborators.notifier,
            pacer: collaborators.pacer,
            params,
            machine,
            config,
        }
    }

    pub fn machine(&self) -> &ExecutionMachine {
        &self.machine
    }

    pub fn params(&self, symbol: &str) -> Option<&StrategyParams> {
        self.params.get(symbol)
    }

    /// Run cycles until `stop` is set. `ready` is raised once the loop starts.
    pub fn run(&mut self, stop: &AtomicBool, ready: &AtomicBool) {
        self.notifier.notify(&messages::startup(&self.config));
        ready.store(true, Ordering::Relaxed);
        info!(
            mode = %self.config.execution.mode,
            strategy = self.strategy.name(),
            symbols = self.config.universe.symbols.len(),
            "trading loop started"
        );

        while !stop.load(Ordering::Relaxed) {
            let wait = match self.run_cycle() {
                CycleOutcome::Completed { .. } => self.config.schedule.loop_interval(),
                CycleOutcome::EquityUnavailable => self.config.schedule.equity_retry(),
            };
            self.sleep_unless_stopped(wait, stop);
        }
        info!("trading loop stopped");
    }

    fn sleep_unless_stopped(&self, total: Duration, stop: &AtomicBool) {
        let slice = Duration::from_millis(500);
        let mut left = total;
        while !left.is_zero() && !stop.load(Ordering::Relaxed) {
            let step = left.min(slice);
            self.pacer.pause(step);
            left -= step;
        }
    }

    /// One pass over the universe.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        let equity = match self.exchange.equity() {
            Ok(equity) if equity > 0.0 => equity,
            Ok(equity) => {
                warn!(equity, "equity not positive, pausing");
                return CycleOutcome::EquityUnavailable;
            }
            Err(e) => {
                warn!(error = %e, "equity unavailable, pausing");
                if e.is_authentication() {
                    self.notifier
                        .notify(&messages::authentication_alert(None, &e.to_string()));
                }
                return CycleOutcome::EquityUnavailable;
            }
        };
        info!(equity, "cycle started");

        let symbols = self.config.universe.symbols.clone();
        let mut outcomes = Vec::with_capacity(symbols.len());
        for (i, symbol) in symbols.iter().enumerate() {
            if i > 0 {
                self.pacer.pause(self.config.schedule.symbol_pause());
            }
            outcomes.push(self.process_symbol(symbol, equity));
        }
        CycleOutcome::Completed {
            equity,
            symbols: outcomes,
        }
    }

    fn process_symbol(&mut self, symbol: &str, equity: f64) -> SymbolOutcome {
        let mut outcome = SymbolOutcome {
            symbol: symbol.to_string(),
            signal: None,
            plan: None,
            step: None,
            skipped: None,
        };
        let Some(params) = self.params.get(symbol).cloned() else {
            outcome.skipped = Some("no parameters".to_string());
            return outcome;
        };

        let tf = &self.config.timeframes;
        let fast = self.market.fetch_candles(symbol, tf.fast, tf.fast_limit);
        if fast.is_empty() {
            warn!(symbol, timeframe = %tf.fast, "no candles, skipping");
            outcome.skipped = Some(format!("no {} candles", tf.fast));
            return outcome;
        }
        let slow: Vec<Candle> = if self.strategy.required_len(&params).slow > 0 {
            let slow = self.market.fetch_candles(symbol, tf.slow, tf.slow_limit);
            if slow.is_empty() {
                warn!(symbol, timeframe = %tf.slow, "no candles, skipping");
                outcome.skipped = Some(format!("no {} candles", tf.slow));
                return outcome;
            }
            slow
        } else {
            Vec::new()
        };
        let series = if slow.is_empty() {
            MarketSeries::single(&fast)
        } else {
            MarketSeries::new(&fast, &slow)
        };

        let (signal, snapshot) = self.strategy.assess(symbol, series, &params);
        let plan = snapshot
            .atr
            .and_then(|atr| self.config.risk.size(&signal, signal.reference_price, equity, atr));
        debug!(
            symbol,
            decision = %signal.decision,
            price = signal.reference_price,
            atr = ?snapshot.atr,
            sized = plan.is_some(),
            "evaluated"
        );

        match self.config.execution.mode {
            Mode::Advisory => {
                self.notifier.notify(&messages::advisory(&signal, plan.as_ref()));
            }
            Mode::Live => {
                let report = self.machine.step(
                    self.exchange.as_ref(),
                    self.pacer.as_ref(),
                    StepInput {
                        signal: &signal,
                        plan: plan.as_ref(),
                        atr: snapshot.atr,
                    },
                );
                if report.authentication_failed() {
                    error!(symbol, "exchange rejected credentials");
                    let detail = report
                        .events
                        .iter()
                        .filter(|e| e.is_authentication_failure())
                        .find_map(|e| match e {
                            ExecutionEvent::EntryFailed { error, .. }
                            | ExecutionEvent::CloseFailed { error, .. }
                            | ExecutionEvent::Skipped { reason: error, .. } => Some(error.as_str()),
                            _ => None,
                        })
                        .unwrap_or("authentication failed");
                    self.notifier
                        .notify(&messages::authentication_alert(Some(symbol), detail));
                }
                if let Some(text) = messages::execution(&report) {
                    self.notifier.notify(&text);
                }
                outcome.step = Some(report);
            }
        }

        outcome.signal = Some(signal);
        outcome.plan = plan;
        outcome
    }
}
