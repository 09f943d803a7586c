use super::lifecycle::{CloseReason, ExecutionEvent, Lifecycle, StepReport};
use crate::domain::{Brackets, OrderPlan, OrderSide, Position, Side, Signal};
use crate::exchange::{Exchange, ExchangeError, OrderRequest};
use crate::pacing::Pacer;
use crate::sizer::{round_to, RiskSizer, QUANTITY_DECIMALS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Number of equal child orders an entry is split into.
    pub grid_entries: usize,
    pub entry_pause_ms: u64,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            grid_entries: 3,
            entry_pause_ms: 300,
        }
    }
}

impl ExecutionSettings {
    pub fn entry_pause(&self) -> Duration {
        Duration::from_millis(self.entry_pause_ms)
    }
}

/// What the machine is told about a symbol this cycle.
#[derive(Debug, Clone, Copy)]
pub struct StepInput<'a> {
    pub signal: &'a Signal,
    /// Sized plan for an actionable signal, `None` otherwise.
    pub plan: Option<&'a OrderPlan>,
    /// Current ATR proxy, used to recompute brackets for adopted positions.
    pub atr: Option<f64>,
}

/// Per-symbol lifecycles plus the settings that drive transitions.
#[derive(Debug, Clone, Default)]
pub struct ExecutionMachine {
    settings: ExecutionSettings,
    sizer: RiskSizer,
    states: BTreeMap<String, Lifecycle>,
}

impl ExecutionMachine {
    pub fn new(settings: ExecutionSettings, sizer: RiskSizer) -> Self {
        Self {
            settings,
            sizer,
            states: BTreeMap::new(),
        }
    }

    pub fn state(&self, symbol: &str) -> Lifecycle {
        self.states.get(symbol).cloned().unwrap_or_default()
    }

    pub fn states(&self) -> &BTreeMap<String, Lifecycle> {
        &self.states
    }

    /// Advance one symbol by one cycle.
    pub fn step(
        &mut self,
        exchange: &dyn Exchange,
        pacer: &dyn Pacer,
        input: StepInput<'_>,
    ) -> StepReport {
        let symbol = input.signal.symbol.clone();
        let before = self.state(&symbol);
        let mut events = Vec::new();

        let after = match exchange.position(&symbol) {
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "position read failed, skipping");
                events.push(ExecutionEvent::Skipped {
                    reason: e.to_string(),
                    authentication: e.is_authentication(),
                });
                before.clone()
            }
            Ok(position) => {
                let position = position.filter(Position::is_open);
                self.transition(exchange, pacer, &input, &before, position, &mut events)
            }
        };

        if after != before {
            info!(symbol = %symbol, from = %before, to = %after, "lifecycle transition");
        }
        self.states.insert(symbol.clone(), after.clone());
        StepReport {
            symbol,
            before,
            after,
            events,
        }
    }

    fn transition(
        &self,
        exchange: &dyn Exchange,
        pacer: &dyn Pacer,
        input: &StepInput<'_>,
        state: &Lifecycle,
        position: Option<Position>,
        events: &mut Vec<ExecutionEvent>,
    ) -> Lifecycle {
        match (state, position) {
            (Lifecycle::Flat, Some(pos)) => self.adopt(&pos, input.atr, events),
            (Lifecycle::Flat, None) => match input.plan {
                Some(plan) if input.signal.is_actionable() => {
                    self.enter(exchange, pacer, plan, input.atr, events)
                }
                _ => Lifecycle::Flat,
            },

            (Lifecycle::Entering { side, brackets }, Some(pos)) if pos.side == *side => {
                events.push(ExecutionEvent::Opened {
                    side: pos.side,
                    size: pos.size,
                });
                Lifecycle::Open {
                    side: pos.side,
                    brackets: Some(*brackets),
                }
            }
            (Lifecycle::Entering { side, .. }, Some(pos)) => {
                warn!(
                    symbol = %pos.symbol,
                    expected = %side,
                    found = %pos.side,
                    "position side differs from entry"
                );
                self.adopt(&pos, input.atr, events)
            }
            (Lifecycle::Entering { .. }, None) => {
                events.push(ExecutionEvent::EntryNotFilled);
                Lifecycle::Flat
            }

            (Lifecycle::Open { .. }, None) => {
                events.push(ExecutionEvent::ClosedExternally);
                Lifecycle::Flat
            }
            (Lifecycle::Open { side, .. }, Some(pos)) if pos.side != *side => {
                warn!(
                    symbol = %pos.symbol,
                    was = %side,
                    now = %pos.side,
                    "position flipped outside the engine"
                );
                self.adopt(&pos, input.atr, events)
            }
            (Lifecycle::Open { brackets, .. }, Some(pos)) => {
                let brackets = brackets.or_else(|| self.adopted_brackets(&pos, input.atr));
                let price = input.signal.reference_price;
                let reason = brackets.and_then(|b| {
                    if !price.is_finite() {
                        None
                    } else if b.target_hit(pos.side, price) {
                        Some(CloseReason::TakeProfit)
                    } else if b.stop_hit(pos.side, price) {
                        Some(CloseReason::StopLoss)
                    } else {
                        None
                    }
                });
                match reason {
                    None => Lifecycle::Open {
                        side: pos.side,
                        brackets,
                    },
                    Some(reason) => match self.close(exchange, &pos, reason, events) {
                        Ok(next) => next,
                        Err(()) => Lifecycle::Open {
                            side: pos.side,
                            brackets,
                        },
                    },
                }
            }

            (Lifecycle::Closing { .. }, None) => {
                events.push(ExecutionEvent::Closed);
                Lifecycle::Flat
            }
            (Lifecycle::Closing { side, .. }, Some(pos)) if pos.side != *side => {
                events.push(ExecutionEvent::Closed);
                self.adopt(&pos, input.atr, events)
            }
            (Lifecycle::Closing { reason, .. }, Some(pos)) => {
                match self.close(exchange, &pos, *reason, events) {
                    Ok(next) => next,
                    Err(()) => Lifecycle::Closing {
                        side: pos.side,
                        reason: *reason,
                    },
                }
            }
        }
    }

    /// Take over `pos` as found, bracketed around its own entry price.
    fn adopt(
        &self,
        pos: &Position,
        atr: Option<f64>,
        events: &mut Vec<ExecutionEvent>,
    ) -> Lifecycle {
        events.push(ExecutionEvent::Adopted {
            side: pos.side,
            size: pos.size,
        });
        Lifecycle::Open {
            side: pos.side,
            brackets: self.adopted_brackets(pos, atr),
        }
    }

    fn adopted_brackets(&self, pos: &Position, atr: Option<f64>) -> Option<Brackets> {
        atr.filter(|a| a.is_finite() && *a > 0.0)
            .map(|a| self.sizer.brackets(pos.side, pos.average_entry_price, a))
    }

    /// Child order sizes: `grid_entries` equal parts, or one order when a
    /// part would round to zero.
    pub fn child_quantities(&self, quantity: f64) -> Vec<f64> {
        let n = self.settings.grid_entries.max(1);
        let child = round_to(quantity / n as f64, QUANTITY_DECIMALS);
        if child <= 0.0 {
            vec![quantity]
        } else {
            vec![child; n]
        }
    }

    fn enter(
        &self,
        exchange: &dyn Exchange,
        pacer: &dyn Pacer,
        plan: &OrderPlan,
        atr: Option<f64>,
        events: &mut Vec<ExecutionEvent>,
    ) -> Lifecycle {
        let side = OrderSide::opening(plan.side);
        let mut acknowledged = 0usize;

        for (i, quantity) in self.child_quantities(plan.quantity).into_iter().enumerate() {
            if i > 0 {
                pacer.pause(self.settings.entry_pause());
            }
            let mut request = OrderRequest::market(&plan.symbol, side, quantity);
            if i == 0 {
                request = request.with_leverage(plan.leverage);
            }
            match exchange.submit_order(&request) {
                Ok(ack) => {
                    acknowledged += 1;
                    info!(
                        symbol = %plan.symbol,
                        side = %plan.side,
                        quantity,
                        order_id = %ack.order_id,
                        "entry order acknowledged"
                    );
                    events.push(ExecutionEvent::EntrySubmitted {
                        order_id: ack.order_id,
                        quantity,
                    });
                }
                Err(e) => {
                    warn!(symbol = %plan.symbol, error = %e, "entry order failed");
                    events.push(failed_entry(&e));
                }
            }
        }

        if acknowledged == 0 {
            return Lifecycle::Flat;
        }

        let brackets = plan.brackets();
        match exchange.position(&plan.symbol) {
            Ok(Some(pos)) if pos.is_open() && pos.side != plan.side => {
                warn!(
                    symbol = %plan.symbol,
                    expected = %plan.side,
                    found = %pos.side,
                    "position side differs from entry"
                );
                self.adopt(&pos, atr, events)
            }
            Ok(Some(pos)) if pos.is_open() => {
                events.push(ExecutionEvent::Opened {
                    side: pos.side,
                    size: pos.size,
                });
                Lifecycle::Open {
                    side: pos.side,
                    brackets: Some(brackets),
                }
            }
            Ok(_) => {
                events.push(ExecutionEvent::EntryNotFilled);
                Lifecycle::Flat
            }
            Err(e) => {
                warn!(symbol = %plan.symbol, error = %e, "post-entry position read failed");
                Lifecycle::Entering {
                    side: plan.side,
                    brackets,
                }
            }
        }
    }

    /// Submit a reduce-only close for the reported size. `Err` when the
    /// submission itself failed.
    fn close(
        &self,
        exchange: &dyn Exchange,
        pos: &Position,
        reason: CloseReason,
        events: &mut Vec<ExecutionEvent>,
    ) -> Result<Lifecycle, ()> {
        let request =
            OrderRequest::market(&pos.symbol, OrderSide::closing(pos.side), pos.size).reduce_only();
        if let Err(e) = exchange.submit_order(&request) {
            warn!(symbol = %pos.symbol, %reason, error = %e, "close order failed");
            events.push(ExecutionEvent::CloseFailed {
                error: e.to_string(),
                authentication: e.is_authentication(),
            });
            return Err(());
        }
        info!(symbol = %pos.symbol, %reason, size = pos.size, "close order acknowledged");
        events.push(ExecutionEvent::CloseSubmitted {
            reason,
            size: pos.size,
        });

        Ok(match exchange.position(&pos.symbol) {
            Ok(None) => {
                events.push(ExecutionEvent::Closed);
                Lifecycle::Flat
            }
            Ok(Some(p)) if !p.is_open() => {
                events.push(ExecutionEvent::Closed);
                Lifecycle::Flat
            }
            _ => Lifecycle::Closing {
                side: pos.side,
                reason,
            },
        })
    }
}

fn failed_entry(e: &ExchangeError) -> ExecutionEvent {
    ExecutionEvent::EntryFailed {
        error: e.to_string(),
        authentication: e.is_authentication(),
    }
}
