use crate::domain::{Brackets, Side};
use serde::Serialize;
use std::fmt;

/// Per-symbol lifecycle state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Flat,
    /// Entry orders acknowledged, fill not yet observed.
    Entering { side: Side, brackets: Brackets },
    /// Position observed. Brackets are `None` for an adopted position
    /// while ATR is unavailable.
    Open {
        side: Side,
        brackets: Option<Brackets>,
    },
    /// Reduce-only close submitted, zero position not yet observed.
    Closing { side: Side, reason: CloseReason },
}

impl Lifecycle {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Entering { .. } => "entering",
            Self::Open { .. } => "open",
            Self::Closing { .. } => "closing",
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, Self::Flat)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    TakeProfit,
    StopLoss,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TakeProfit => "take-profit",
            Self::StopLoss => "stop-loss",
        })
    }
}

/// Something the machine did or observed during one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
    /// Position found on the exchange while flat; taken over without an entry.
    Adopted { side: Side, size: f64 },
    EntrySubmitted { order_id: String, quantity: f64 },
    EntryFailed { error: String, authentication: bool },
    Opened { side: Side, size: f64 },
    /// Entry acknowledged but the exchange reports no position.
    EntryNotFilled,
    CloseSubmitted { reason: CloseReason, size: f64 },
    CloseFailed { error: String, authentication: bool },
    Closed,
    ClosedExternally,
    /// Position read failed; nothing was done.
    Skipped { reason: String, authentication: bool },
}

impl ExecutionEvent {
    pub fn is_authentication_failure(&self) -> bool {
        match self {
            Self::EntryFailed { authentication, .. }
            | Self::CloseFailed { authentication, .. }
            | Self::Skipped { authentication, .. } => *authentication,
            _ => false,
        }
    }
}

/// Outcome of one step for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub symbol: String,
    pub before: Lifecycle,
    pub after: Lifecycle,
    pub events: Vec<ExecutionEvent>,
}

impl StepReport {
    pub fn authentication_failed(&self) -> bool {
        self.events.iter().any(ExecutionEvent::is_authentication_failure)
    }

    /// Number of entry orders submitted this step.
    pub fn entries_submitted(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ExecutionEvent::EntrySubmitted { .. }))
            .count()
    }
}
