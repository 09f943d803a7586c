//! Operator-facing message text. Prices are shown to four decimals.

use crate::config::EngineConfig;
use perpsig_core::domain::{Decision, OrderPlan, Signal};
use perpsig_core::execution::{ExecutionEvent, StepReport};

/// Round for display.
pub fn price(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.4}")
    } else {
        "n/a".to_string()
    }
}

pub fn startup(config: &EngineConfig) -> String {
    format!(
        "perpsig started\nmode: {}\nstrategy: {}\ntimeframes: {}/{}\nuniverse: {}",
        config.execution.mode,
        config.strategy.kind,
        config.timeframes.fast,
        config.timeframes.slow,
        config.universe.symbols.join(", ")
    )
}

/// Recommendation for one symbol in advisory mode.
pub fn advisory(signal: &Signal, plan: Option<&OrderPlan>) -> String {
    let head = format!(
        "{} {} @ {}",
        signal.symbol,
        headline(signal.decision),
        price(signal.reference_price)
    );
    match (signal.decision, plan) {
        (Decision::Wait, _) => head,
        (_, None) => format!("{head}\nno order: position could not be sized"),
        (_, Some(plan)) => format!(
            "{head}\nentry {} | leverage x{} | qty {}\ntake profit {} | stop loss {}",
            price(plan.entry_price),
            plan.leverage,
            plan.quantity,
            price(plan.target_price),
            price(plan.stop_price)
        ),
    }
}

/// Summary of what the execution machine did, `None` when nothing worth
/// reporting happened.
pub fn execution(report: &StepReport) -> Option<String> {
    let lines: Vec<String> = report
        .events
        .iter()
        .filter_map(|event| match event {
            ExecutionEvent::Adopted { side, size } => {
                Some(format!("adopted existing {side} position, size {size}"))
            }
            ExecutionEvent::Opened { side, size } => Some(format!("opened {side}, size {size}")),
            ExecutionEvent::EntryFailed { error, .. } => Some(format!("entry failed: {error}")),
            ExecutionEvent::EntryNotFilled => Some("entry orders acknowledged but no position".to_string()),
            ExecutionEvent::CloseSubmitted { reason, size } => {
                Some(format!("closing on {reason}, size {size}"))
            }
            ExecutionEvent::CloseFailed { error, .. } => Some(format!("close failed: {error}")),
            ExecutionEvent::Closed => Some("position closed".to_string()),
            ExecutionEvent::ClosedExternally => Some("position closed outside the engine".to_string()),
            ExecutionEvent::EntrySubmitted { .. } | ExecutionEvent::Skipped { .. } => None,
        })
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(format!("{} ({} -> {})\n{}", report.symbol, report.before, report.after, lines.join("\n")))
    }
}

pub fn authentication_alert(symbol: Option<&str>, detail: &str) -> String {
    match symbol {
        Some(symbol) => format!("exchange rejected credentials ({symbol}): {detail}"),
        None => format!("exchange rejected credentials: {detail}"),
    }
}

fn headline(decision: Decision) -> &'static str {
    match decision {
        Decision::Long => "LONG",
        Decision::Short => "SHORT",
        Decision::Wait => "WAIT",
    }
}
