//! Execution state machine against an in-memory exchange.

use chrono::Utc;
use perpsig_core::domain::{Decision, OrderPlan, OrderSide, Position, Side, Signal};
use perpsig_core::exchange::{Exchange, ExchangeError, OrderAck, OrderRequest};
use perpsig_core::execution::{
    CloseReason, ExecutionEvent, ExecutionMachine, ExecutionSettings, Lifecycle, StepInput,
};
use perpsig_core::pacing::NoPause;
use perpsig_core::sizer::RiskSizer;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Scripted exchange. Position reads pop from `reads` when scripted,
/// otherwise return the live `position`.
#[derive(Default)]
struct FakeExchange {
    position: Mutex<Option<Position>>,
    reads: Mutex<VecDeque<Result<Option<Position>, ExchangeError>>>,
    orders: Mutex<Vec<OrderRequest>>,
    fill_orders: bool,
    reject_orders: Option<fn() -> ExchangeError>,
}

impl FakeExchange {
    fn filling() -> Self {
        Self {
            fill_orders: true,
            ..Default::default()
        }
    }

    fn holding(side: Side, size: f64, entry: f64) -> Self {
        let ex = Self::filling();
        *ex.position.lock().unwrap() = Some(Position {
            symbol: "BTCUSDT".into(),
            side,
            size,
            average_entry_price: entry,
        });
        ex
    }

    fn script_read(&self, read: Result<Option<Position>, ExchangeError>) {
        self.reads.lock().unwrap().push_back(read);
    }

    fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }
}

impl Exchange for FakeExchange {
    fn equity(&self) -> Result<f64, ExchangeError> {
        Ok(1000.0)
    }

    fn position(&self, _symbol: &str) -> Result<Option<Position>, ExchangeError> {
        if let Some(read) = self.reads.lock().unwrap().pop_front() {
            return read;
        }
        Ok(self.position.lock().unwrap().clone())
    }

    fn submit_order(&self, request: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        self.orders.lock().unwrap().push(request.clone());
        if let Some(reject) = self.reject_orders {
            return Err(reject());
        }
        if self.fill_orders {
            let mut pos = self.position.lock().unwrap();
            if request.reduce_only {
                *pos = None;
            } else {
                let side = match request.side {
                    OrderSide::Buy => Side::Long,
                    OrderSide::Sell => Side::Short,
                };
                let size = pos.as_ref().map_or(0.0, |p| p.size) + request.quantity;
                *pos = Some(Position {
                    symbol: request.symbol.clone(),
                    side,
                    size,
                    average_entry_price: 100.0,
                });
            }
        }
        Ok(OrderAck {
            order_id: format!("o{}", self.orders.lock().unwrap().len()),
            client_oid: request.client_oid.clone(),
        })
    }
}

fn signal(decision: Decision, price: f64) -> Signal {
    Signal {
        symbol: "BTCUSDT".into(),
        decision,
        reference_price: price,
        timestamp: Utc::now(),
    }
}

fn long_plan() -> OrderPlan {
    OrderPlan {
        symbol: "BTCUSDT".into(),
        side: Side::Long,
        entry_price: 100.0,
        stop_price: 99.0,
        target_price: 102.0,
        leverage: 5,
        quantity: 3.0,
    }
}

fn machine() -> ExecutionMachine {
    ExecutionMachine::new(ExecutionSettings::default(), RiskSizer::default())
}

fn step_wait(m: &mut ExecutionMachine, ex: &FakeExchange, price: f64) -> perpsig_core::execution::StepReport {
    let s = signal(Decision::Wait, price);
    m.step(ex, &NoPause, StepInput { signal: &s, plan: None, atr: Some(1.0) })
}

#[test]
fn flat_long_enters_in_three_children() {
    let ex = FakeExchange::filling();
    let mut m = machine();
    let s = signal(Decision::Long, 100.0);
    let plan = long_plan();
    let report = m.step(&ex, &NoPause, StepInput { signal: &s, plan: Some(&plan), atr: Some(1.0) });

    let orders = ex.orders();
    assert_eq!(orders.len(), 3);
    assert!(orders.iter().all(|o| o.side == OrderSide::Buy && !o.reduce_only));
    assert!(orders.iter().all(|o| o.quantity == 1.0));
    assert_eq!(orders[0].leverage, Some(5));
    assert_eq!(orders[1].leverage, None);
    assert_eq!(report.entries_submitted(), 3);
    assert!(matches!(report.after, Lifecycle::Open { side: Side::Long, brackets: Some(_) }));
}

#[test]
fn existing_position_is_adopted_without_entry() {
    let ex = FakeExchange::holding(Side::Short, 2.0, 200.0);
    let mut m = machine();
    let s = signal(Decision::Long, 200.0);
    let plan = long_plan();
    let report = m.step(&ex, &NoPause, StepInput { signal: &s, plan: Some(&plan), atr: Some(4.0) });

    assert!(ex.orders().is_empty());
    assert_eq!(report.events, vec![ExecutionEvent::Adopted { side: Side::Short, size: 2.0 }]);
    match report.after {
        Lifecycle::Open { side, brackets: Some(b) } => {
            assert_eq!(side, Side::Short);
            assert_eq!(b.stop_price, 204.0);
            assert_eq!(b.target_price, 192.0);
        }
        other => panic!("expected open with brackets, got {other:?}"),
    }
}

#[test]
fn flipped_position_is_adopted_with_its_own_brackets() {
    let ex = FakeExchange::filling();
    let mut m = machine();
    let s = signal(Decision::Long, 100.0);
    let plan = long_plan();
    m.step(&ex, &NoPause, StepInput { signal: &s, plan: Some(&plan), atr: Some(1.0) });
    assert_eq!(ex.orders().len(), 3);

    // someone closes the long by hand and opens a short at 100
    *ex.position.lock().unwrap() = Some(Position {
        symbol: "BTCUSDT".into(),
        side: Side::Short,
        size: 2.0,
        average_entry_price: 100.0,
    });

    // 101 is under the long target: applied to the short it would read as a take-profit
    let report = step_wait(&mut m, &ex, 101.0);
    assert_eq!(ex.orders().len(), 3, "no close was sent");
    assert_eq!(report.events, vec![ExecutionEvent::Adopted { side: Side::Short, size: 2.0 }]);
    match report.after {
        Lifecycle::Open { side, brackets: Some(b) } => {
            assert_eq!(side, Side::Short);
            assert_eq!(b.stop_price, 101.0);
            assert_eq!(b.target_price, 98.0);
        }
        other => panic!("expected open short with brackets, got {other:?}"),
    }

    // the short's own target closes it
    let report = step_wait(&mut m, &ex, 97.5);
    let close = ex.orders().last().cloned().unwrap();
    assert!(close.reduce_only);
    assert_eq!(close.side, OrderSide::Buy);
    assert_eq!(close.quantity, 2.0);
    assert_eq!(report.after, Lifecycle::Flat);
}

#[test]
fn entry_filled_on_the_other_side_is_adopted() {
    let ex = FakeExchange::filling();
    let mut m = machine();
    let s = signal(Decision::Long, 100.0);
    let plan = long_plan();
    ex.script_read(Ok(None));
    ex.script_read(Err(ExchangeError::Transport("timeout".into())));
    let report = m.step(&ex, &NoPause, StepInput { signal: &s, plan: Some(&plan), atr: Some(1.0) });
    assert!(matches!(report.after, Lifecycle::Entering { side: Side::Long, .. }));

    *ex.position.lock().unwrap() = Some(Position {
        symbol: "BTCUSDT".into(),
        side: Side::Short,
        size: 1.0,
        average_entry_price: 100.0,
    });
    let report = step_wait(&mut m, &ex, 100.0);
    assert_eq!(report.events, vec![ExecutionEvent::Adopted { side: Side::Short, size: 1.0 }]);
    assert!(matches!(report.after, Lifecycle::Open { side: Side::Short, brackets: Some(_) }));
}

#[test]
fn all_entries_failing_returns_to_flat() {
    let ex = FakeExchange {
        reject_orders: Some(|| ExchangeError::Api { code: "43012".into(), msg: "insufficient".into() }),
        ..Default::default()
    };
    let mut m = machine();
    let s = signal(Decision::Long, 100.0);
    let plan = long_plan();
    let report = m.step(&ex, &NoPause, StepInput { signal: &s, plan: Some(&plan), atr: Some(1.0) });

    assert_eq!(ex.orders().len(), 3);
    assert_eq!(report.after, Lifecycle::Flat);
    assert!(!report.authentication_failed());
    assert_eq!(
        report.events.iter().filter(|e| matches!(e, ExecutionEvent::EntryFailed { .. })).count(),
        3
    );
}

#[test]
fn authentication_failure_is_flagged() {
    let ex = FakeExchange::default();
    ex.script_read(Err(ExchangeError::Authentication("40009: sign signature error".into())));
    let mut m = machine();
    let report = step_wait(&mut m, &ex, 100.0);
    assert!(report.authentication_failed());
    assert_eq!(report.after, Lifecycle::Flat);
}

#[test]
fn acknowledged_but_unfilled_returns_to_flat() {
    let ex = FakeExchange::default(); // acknowledges, never fills
    let mut m = machine();
    let s = signal(Decision::Long, 100.0);
    let plan = long_plan();
    let report = m.step(&ex, &NoPause, StepInput { signal: &s, plan: Some(&plan), atr: Some(1.0) });
    assert!(report.events.contains(&ExecutionEvent::EntryNotFilled));
    assert_eq!(report.after, Lifecycle::Flat);
}

#[test]
fn failed_reread_stays_entering_then_resolves() {
    let ex = FakeExchange::filling();
    ex.script_read(Ok(None)); // step-start read
    ex.script_read(Err(ExchangeError::Transport("timeout".into()))); // post-entry read
    let mut m = machine();
    let s = signal(Decision::Long, 100.0);
    let plan = long_plan();
    let report = m.step(&ex, &NoPause, StepInput { signal: &s, plan: Some(&plan), atr: Some(1.0) });
    assert!(matches!(report.after, Lifecycle::Entering { side: Side::Long, .. }));

    // next cycle: position visible, no new entry
    let report = step_wait(&mut m, &ex, 100.0);
    assert!(matches!(report.after, Lifecycle::Open { .. }));
    assert_eq!(ex.orders().len(), 3);
}

#[test]
fn target_hit_closes_reduce_only_with_reported_size() {
    let ex = FakeExchange::filling();
    let mut m = machine();
    let s = signal(Decision::Long, 100.0);
    let plan = long_plan();
    m.step(&ex, &NoPause, StepInput { signal: &s, plan: Some(&plan), atr: Some(1.0) });

    let report = step_wait(&mut m, &ex, 102.5);
    let close = ex.orders().last().cloned().unwrap();
    assert!(close.reduce_only);
    assert_eq!(close.side, OrderSide::Sell);
    assert_eq!(close.quantity, 3.0);
    assert!(report.events.contains(&ExecutionEvent::CloseSubmitted {
        reason: CloseReason::TakeProfit,
        size: 3.0
    }));
    assert_eq!(report.after, Lifecycle::Flat);
}

#[test]
fn failed_close_stays_open() {
    let ex = FakeExchange {
        reject_orders: Some(|| ExchangeError::Transport("timeout".into())),
        ..Default::default()
    };
    *ex.position.lock().unwrap() = Some(Position {
        symbol: "BTCUSDT".into(),
        side: Side::Long,
        size: 1.0,
        average_entry_price: 100.0,
    });
    let mut m = machine();
    step_wait(&mut m, &ex, 100.0); // adopt
    let report = step_wait(&mut m, &ex, 98.0); // stop at 99
    assert!(matches!(report.after, Lifecycle::Open { .. }));
    assert!(report.events.iter().any(|e| matches!(e, ExecutionEvent::CloseFailed { .. })));
}

#[test]
fn closing_resubmits_until_flat() {
    let ex = FakeExchange::holding(Side::Long, 1.0, 100.0);
    let mut m = machine();
    step_wait(&mut m, &ex, 100.0); // adopt, brackets 99 / 102

    // close acknowledged but the exchange still reports the position
    let still_open = Position {
        symbol: "BTCUSDT".into(),
        side: Side::Long,
        size: 0.4,
        average_entry_price: 100.0,
    };
    ex.script_read(Ok(Some(Position { size: 1.0, ..still_open.clone() })));
    ex.script_read(Ok(Some(still_open.clone())));
    let report = step_wait(&mut m, &ex, 98.0);
    assert!(matches!(report.after, Lifecycle::Closing { reason: CloseReason::StopLoss, .. }));

    // next cycle resubmits for the reported size
    ex.script_read(Ok(Some(still_open)));
    let report = step_wait(&mut m, &ex, 98.0);
    let last = ex.orders().last().cloned().unwrap();
    assert!(last.reduce_only);
    assert_eq!(last.quantity, 0.4);
    assert_eq!(report.after, Lifecycle::Flat);
}

#[test]
fn external_close_returns_to_flat() {
    let ex = FakeExchange::holding(Side::Long, 1.0, 100.0);
    let mut m = machine();
    step_wait(&mut m, &ex, 100.0);
    *ex.position.lock().unwrap() = None;
    let report = step_wait(&mut m, &ex, 100.0);
    assert_eq!(report.events, vec![ExecutionEvent::ClosedExternally]);
    assert_eq!(report.after, Lifecycle::Flat);
}

#[test]
fn wait_never_closes_open_position() {
    let ex = FakeExchange::holding(Side::Long, 1.0, 100.0);
    let mut m = machine();
    step_wait(&mut m, &ex, 100.0);
    for price in [100.5, 101.0, 99.5] {
        let report = step_wait(&mut m, &ex, price);
        assert!(matches!(report.after, Lifecycle::Open { .. }));
    }
    assert!(ex.orders().is_empty());
}

#[test]
fn adopted_without_atr_holds_until_brackets_known() {
    let ex = FakeExchange::holding(Side::Long, 1.0, 100.0);
    let mut m = machine();
    let s = signal(Decision::Wait, 50.0);
    let report = m.step(&ex, &NoPause, StepInput { signal: &s, plan: None, atr: None });
    assert_eq!(report.after, Lifecycle::Open { side: Side::Long, brackets: None });

    let report = m.step(&ex, &NoPause, StepInput { signal: &s, plan: None, atr: None });
    assert!(matches!(report.after, Lifecycle::Open { brackets: None, .. }));
    assert!(ex.orders().is_empty());

    // ATR arrives: brackets from entry 100, price 50 is through the stop
    let report = step_wait(&mut m, &ex, 50.0);
    assert!(report.events.iter().any(|e| matches!(
        e,
        ExecutionEvent::CloseSubmitted { reason: CloseReason::StopLoss, .. }
    )));
}

#[test]
fn read_failure_skips_and_keeps_state() {
    let ex = FakeExchange::holding(Side::Long, 1.0, 100.0);
    let mut m = machine();
    step_wait(&mut m, &ex, 100.0);
    ex.script_read(Err(ExchangeError::Transport("timeout".into())));
    let report = step_wait(&mut m, &ex, 10.0);
    assert_eq!(report.before, report.after);
    assert!(matches!(report.events[0], ExecutionEvent::Skipped { authentication: false, .. }));
    assert!(ex.orders().is_empty());
}
