//! Execution state machine: turns order plans into exchange actions.
//!
//! Per symbol: `Flat -> Entering -> Open -> Closing -> Flat`. The exchange's
//! reported position is re-read at the start of every step and after every
//! submission; the local lifecycle is a cache of intent, never of size.

pub mod lifecycle;
pub mod machine;

pub use lifecycle::{CloseReason, ExecutionEvent, Lifecycle, StepReport};
pub use machine::{ExecutionMachine, ExecutionSettings, StepInput};
