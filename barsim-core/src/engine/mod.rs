//! Backtesting engine: the bar-by-bar loop and its accounting.
//!
//! The engine consumes a [`BarTable`](crate::data::BarTable) and one
//! [`Strategy`](crate::strategy::Strategy), then runs four phases per bar:
//!
//! 1. Stop check: exit every lot at the stop price if the low reaches it
//! 2. Strategy: `on_bar` returns a decision
//! 3. Execution: signal exit, entry (pyramiding permitting), stop ratchet
//! 4. Post-bar: mark-to-market, equity and signal ledgers

pub mod accounting;
pub mod fill;
pub mod invariants;
pub mod loop_runner;
pub mod result;
pub mod stops;

pub use accounting::{Account, EntrySkip};
pub use fill::{FillModel, FillPoint, FillTiming};
pub use invariants::{check_invariants, InvariantViolation};
pub use loop_runner::{run_backtest, Engine, EngineError};
pub use result::RunResult;
pub use stops::stop_trigger;
