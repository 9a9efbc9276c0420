//! Domain types for the bar simulator.

pub mod bar;
pub mod ledger;
pub mod lot;
pub mod position;
pub mod trade;

pub use bar::Bar;
pub use ledger::{EquityPoint, SignalPoint};
pub use lot::Lot;
pub use position::Position;
pub use trade::{TradeRecord, TradeStatus, SIGNAL_EXIT_REASON, STOP_EXIT_REASON};
