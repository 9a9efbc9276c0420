//! Strategy capability interface and the built-in strategy registry.
//!
//! A strategy sees one bar at a time plus the shared [`StrategyContext`], and
//! answers with a [`Decision`]. It never touches cash, lots, or fills: the
//! engine owns those and decides what actually executes.
//!
//! ## Built-in strategies
//!
//! - [`FlatStrategy`]: never trades
//! - [`BuyAndHold`]: enters once, holds to the end
//! - [`MaCrossover`]: fast/slow SMA cross with optional stops
//! - [`DonchianBreakout`]: channel breakout with trailing stop

pub mod buy_and_hold;
pub mod context;
pub mod decision;
pub mod donchian;
pub mod flat;
pub mod ma_crossover;
pub mod registry;

pub use buy_and_hold::BuyAndHold;
pub use context::{PersistentState, PositionSnapshot, StrategyContext, CONTEXT_VERSION};
pub use decision::{Decision, EntryMeta};
pub use donchian::DonchianBreakout;
pub use flat::FlatStrategy;
pub use ma_crossover::MaCrossover;
pub use registry::{create_strategy, RegistryError, StrategySpec, STRATEGY_NAMES};

use crate::config::EngineConfig;
use crate::data::BarTable;
use crate::domain::Bar;
use crate::sizers::Sizer;
use chrono::NaiveDateTime;

/// Trait for strategies driven by the engine.
///
/// # Call order per bar
/// The engine refreshes the context, runs the stop check, then calls
/// `on_bar`. `on_entry` is called once per filled entry, after the lot's
/// price is known. Bars with a NaN close are never passed to `on_bar`.
pub trait Strategy: Send {
    /// Registry name (e.g. "ma_crossover").
    fn name(&self) -> &str;

    /// Maximum number of lots open at once.
    fn pyramiding(&self) -> usize {
        1
    }

    /// Called once with the full table before the first bar.
    fn prepare(&mut self, _bars: &BarTable) {}

    /// Evaluate bar `index`. Must only use information up to and including `bar`.
    fn on_bar(&mut self, index: usize, bar: &Bar, ctx: &mut StrategyContext) -> Decision;

    /// Called after an entry fills. May set the new lot's stop.
    fn on_entry(
        &mut self,
        _time: NaiveDateTime,
        _fill_price: f64,
        _ctx: &mut StrategyContext,
    ) -> Option<EntryMeta> {
        None
    }

    /// Share count for a new lot at `price`.
    fn size(&self, sizing_base: f64, price: f64, config: &EngineConfig) -> f64 {
        Sizer::PercentOfBase.size(sizing_base, price, config)
    }
}

/// Stop `pct` below `price`, or `None` when `pct` is not positive.
pub(crate) fn stop_below(price: f64, pct: f64) -> Option<f64> {
    (pct > 0.0 && price.is_finite()).then(|| price * (1.0 - pct))
}
