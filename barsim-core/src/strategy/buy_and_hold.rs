//! Buy-and-hold: one entry on the first tradable bar, no signal exit.

use super::{stop_below, Decision, EntryMeta, Strategy, StrategyContext};
use crate::config::EngineConfig;
use crate::domain::Bar;
use crate::sizers::Sizer;
use chrono::NaiveDateTime;

#[derive(Debug, Clone)]
pub struct BuyAndHold {
    /// Initial stop distance below the fill (0 = no stop).
    pub stop_pct: f64,
    pub sizer: Sizer,
    entered: bool,
}

impl BuyAndHold {
    pub fn new(stop_pct: f64, sizer: Sizer) -> Self {
        Self {
            stop_pct,
            sizer,
            entered: false,
        }
    }
}

impl Default for BuyAndHold {
    fn default() -> Self {
        Self::new(0.0, Sizer::PercentOfBase)
    }
}

impl Strategy for BuyAndHold {
    fn name(&self) -> &str {
        "buy_and_hold"
    }

    fn on_bar(&mut self, _index: usize, _bar: &Bar, ctx: &mut StrategyContext) -> Decision {
        if self.entered || ctx.in_position() {
            return Decision::hold();
        }
        Decision::enter("buy and hold")
    }

    fn on_entry(
        &mut self,
        _time: NaiveDateTime,
        fill_price: f64,
        ctx: &mut StrategyContext,
    ) -> Option<EntryMeta> {
        self.entered = true;
        ctx.state.entry_price = Some(fill_price);
        Some(EntryMeta {
            stop_price: stop_below(fill_price, self.stop_pct),
        })
    }

    fn size(&self, sizing_base: f64, price: f64, config: &EngineConfig) -> f64 {
        self.sizer.size(sizing_base, price, config)
    }
}
