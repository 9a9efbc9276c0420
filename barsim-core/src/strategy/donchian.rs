//! Donchian channel breakout.
//!
//! Entry: close above the highest high of the previous `entry_lookback` bars.
//! Exit: close below the lowest low of the previous `exit_lookback` bars.
//! Repeated breakouts while in position pyramid up to `pyramiding` lots.
//! The trailing stop hangs `trail_pct` below `highest_high` in the
//! persistent state.

use super::{stop_below, Decision, EntryMeta, Strategy, StrategyContext};
use crate::config::EngineConfig;
use crate::data::BarTable;
use crate::domain::Bar;
use crate::indicators::{rolling_max, rolling_min};
use crate::sizers::Sizer;
use chrono::NaiveDateTime;

#[derive(Debug, Clone)]
pub struct DonchianBreakout {
    pub entry_lookback: usize,
    pub exit_lookback: usize,
    pub stop_pct: f64,
    pub trail_pct: f64,
    pub pyramiding: usize,
    pub sizer: Sizer,
    upper: Vec<f64>,
    lower: Vec<f64>,
}

impl DonchianBreakout {
    pub fn new(entry_lookback: usize, exit_lookback: usize) -> Self {
        Self {
            entry_lookback,
            exit_lookback,
            stop_pct: 0.0,
            trail_pct: 0.0,
            pyramiding: 1,
            sizer: Sizer::PercentOfBase,
            upper: Vec::new(),
            lower: Vec::new(),
        }
    }

    pub fn with_stops(mut self, stop_pct: f64, trail_pct: f64) -> Self {
        self.stop_pct = stop_pct;
        self.trail_pct = trail_pct;
        self
    }

    pub fn with_pyramiding(mut self, pyramiding: usize) -> Self {
        self.pyramiding = pyramiding;
        self
    }

    pub fn with_sizer(mut self, sizer: Sizer) -> Self {
        self.sizer = sizer;
        self
    }

    /// Channel computed through the previous bar, so today's bar never
    /// defines its own breakout level.
    fn channel(&self, index: usize) -> (Option<f64>, Option<f64>) {
        if index == 0 {
            return (None, None);
        }
        let valid = |v: Option<&f64>| v.copied().filter(|x| !x.is_nan());
        (valid(self.upper.get(index - 1)), valid(self.lower.get(index - 1)))
    }
}

impl Strategy for DonchianBreakout {
    fn name(&self) -> &str {
        "donchian_breakout"
    }

    fn pyramiding(&self) -> usize {
        self.pyramiding
    }

    fn prepare(&mut self, bars: &BarTable) {
        let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
        self.upper = rolling_max(&highs, self.entry_lookback);
        self.lower = rolling_min(&lows, self.exit_lookback);
    }

    fn on_bar(&mut self, index: usize, bar: &Bar, ctx: &mut StrategyContext) -> Decision {
        let trailing = if ctx.in_position() {
            ctx.state.observe_high(bar.high);
            let trail = ctx
                .state
                .highest_high
                .and_then(|h| stop_below(h, self.trail_pct));
            if trail.is_some() {
                ctx.state.trailing_stop = trail;
            }
            trail
        } else {
            None
        };

        let (upper, lower) = self.channel(index);
        let decision = match (upper, lower) {
            (_, Some(low)) if ctx.in_position() && bar.close < low => {
                Decision::exit(format!("close below {}-bar low", self.exit_lookback))
            }
            (Some(high), _) if bar.close > high => {
                Decision::enter(format!("breakout above {}-bar high", self.entry_lookback))
            }
            _ => Decision::hold(),
        };

        decision.with_updated_stop_opt(trailing)
    }

    fn on_entry(
        &mut self,
        _time: NaiveDateTime,
        fill_price: f64,
        ctx: &mut StrategyContext,
    ) -> Option<EntryMeta> {
        if ctx.state.entry_price.is_none() {
            ctx.state.entry_price = Some(fill_price);
        }
        ctx.state.observe_high(fill_price);
        Some(EntryMeta {
            stop_price: stop_below(fill_price, self.stop_pct),
        })
    }

    fn size(&self, sizing_base: f64, price: f64, config: &EngineConfig) -> f64 {
        self.sizer.size(sizing_base, price, config)
    }
}
