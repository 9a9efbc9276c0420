//! Moving average crossover: golden cross entries, death cross exits.
//!
//! Enters when the fast SMA crosses above the slow SMA. While in position it
//! may pyramid on closes above the highest high since entry, up to
//! `pyramiding` lots. Exits when the fast SMA crosses back below.

use super::{stop_below, Decision, EntryMeta, Strategy, StrategyContext};
use crate::config::EngineConfig;
use crate::data::BarTable;
use crate::domain::Bar;
use crate::indicators::sma;
use crate::sizers::Sizer;
use chrono::NaiveDateTime;

#[derive(Debug, Clone)]
pub struct MaCrossover {
    pub fast_period: usize,
    pub slow_period: usize,
    /// Initial stop distance below each lot's fill (0 = no stop).
    pub stop_pct: f64,
    /// Trailing distance below the highest high since entry (0 = no trail).
    pub trail_pct: f64,
    pub pyramiding: usize,
    pub sizer: Sizer,
    fast: Vec<f64>,
    slow: Vec<f64>,
}

impl MaCrossover {
    pub fn new(fast_period: usize, slow_period: usize) -> Self {
        Self {
            fast_period,
            slow_period,
            stop_pct: 0.0,
            trail_pct: 0.0,
            pyramiding: 1,
            sizer: Sizer::PercentOfBase,
            fast: Vec::new(),
            slow: Vec::new(),
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

    /// (fast, slow) at `index - 1` and `index`, if all four are valid.
    fn pair(&self, index: usize) -> Option<((f64, f64), (f64, f64))> {
        if index == 0 || index >= self.fast.len() {
            return None;
        }
        let prev = (self.fast[index - 1], self.slow[index - 1]);
        let cur = (self.fast[index], self.slow[index]);
        let all = [prev.0, prev.1, cur.0, cur.1];
        if all.iter().any(|v| v.is_nan()) {
            return None;
        }
        Some((prev, cur))
    }
}

impl Strategy for MaCrossover {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    fn pyramiding(&self) -> usize {
        self.pyramiding
    }

    fn prepare(&mut self, bars: &BarTable) {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        self.fast = sma(&closes, self.fast_period);
        self.slow = sma(&closes, self.slow_period);
    }

    fn on_bar(&mut self, index: usize, bar: &Bar, ctx: &mut StrategyContext) -> Decision {
        let prior_high = ctx.state.highest_high;
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

        let Some(((fast_prev, slow_prev), (fast_cur, slow_cur))) = self.pair(index) else {
            return Decision::hold().with_updated_stop_opt(trailing);
        };

        let decision = if ctx.in_position() && fast_cur < slow_cur && fast_prev >= slow_prev {
            Decision::exit("death cross")
        } else if fast_cur > slow_cur && fast_prev <= slow_prev {
            Decision::enter("golden cross")
        } else if ctx.in_position()
            && fast_cur > slow_cur
            && prior_high.is_some_and(|h| bar.close > h)
        {
            Decision::enter("trend add")
        } else {
            Decision::hold()
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
