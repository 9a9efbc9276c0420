//! Strategy that never trades. Baseline for equity-curve checks.

use super::{Decision, Strategy, StrategyContext};
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, Default)]
pub struct FlatStrategy;

impl Strategy for FlatStrategy {
    fn name(&self) -> &str {
        "flat"
    }

    fn on_bar(&mut self, _index: usize, _bar: &Bar, _ctx: &mut StrategyContext) -> Decision {
        Decision::hold()
    }
}
