//! Per-run context shared between the engine and the strategy.

use crate::domain::Position;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Layout version of [`StrategyContext`]. Bumped whenever a field changes meaning.
pub const CONTEXT_VERSION: u32 = 1;

/// Strategy-owned memory that survives across bars.
///
/// This is the only cross-bar channel besides the strategy's own fields. The
/// engine never writes it except to clear it, which happens exactly when the
/// position goes flat.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PersistentState {
    /// Reference entry price, usually the first lot's fill.
    pub entry_price: Option<f64>,
    /// Highest high seen since the position opened.
    pub highest_high: Option<f64>,
    /// Last trailing stop the strategy asked for.
    pub trailing_stop: Option<f64>,
}

impl PersistentState {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fold a new high into `highest_high`.
    pub fn observe_high(&mut self, high: f64) {
        if high.is_nan() {
            return;
        }
        self.highest_high = Some(self.highest_high.map_or(high, |h| h.max(high)));
    }
}

/// Read-only view of the open position, written by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub qty: f64,
    pub avg_entry_price: f64,
    pub entries_count: usize,
    pub first_entry_time: NaiveDateTime,
    pub min_stop: Option<f64>,
}

impl From<&Position> for PositionSnapshot {
    fn from(pos: &Position) -> Self {
        Self {
            qty: pos.quantity(),
            avg_entry_price: pos.avg_entry_price(),
            entries_count: pos.entries_count(),
            first_entry_time: pos.first_entry_time(),
            min_stop: pos.min_stop(),
        }
    }
}

/// Context handed to the strategy on every bar.
///
/// Everything except `state` is overwritten by the engine before each
/// `on_bar` call; writes a strategy makes to those fields do not persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyContext {
    pub version: u32,
    pub bar_index: usize,
    pub cash: f64,
    /// Equity marked at the current bar's close, after any stop exit.
    pub equity: f64,
    pub position: Option<PositionSnapshot>,
    pub state: PersistentState,
}

impl StrategyContext {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            version: CONTEXT_VERSION,
            bar_index: 0,
            cash: initial_capital,
            equity: initial_capital,
            position: None,
            state: PersistentState::default(),
        }
    }

    pub fn in_position(&self) -> bool {
        self.position.is_some()
    }

    pub fn entries_count(&self) -> usize {
        self.position.map_or(0, |p| p.entries_count)
    }

    /// Overwrite the engine-managed fields.
    pub(crate) fn refresh(
        &mut self,
        bar_index: usize,
        cash: f64,
        equity: f64,
        position: Option<&Position>,
    ) {
        self.version = CONTEXT_VERSION;
        self.bar_index = bar_index;
        self.cash = cash;
        self.equity = equity;
        self.position = position.map(PositionSnapshot::from);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_empties_state() {
        let mut state = PersistentState {
            entry_price: Some(100.0),
            highest_high: Some(110.0),
            trailing_stop: Some(99.0),
        };
        assert!(!state.is_empty());
        state.clear();
        assert!(state.is_empty());
    }

    #[test]
    fn observe_high_keeps_maximum() {
        let mut state = PersistentState::default();
        state.observe_high(101.0);
        state.observe_high(99.0);
        state.observe_high(f64::NAN);
        assert_eq!(state.highest_high, Some(101.0));
        state.observe_high(104.0);
        assert_eq!(state.highest_high, Some(104.0));
    }

    #[test]
    fn refresh_overwrites_engine_fields_only() {
        let mut ctx = StrategyContext::new(10_000.0);
        ctx.state.entry_price = Some(50.0);
        ctx.cash = -1.0;
        ctx.refresh(7, 9_000.0, 9_500.0, None);
        assert_eq!(ctx.bar_index, 7);
        assert_eq!(ctx.cash, 9_000.0);
        assert_eq!(ctx.equity, 9_500.0);
        assert_eq!(ctx.state.entry_price, Some(50.0));
        assert!(!ctx.in_position());
        assert_eq!(ctx.entries_count(), 0);
    }
}
