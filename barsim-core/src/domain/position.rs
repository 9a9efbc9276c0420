//! Position: the aggregate of all open lots.

use super::lot::Lot;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One or more open lots plus derived aggregates.
///
/// A `Position` always holds at least one lot: there is no way to build an
/// empty one, and closing consumes it. The engine represents "flat" as
/// `Option::<Position>::None`, never as a zero-lot value.
///
/// Aggregates are recomputed from the full lot set after every insert rather
/// than accumulated, so they cannot drift from the lots they describe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    lots: Vec<Lot>,
    quantity: f64,
    avg_entry_price: f64,
    total_entry_commission: f64,
}

impl Position {
    /// Open a position with its first lot.
    pub fn open(lot: Lot) -> Self {
        let mut pos = Self {
            lots: vec![lot],
            quantity: 0.0,
            avg_entry_price: 0.0,
            total_entry_commission: 0.0,
        };
        pos.recompute();
        pos
    }

    /// Pyramid a new lot into the position.
    pub fn add_lot(&mut self, lot: Lot) {
        self.lots.push(lot);
        self.recompute();
    }

    fn recompute(&mut self) {
        let quantity: f64 = self.lots.iter().map(|l| l.entry_qty).sum();
        let cost: f64 = self.lots.iter().map(Lot::notional).sum();
        self.quantity = quantity;
        self.avg_entry_price = if quantity > 0.0 { cost / quantity } else { 0.0 };
        self.total_entry_commission = self.lots.iter().map(|l| l.entry_commission).sum();
    }

    pub fn lots(&self) -> &[Lot] {
        &self.lots
    }

    pub(crate) fn lots_mut(&mut self) -> &mut [Lot] {
        &mut self.lots
    }

    /// Release the lots for closing. Consumes the position.
    pub fn into_lots(self) -> Vec<Lot> {
        self.lots
    }

    /// Aggregate quantity: sum of lot quantities.
    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn avg_entry_price(&self) -> f64 {
        self.avg_entry_price
    }

    pub fn total_entry_commission(&self) -> f64 {
        self.total_entry_commission
    }

    pub fn entries_count(&self) -> usize {
        self.lots.len()
    }

    pub fn first_entry_time(&self) -> NaiveDateTime {
        self.lots[0].entry_time
    }

    /// Trigger level across lots: the minimum of all stops that are set.
    pub fn min_stop(&self) -> Option<f64> {
        self.lots
            .iter()
            .filter_map(|l| l.stop_price)
            .fold(None, |acc, s| Some(acc.map_or(s, |a: f64| a.min(s))))
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    /// Advance the holding counter of every lot filled before `bar_index`.
    pub fn tick_bar(&mut self, bar_index: usize) {
        for lot in self.lots.iter_mut().filter(|l| l.entry_bar < bar_index) {
            lot.time_in_trade += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn lot(bar: usize, price: f64, qty: f64, stop: Option<f64>) -> Lot {
        Lot {
            entry_bar: bar,
            entry_time: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                + chrono::Duration::days(bar as i64),
            entry_price: price,
            entry_qty: qty,
            entry_commission: price * qty * 0.001,
            stop_price: stop,
            time_in_trade: 0,
            signal_reason: String::new(),
        }
    }

    #[test]
    fn aggregates_after_pyramid() {
        let mut pos = Position::open(lot(0, 100.0, 10.0, Some(90.0)));
        pos.add_lot(lot(1, 110.0, 30.0, Some(95.0)));

        assert_eq!(pos.quantity(), 40.0);
        assert_eq!(pos.entries_count(), 2);
        // (100*10 + 110*30) / 40 = 107.5
        assert!((pos.avg_entry_price() - 107.5).abs() < 1e-12);
        assert!((pos.total_entry_commission() - (1.0 + 3.3)).abs() < 1e-12);
        assert_eq!(pos.first_entry_time(), pos.lots()[0].entry_time);
    }

    #[test]
    fn min_stop_ignores_unset() {
        let mut pos = Position::open(lot(0, 100.0, 10.0, None));
        assert_eq!(pos.min_stop(), None);
        pos.add_lot(lot(1, 105.0, 10.0, Some(97.0)));
        pos.add_lot(lot(2, 108.0, 10.0, Some(99.0)));
        assert_eq!(pos.min_stop(), Some(97.0));
    }

    #[test]
    fn tick_bar_skips_lots_filled_this_bar() {
        let mut pos = Position::open(lot(0, 100.0, 10.0, None));
        pos.add_lot(lot(1, 101.0, 10.0, None));
        pos.tick_bar(1);
        pos.tick_bar(2);
        assert_eq!(pos.lots()[0].time_in_trade, 2);
        assert_eq!(pos.lots()[1].time_in_trade, 1);
    }

    #[test]
    fn mark_to_market() {
        let pos = Position::open(lot(0, 100.0, 10.0, None));
        assert_eq!(pos.market_value(110.0), 1100.0);
    }
}
