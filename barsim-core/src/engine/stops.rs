//! Intrabar stop-loss trigger.
//!
//! A position exits in full when the bar's low touches the lowest lot stop.
//! The fill is the stop price itself, with no slippage, even when the bar
//! gaps through it.

use crate::domain::{Bar, Position};

/// Stop price to exit at on this bar, if the stop is hit.
pub fn stop_trigger(position: &Position, bar: &Bar) -> Option<f64> {
    let stop = position.min_stop()?;
    (bar.low <= stop).then_some(stop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Lot;
    use chrono::NaiveDate;

    fn position(stops: &[Option<f64>]) -> Position {
        let t0 = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let lot = |i: usize, stop: Option<f64>| Lot {
            entry_bar: i,
            entry_time: t0,
            entry_price: 100.0,
            entry_qty: 1.0,
            entry_commission: 0.0,
            stop_price: stop,
            time_in_trade: 0,
            signal_reason: String::new(),
        };
        let mut pos = Position::open(lot(0, stops[0]));
        for (i, &s) in stops.iter().enumerate().skip(1) {
            pos.add_lot(lot(i, s));
        }
        pos
    }

    fn bar(low: f64) -> Bar {
        let t = NaiveDate::from_ymd_opt(2024, 1, 3)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Bar::new(t, 100.0, 101.0, low, 100.0)
    }

    #[test]
    fn touch_triggers_at_stop() {
        assert_eq!(stop_trigger(&position(&[Some(95.0)]), &bar(95.0)), Some(95.0));
    }

    #[test]
    fn gap_through_still_fills_at_stop() {
        assert_eq!(stop_trigger(&position(&[Some(95.0)]), &bar(80.0)), Some(95.0));
    }

    #[test]
    fn uses_lowest_of_lot_stops() {
        // min of 93 and 96 is 93: the low of 94 does not reach it
        let pos = position(&[Some(96.0), Some(93.0)]);
        assert_eq!(stop_trigger(&pos, &bar(94.0)), None);
        assert_eq!(stop_trigger(&pos, &bar(92.5)), Some(93.0));
    }

    #[test]
    fn no_stop_never_triggers() {
        assert_eq!(stop_trigger(&position(&[None]), &bar(1.0)), None);
    }
}
