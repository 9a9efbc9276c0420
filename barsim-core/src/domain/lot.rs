//! Lot: one discrete filled entry into a position.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A single filled entry. Owned exclusively by the [`Position`](super::Position)
/// it belongs to and destroyed when that position closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    /// Index of the bar whose price filled this lot.
    pub entry_bar: usize,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub entry_qty: f64,
    pub entry_commission: f64,
    pub stop_price: Option<f64>,
    /// Bars held since the fill, excluding the fill bar itself.
    pub time_in_trade: usize,
    /// Reason string of the decision that opened this lot.
    pub signal_reason: String,
}

impl Lot {
    /// Entry cost excluding commission.
    pub fn notional(&self) -> f64 {
        self.entry_price * self.entry_qty
    }

    /// Raise the stop to `candidate` if it is strictly tighter.
    ///
    /// Returns `true` when the stop moved. A lot without a stop accepts any
    /// finite candidate.
    pub fn raise_stop(&mut self, candidate: f64) -> bool {
        if !candidate.is_finite() {
            return false;
        }
        match self.stop_price {
            Some(current) if candidate <= current => false,
            _ => {
                self.stop_price = Some(candidate);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn lot(stop: Option<f64>) -> Lot {
        Lot {
            entry_bar: 3,
            entry_time: NaiveDate::from_ymd_opt(2024, 1, 5)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            entry_price: 100.0,
            entry_qty: 10.0,
            entry_commission: 1.0,
            stop_price: stop,
            time_in_trade: 0,
            signal_reason: "breakout".into(),
        }
    }

    #[test]
    fn raise_stop_tightens() {
        let mut l = lot(Some(95.0));
        assert!(l.raise_stop(97.0));
        assert_eq!(l.stop_price, Some(97.0));
    }

    #[test]
    fn raise_stop_ignores_lower_or_equal() {
        let mut l = lot(Some(95.0));
        assert!(!l.raise_stop(90.0));
        assert!(!l.raise_stop(95.0));
        assert_eq!(l.stop_price, Some(95.0));
    }

    #[test]
    fn raise_stop_sets_missing_stop() {
        let mut l = lot(None);
        assert!(l.raise_stop(92.5));
        assert_eq!(l.stop_price, Some(92.5));
    }

    #[test]
    fn raise_stop_rejects_nan() {
        let mut l = lot(None);
        assert!(!l.raise_stop(f64::NAN));
        assert_eq!(l.stop_price, None);
    }

    #[test]
    fn notional() {
        assert_eq!(lot(None).notional(), 1000.0);
    }
}
