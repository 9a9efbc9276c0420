//! Market fill model: reference price selection, slippage and commission.
//!
//! Stop exits do not go through here. They fill at the stop price itself,
//! with commission applied by the caller.

use crate::config::EngineConfig;
use crate::domain::Bar;
use chrono::NaiveDateTime;

/// Where market orders decided on bar `t` take their reference price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillTiming {
    /// Open of bar `t + 1`.
    NextOpen,
    /// Close of bar `t`.
    CurrentClose,
}

/// A resolved execution: which bar filled and at what price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillPoint {
    pub bar: usize,
    pub time: NaiveDateTime,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillModel {
    timing: FillTiming,
    slippage: f64,
    commission_pct: f64,
}

impl FillModel {
    pub fn new(timing: FillTiming, slippage: f64, commission_pct: f64) -> Self {
        Self {
            timing,
            slippage,
            commission_pct,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let timing = if config.execute_on_next_open {
            FillTiming::NextOpen
        } else {
            FillTiming::CurrentClose
        };
        Self::new(timing, config.slippage_amount(), config.commission_pct)
    }

    pub fn timing(&self) -> FillTiming {
        self.timing
    }

    /// Unslipped reference for an order decided on bar `index`.
    ///
    /// `None` when there is nothing to fill against: the last bar in next-open
    /// mode, or a NaN reference price.
    pub fn reference(&self, bars: &[Bar], index: usize) -> Option<FillPoint> {
        let (bar, price) = match self.timing {
            FillTiming::NextOpen => {
                let next = index + 1;
                (next, bars.get(next)?.open)
            }
            FillTiming::CurrentClose => (index, bars.get(index)?.close),
        };
        if price.is_nan() {
            return None;
        }
        Some(FillPoint {
            bar,
            time: bars[bar].timestamp,
            price,
        })
    }

    /// Buy fill for an order decided on bar `index`. Slippage is adverse: up.
    pub fn market_buy(&self, bars: &[Bar], index: usize) -> Option<FillPoint> {
        self.reference(bars, index).map(|f| FillPoint {
            price: f.price + self.slippage,
            ..f
        })
    }

    /// Sell fill for an order decided on bar `index`. Slippage is adverse: down.
    pub fn market_sell(&self, bars: &[Bar], index: usize) -> Option<FillPoint> {
        self.reference(bars, index).map(|f| FillPoint {
            price: f.price - self.slippage,
            ..f
        })
    }

    /// Commission on one leg.
    pub fn commission(&self, notional: f64) -> f64 {
        notional * self.commission_pct / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars() -> Vec<Bar> {
        let t0 = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        vec![
            Bar::new(t0, 10.0, 11.0, 9.0, 10.5),
            Bar::new(t0 + chrono::Duration::days(1), 10.8, 12.0, 10.0, 11.5),
            Bar::new(t0 + chrono::Duration::days(2), f64::NAN, 12.0, 10.0, 11.0),
        ]
    }

    #[test]
    fn next_open_uses_following_bar() {
        let model = FillModel::new(FillTiming::NextOpen, 0.0, 0.0);
        let fill = model.reference(&bars(), 0).unwrap();
        assert_eq!(fill.bar, 1);
        assert_eq!(fill.price, 10.8);
        assert_eq!(fill.time, bars()[1].timestamp);
    }

    #[test]
    fn next_open_on_last_bar_has_no_fill() {
        let model = FillModel::new(FillTiming::NextOpen, 0.0, 0.0);
        assert!(model.reference(&bars(), 2).is_none());
    }

    #[test]
    fn nan_reference_has_no_fill() {
        let model = FillModel::new(FillTiming::NextOpen, 0.0, 0.0);
        assert!(model.reference(&bars(), 1).is_none());
    }

    #[test]
    fn current_close_uses_same_bar() {
        let model = FillModel::new(FillTiming::CurrentClose, 0.0, 0.0);
        let fill = model.reference(&bars(), 1).unwrap();
        assert_eq!(fill.bar, 1);
        assert_eq!(fill.price, 11.5);
    }

    #[test]
    fn slippage_is_adverse_on_both_sides() {
        let model = FillModel::new(FillTiming::CurrentClose, 0.02, 0.0);
        let buy = model.market_buy(&bars(), 0).unwrap();
        let sell = model.market_sell(&bars(), 0).unwrap();
        assert!((buy.price - 10.52).abs() < 1e-12);
        assert!((sell.price - 10.48).abs() < 1e-12);
    }

    #[test]
    fn commission_is_percent_of_notional() {
        let config = EngineConfig {
            commission_pct: 0.18,
            ..EngineConfig::default()
        };
        let model = FillModel::from_config(&config);
        assert!((model.commission(4949.0) - 8.9082).abs() < 1e-9);
        assert_eq!(model.timing(), FillTiming::NextOpen);
    }
}
