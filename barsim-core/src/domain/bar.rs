//! Bar: the fundamental market data unit.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One OHLC(V) observation for a fixed time interval.
///
/// Bars are read-only inputs: the engine borrows one per step and never
/// mutates it. Missing values are carried as NaN rather than dropped so that
/// output tables keep row-count parity with the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: Option<f64>,
}

impl Bar {
    pub fn new(timestamp: NaiveDateTime, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume: None,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Returns true if any OHLC field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Whether the engine may run trading logic on this bar.
    ///
    /// Only the close gates trading: a bar with a valid close but a NaN low
    /// still trades, it just cannot trigger a stop.
    pub fn is_tradable(&self) -> bool {
        !self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, open and close inside
    /// [low, high], every price positive.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.low > 0.0
    }
}
