//! Per-bar output rows: equity curve and signal log.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Mark-to-market snapshot taken at the end of every bar.
///
/// `price` is the bar's close, NaN when the bar had no valid close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub time: NaiveDateTime,
    pub equity: f64,
    pub cash: f64,
    pub qty: f64,
    #[serde(with = "nan_as_null")]
    pub price: f64,
}

/// JSON has no NaN: write it as `null` and read `null` back as NaN.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        if v.is_nan() {
            s.serialize_none()
        } else {
            s.serialize_f64(*v)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NAN))
    }
}

/// What the strategy asked for on a bar, and what the engine actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalPoint {
    pub time: NaiveDateTime,
    pub enter_long_requested: bool,
    pub exit_long_requested: bool,
    pub did_enter: bool,
    pub did_exit: bool,
}

impl SignalPoint {
    /// A bar on which no decision was taken.
    pub fn idle(time: NaiveDateTime) -> Self {
        Self {
            time,
            enter_long_requested: false,
            exit_long_requested: false,
            did_enter: false,
            did_exit: false,
        }
    }
}
