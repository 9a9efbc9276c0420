//! The per-bar decision a strategy returns to the engine.

use serde::{Deserialize, Serialize};

/// What the strategy wants on the current bar.
///
/// `stop` only matters on an entry bar (initial stop of the new lot);
/// `updated_stop` only matters while in position. The engine decides
/// whether anything actually fills.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Decision {
    pub enter_long: bool,
    pub exit_long: bool,
    pub stop: Option<f64>,
    pub updated_stop: Option<f64>,
    /// Human-readable label for diagnostics. Never used for control flow.
    pub signal_reason: String,
}

impl Decision {
    pub fn hold() -> Self {
        Self::default()
    }

    pub fn enter(reason: impl Into<String>) -> Self {
        Self {
            enter_long: true,
            signal_reason: reason.into(),
            ..Self::default()
        }
    }

    pub fn exit(reason: impl Into<String>) -> Self {
        Self {
            exit_long: true,
            signal_reason: reason.into(),
            ..Self::default()
        }
    }

    pub fn with_stop(mut self, stop: f64) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn with_updated_stop(mut self, stop: f64) -> Self {
        self.updated_stop = Some(stop);
        self
    }

    /// Attach a trailing stop only if one was computed.
    pub fn with_updated_stop_opt(mut self, stop: Option<f64>) -> Self {
        if stop.is_some() {
            self.updated_stop = stop;
        }
        self
    }
}

/// Optional augmentation of a freshly opened lot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EntryMeta {
    /// Overrides the decision's `stop` when set.
    pub stop_price: Option<f64>,
}
