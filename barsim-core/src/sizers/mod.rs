//! Position sizers: translate a sizing base into a share count.
//!
//! Sizers are portfolio-aware (they receive the sizing base the engine picked
//! from `compounding`) but signal-agnostic. Whether the engine can afford the
//! result is checked afterwards, against cash including commission.

use crate::config::EngineConfig;
use serde::{Deserialize, Serialize};

/// Share-count rule for new lots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Sizer {
    /// `base × qty_pct_of_equity / price`.
    PercentOfBase,
    /// Always the same number of shares.
    FixedShares(f64),
    /// Always the same notional.
    FixedNotional(f64),
}

impl Default for Sizer {
    fn default() -> Self {
        Self::PercentOfBase
    }
}

impl Sizer {
    /// Quantity to buy at `price`. Zero when the inputs cannot produce a
    /// positive size; the engine then skips the entry.
    pub fn size(&self, sizing_base: f64, price: f64, config: &EngineConfig) -> f64 {
        if !(price.is_finite() && price > 0.0) {
            return 0.0;
        }
        let raw = match *self {
            Self::PercentOfBase => {
                if !(sizing_base.is_finite() && sizing_base > 0.0) {
                    return 0.0;
                }
                sizing_base * config.qty_pct_of_equity / price
            }
            Self::FixedShares(qty) => qty,
            Self::FixedNotional(amount) => amount / price,
        };
        let qty = if config.round_qty { raw.floor() } else { raw };
        if qty.is_finite() && qty > 0.0 {
            qty
        } else {
            0.0
        }
    }
}
