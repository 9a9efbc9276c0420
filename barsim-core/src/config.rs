//! Engine configuration: the enumerated run options, with TOML loading.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("initial_capital must be finite and > 0, got {0}")]
    InitialCapital(f64),

    #[error("qty_pct_of_equity must be finite and > 0, got {0}")]
    QtyPct(f64),

    #[error("commission_pct must be in [0, 100), got {0}")]
    Commission(f64),

    #[error("tick_size must be finite and > 0 when slippage_ticks > 0, got {0}")]
    TickSize(f64),

    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Options for a single engine run.
///
/// Every field has a default, so a TOML file only needs to name what it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Informational only; never enters the arithmetic.
    pub base_currency: String,
    pub initial_capital: f64,
    /// Fraction of the sizing base committed per entry (0.05 = 5%).
    pub qty_pct_of_equity: f64,
    /// Percent charged on each leg (0.18 = 0.18% of notional).
    pub commission_pct: f64,
    pub slippage_ticks: u32,
    pub tick_size: f64,
    /// Floor share counts to whole units.
    pub round_qty: bool,
    /// Fill entries and signal exits at the next bar's open instead of this bar's close.
    pub execute_on_next_open: bool,
    /// Size from current equity (true) or from initial capital (false).
    pub compounding: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_currency: "USD".into(),
            initial_capital: 100_000.0,
            qty_pct_of_equity: 0.05,
            commission_pct: 0.0,
            slippage_ticks: 0,
            tick_size: 0.01,
            round_qty: true,
            execute_on_next_open: true,
            compounding: false,
        }
    }
}

impl EngineConfig {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            ..Self::default()
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(ConfigError::InitialCapital(self.initial_capital));
        }
        if !(self.qty_pct_of_equity.is_finite() && self.qty_pct_of_equity > 0.0) {
            return Err(ConfigError::QtyPct(self.qty_pct_of_equity));
        }
        if !(self.commission_pct.is_finite()
            && self.commission_pct >= 0.0
            && self.commission_pct < 100.0)
        {
            return Err(ConfigError::Commission(self.commission_pct));
        }
        if self.slippage_ticks > 0 && !(self.tick_size.is_finite() && self.tick_size > 0.0) {
            return Err(ConfigError::TickSize(self.tick_size));
        }
        Ok(())
    }

    /// Absolute price adjustment applied to every non-stop fill.
    pub fn slippage_amount(&self) -> f64 {
        self.slippage_ticks as f64 * self.tick_size
    }
}
