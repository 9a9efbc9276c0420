//! Closed registry: builds a boxed [`Strategy`] from a name and numeric params.

use super::{BuyAndHold, DonchianBreakout, FlatStrategy, MaCrossover, Strategy};
use crate::sizers::Sizer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Every name [`create_strategy`] accepts.
pub const STRATEGY_NAMES: [&str; 4] = ["flat", "buy_and_hold", "ma_crossover", "donchian_breakout"];

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("unknown strategy: {0} (available: {names})", names = STRATEGY_NAMES.join(", "))]
    UnknownStrategy(String),

    #[error("strategy {strategy}: invalid parameter {param}: {reason}")]
    InvalidParam {
        strategy: String,
        param: String,
        reason: String,
    },
}

/// Name plus parameters. `BTreeMap` keeps the serialized form deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySpec {
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

impl StrategySpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: f64) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    fn param(&self, key: &str, default: f64) -> f64 {
        self.params.get(key).copied().unwrap_or(default)
    }

    fn invalid(&self, param: &str, reason: impl Into<String>) -> RegistryError {
        RegistryError::InvalidParam {
            strategy: self.name.clone(),
            param: param.into(),
            reason: reason.into(),
        }
    }

    /// Whole-number parameter >= `min`.
    fn count(&self, key: &str, default: usize, min: usize) -> Result<usize, RegistryError> {
        let v = self.param(key, default as f64);
        if !v.is_finite() || v.fract() != 0.0 || v < min as f64 {
            return Err(self.invalid(key, format!("must be an integer >= {min}, got {v}")));
        }
        Ok(v as usize)
    }

    /// Fraction in [0, 1).
    fn fraction(&self, key: &str) -> Result<f64, RegistryError> {
        let v = self.param(key, 0.0);
        if !(v.is_finite() && (0.0..1.0).contains(&v)) {
            return Err(self.invalid(key, format!("must be in [0, 1), got {v}")));
        }
        Ok(v)
    }

    fn sizer(&self) -> Result<Sizer, RegistryError> {
        match (self.params.get("fixed_shares"), self.params.get("fixed_notional")) {
            (Some(_), Some(_)) => Err(self.invalid(
                "fixed_shares",
                "cannot be combined with fixed_notional",
            )),
            (Some(&q), None) if q > 0.0 => Ok(Sizer::FixedShares(q)),
            (None, Some(&a)) if a > 0.0 => Ok(Sizer::FixedNotional(a)),
            (Some(_), None) => Err(self.invalid("fixed_shares", "must be > 0")),
            (None, Some(_)) => Err(self.invalid("fixed_notional", "must be > 0")),
            (None, None) => Ok(Sizer::PercentOfBase),
        }
    }
}

/// Build a strategy from its spec.
pub fn create_strategy(spec: &StrategySpec) -> Result<Box<dyn Strategy>, RegistryError> {
    match spec.name.as_str() {
        "flat" => Ok(Box::new(FlatStrategy)),
        "buy_and_hold" => Ok(Box::new(BuyAndHold::new(
            spec.fraction("stop_pct")?,
            spec.sizer()?,
        ))),
        "ma_crossover" => {
            let fast = spec.count("fast_period", 10, 1)?;
            let slow = spec.count("slow_period", 50, 2)?;
            if slow <= fast {
                return Err(spec.invalid("slow_period", "must be > fast_period"));
            }
            Ok(Box::new(
                MaCrossover::new(fast, slow)
                    .with_stops(spec.fraction("stop_pct")?, spec.fraction("trail_pct")?)
                    .with_pyramiding(spec.count("pyramiding", 1, 1)?)
                    .with_sizer(spec.sizer()?),
            ))
        }
        "donchian_breakout" => Ok(Box::new(
            DonchianBreakout::new(
                spec.count("entry_lookback", 20, 1)?,
                spec.count("exit_lookback", 10, 1)?,
            )
            .with_stops(spec.fraction("stop_pct")?, spec.fraction("trail_pct")?)
            .with_pyramiding(spec.count("pyramiding", 1, 1)?)
            .with_sizer(spec.sizer()?),
        )),
        other => Err(RegistryError::UnknownStrategy(other.to_string())),
    }
}
