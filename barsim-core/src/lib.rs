//! Barsim Core: single-instrument, long-only bar-by-bar backtesting.
//!
//! This crate contains:
//! - Domain types (bars, lots, positions, trade and equity ledgers)
//! - Bar table loading from polars frames, CSV and parquet
//! - Bar-by-bar engine with same-bar stops, pyramiding and atomic exits
//! - Strategy trait, built-in strategies and a name-based registry
//! - Advisory data validation with a dataset fingerprint
//! - CSV, JSON and parquet export of run results

pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod export;
pub mod fingerprint;
pub mod indicators;
pub mod sizers;
pub mod strategy;
pub mod validation;

pub use config::{ConfigError, EngineConfig};
pub use data::{BarTable, BarTableError};
pub use engine::{run_backtest, Engine, EngineError, RunResult};
pub use strategy::{create_strategy, Decision, EntryMeta, Strategy, StrategyContext, StrategySpec};
pub use validation::{DataValidator, ValidationConfig, ValidationReport};
