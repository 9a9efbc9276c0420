//! Bar-by-bar event loop.
//!
//! Phases per bar:
//! 1. Stop check: the lowest lot stop against the bar's low
//! 2. Strategy: `on_bar` sees the post-stop state
//! 3. Signal exit, then entry, then stop ratchet
//! 4. Post-bar: mark-to-market, ledgers, invariant check

use crate::config::{ConfigError, EngineConfig};
use crate::data::{BarTable, BarTableError};
use crate::domain::{EquityPoint, SignalPoint, TradeRecord, SIGNAL_EXIT_REASON, STOP_EXIT_REASON};
use crate::strategy::{Decision, Strategy, StrategyContext};
use crate::validation::{DataValidator, ValidationReport};
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::accounting::{Account, EntrySkip};
use super::fill::{FillModel, FillPoint};
use super::result::RunResult;
use super::stops::stop_trigger;

#[cfg(debug_assertions)]
use super::invariants::check_invariants;

/// Data quality threshold: warn if the NaN-close bar rate exceeds this fraction.
const VOID_BAR_RATE_THRESHOLD: f64 = 0.10;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Data(#[from] BarTableError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A configured run: data, one strategy, and options.
pub struct Engine {
    bars: BarTable,
    strategy: Box<dyn Strategy>,
    config: EngineConfig,
    validator: DataValidator,
    source: Option<PathBuf>,
}

impl Engine {
    pub fn new(
        bars: BarTable,
        strategy: Box<dyn Strategy>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            bars,
            strategy,
            config,
            validator: DataValidator::default(),
            source: None,
        })
    }

    pub fn from_dataframe(
        df: &DataFrame,
        strategy: Box<dyn Strategy>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        Self::new(BarTable::from_dataframe(df)?, strategy, config)
    }

    /// Load bars from a CSV or parquet file. The path is also handed to the
    /// validator for its file checks.
    pub fn from_path(
        path: &Path,
        strategy: Box<dyn Strategy>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let engine = Self::new(BarTable::load(path)?, strategy, config)?;
        Ok(engine.with_source(path))
    }

    pub fn with_validator(mut self, validator: DataValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    pub fn bars(&self) -> &BarTable {
        &self.bars
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate, then simulate every bar.
    pub fn run(self) -> RunResult {
        let validation = self.validator.validate(&self.bars, self.source.as_deref());
        validation.emit();
        run_backtest(&self.bars, self.strategy, &self.config, validation)
    }
}

/// Simulate `strategy` over `bars`.
///
/// The config is assumed valid; [`Engine::new`] checks it. `validation` is
/// carried into the result untouched.
pub fn run_backtest(
    table: &BarTable,
    mut strategy: Box<dyn Strategy>,
    config: &EngineConfig,
    validation: ValidationReport,
) -> RunResult {
    let bars = table.bars();
    let fill_model = FillModel::from_config(config);
    let pyramiding = strategy.pyramiding();
    let name = strategy.name().to_string();

    info!(
        strategy = %name,
        bars = bars.len(),
        fingerprint = %validation.fingerprint,
        "starting run"
    );
    strategy.prepare(table);

    let mut account = Account::new(config.initial_capital);
    let mut ctx = StrategyContext::new(config.initial_capital);
    let mut trades: Vec<TradeRecord> = Vec::new();
    let mut equity_curve = Vec::with_capacity(bars.len());
    let mut signals = Vec::with_capacity(bars.len());
    let mut last_valid_close: Option<f64> = None;
    let mut equity = config.initial_capital;
    let mut void_bars = 0;
    #[cfg(debug_assertions)]
    let mut sign_warned = false;

    for (t, bar) in bars.iter().enumerate() {
        account.tick_bar(t);

        if !bar.is_tradable() {
            // Void bar: no strategy call, no fills. Equity carries forward
            // at the last valid close.
            void_bars += 1;
            let mark = last_valid_close.unwrap_or(0.0);
            equity = account.equity(mark);
            equity_curve.push(EquityPoint {
                time: bar.timestamp,
                equity,
                cash: account.cash(),
                qty: account.quantity(),
                price: f64::NAN,
            });
            signals.push(SignalPoint::idle(bar.timestamp));
            #[cfg(debug_assertions)]
            verify_bar(&account, equity, mark, pyramiding, t, &mut sign_warned);
            continue;
        }

        // ─── Phase 1: Stop check ───
        let mut stopped = false;
        if let Some(stop) = account.position().and_then(|p| stop_trigger(p, bar)) {
            let exits = account.close_all(
                FillPoint {
                    bar: t,
                    time: bar.timestamp,
                    price: stop,
                },
                config.commission_pct,
                STOP_EXIT_REASON,
            );
            debug!(bar = t, stop, lots = exits.len(), "stop hit");
            trades.extend(exits);
            ctx.state.clear();
            stopped = true;
        }

        // ─── Phase 2: Strategy ───
        ctx.refresh(t, account.cash(), account.equity(bar.close), account.position());
        let decision = strategy.on_bar(t, bar, &mut ctx);
        let mut did_exit = stopped;
        let mut did_enter = false;

        // A stop on this bar pre-empts the strategy's exit and entry.
        if !stopped {
            // ─── Phase 3a: Signal exit ───
            if decision.exit_long && account.is_open() {
                match fill_model.market_sell(bars, t) {
                    Some(fill) => {
                        let reason = exit_reason(&decision);
                        let exits = account.close_all(fill, config.commission_pct, reason);
                        debug!(
                            bar = t,
                            price = fill.price,
                            lots = exits.len(),
                            reason,
                            "signal exit"
                        );
                        trades.extend(exits);
                        ctx.state.clear();
                        did_exit = true;
                    }
                    None => debug!(bar = t, "exit skipped: no fill price"),
                }
            }
            let held_before_entry = account.is_open();

            // ─── Phase 3b: Entry ───
            if decision.enter_long && account.entries_count() < pyramiding {
                did_enter = try_enter(
                    t,
                    table,
                    &fill_model,
                    config,
                    &decision,
                    strategy.as_mut(),
                    &mut account,
                    &mut ctx,
                );
            }

            // ─── Phase 3c: Stop ratchet ───
            if held_before_entry {
                if let Some(candidate) = decision.updated_stop {
                    let moved = account.raise_stops(candidate);
                    if moved > 0 {
                        debug!(bar = t, stop = candidate, lots = moved, "stop raised");
                    }
                }
            }
        }

        // ─── Phase 4: Post-bar ───
        last_valid_close = Some(bar.close);
        equity = account.equity(bar.close);
        equity_curve.push(EquityPoint {
            time: bar.timestamp,
            equity,
            cash: account.cash(),
            qty: account.quantity(),
            price: bar.close,
        });
        signals.push(SignalPoint {
            time: bar.timestamp,
            enter_long_requested: decision.enter_long,
            exit_long_requested: decision.exit_long,
            did_enter,
            did_exit,
        });

        #[cfg(debug_assertions)]
        verify_bar(&account, equity, bar.close, pyramiding, t, &mut sign_warned);
    }

    if !bars.is_empty() {
        let rate = void_bars as f64 / bars.len() as f64;
        if rate > VOID_BAR_RATE_THRESHOLD {
            warn!(
                void_bars,
                rate = %format!("{:.1}%", rate * 100.0),
                "void bar rate exceeds {:.0}% threshold",
                VOID_BAR_RATE_THRESHOLD * 100.0
            );
        }
    }

    let final_cash = account.cash();
    let total_commission = account.commission_paid();
    let open = account.into_open_trades();
    if !open.is_empty() {
        debug!(lots = open.len(), "lots still open at end of data");
    }
    trades.extend(open);

    let result = RunResult {
        strategy: name,
        bar_count: bars.len(),
        trades,
        equity_curve,
        signals,
        validation,
        initial_capital: config.initial_capital,
        final_cash,
        final_equity: equity,
        total_commission,
        void_bars,
    };
    info!(
        strategy = %result.strategy,
        trades = result.trades.len(),
        final_equity = result.final_equity,
        "run complete"
    );
    result
}

/// Panic on a broken accounting invariant. Negative cash or equity caused
/// by non-positive prices in the data is logged once instead: bad data is
/// advisory and never halts a run.
#[cfg(debug_assertions)]
fn verify_bar(
    account: &Account,
    equity: f64,
    mark: f64,
    pyramiding: usize,
    t: usize,
    sign_warned: &mut bool,
) {
    match check_invariants(account, equity, mark, pyramiding) {
        Ok(()) => {}
        Err(violation) if violation.is_price_driven() => {
            if !*sign_warned {
                warn!(bar = t, %violation, "account went negative on non-positive prices");
                *sign_warned = true;
            }
        }
        Err(violation) => panic!("invariant violated at bar {t}: {violation}"),
    }
}

fn exit_reason(decision: &Decision) -> &str {
    if decision.signal_reason.is_empty() {
        SIGNAL_EXIT_REASON
    } else {
        &decision.signal_reason
    }
}

/// Size, fill and book one entry. Returns whether a lot was opened.
#[allow(clippy::too_many_arguments)]
fn try_enter(
    t: usize,
    table: &BarTable,
    fill_model: &FillModel,
    config: &EngineConfig,
    decision: &Decision,
    strategy: &mut dyn Strategy,
    account: &mut Account,
    ctx: &mut StrategyContext,
) -> bool {
    let bars = table.bars();
    let Some(fill) = fill_model.market_buy(bars, t) else {
        debug!(bar = t, "entry skipped: no fill price");
        return false;
    };
    let sizing_base = if config.compounding {
        account.equity(bars[t].close)
    } else {
        config.initial_capital
    };
    let qty = strategy.size(sizing_base, fill.price, config);
    let commission = fill_model.commission(qty * fill.price);

    match account.open_lot(fill, qty, commission, decision.stop, decision.signal_reason.clone()) {
        Ok(lot) => {
            debug!(
                bar = t,
                fill_bar = lot.entry_bar,
                price = lot.entry_price,
                qty = lot.entry_qty,
                commission = lot.entry_commission,
                "entry filled"
            );
        }
        Err(EntrySkip::NoQuantity(qty)) => {
            debug!(bar = t, qty, "entry skipped: sizer returned no quantity");
            return false;
        }
        Err(EntrySkip::InsufficientCash { needed, available }) => {
            debug!(bar = t, needed, available, "entry skipped: insufficient cash");
            return false;
        }
    }

    ctx.refresh(t, account.cash(), account.equity(bars[t].close), account.position());
    if let Some(stop) = strategy
        .on_entry(fill.time, fill.price, ctx)
        .and_then(|meta| meta.stop_price)
    {
        account.set_last_stop(stop);
        ctx.refresh(t, account.cash(), account.equity(bars[t].close), account.position());
    }
    true
}
