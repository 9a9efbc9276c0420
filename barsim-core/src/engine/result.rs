//! Output of a run: the three ledgers plus summary figures.

use crate::domain::{EquityPoint, SignalPoint, TradeRecord};
use crate::validation::ValidationReport;
use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Everything a run produced.
///
/// `trades` holds one row per lot: closed lots in exit order, then any lots
/// still open at the end of data. `equity_curve` and `signals` hold one row
/// per input bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub strategy: String,
    pub bar_count: usize,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    pub signals: Vec<SignalPoint>,
    pub validation: ValidationReport,
    pub initial_capital: f64,
    pub final_cash: f64,
    pub final_equity: f64,
    /// Commission paid on every fill, entries and exits.
    pub total_commission: f64,
    /// Bars with a NaN close, skipped by the strategy.
    pub void_bars: usize,
}

impl RunResult {
    pub fn closed_trades(&self) -> impl Iterator<Item = &TradeRecord> {
        self.trades.iter().filter(|t| t.is_closed())
    }

    pub fn open_trades(&self) -> impl Iterator<Item = &TradeRecord> {
        self.trades.iter().filter(|t| !t.is_closed())
    }

    /// Realized net P&L over closed trades.
    pub fn closed_net_pnl(&self) -> f64 {
        self.closed_trades().filter_map(|t| t.net_pnl).sum()
    }

    pub fn total_return(&self) -> f64 {
        if self.initial_capital > 0.0 {
            self.final_equity / self.initial_capital - 1.0
        } else {
            0.0
        }
    }

    pub fn trades_frame(&self) -> PolarsResult<DataFrame> {
        let t = &self.trades;
        let col_f64 = |name: &str, f: fn(&TradeRecord) -> f64| {
            Column::new(name.into(), t.iter().map(f).collect::<Vec<_>>())
        };
        let col_opt_f64 = |name: &str, f: fn(&TradeRecord) -> Option<f64>| {
            Column::new(name.into(), t.iter().map(f).collect::<Vec<_>>())
        };
        DataFrame::new(vec![
            Column::new(
                "entry_bar".into(),
                t.iter().map(|r| r.entry_bar as u64).collect::<Vec<_>>(),
            ),
            datetime_column("entry_time", t.iter().map(|r| Some(r.entry_time)))?,
            col_f64("entry_price", |r| r.entry_price),
            col_f64("entry_qty", |r| r.entry_qty),
            Column::new(
                "entry_signal_reason".into(),
                t.iter()
                    .map(|r| r.entry_signal_reason.clone())
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                "exit_bar".into(),
                t.iter()
                    .map(|r| r.exit_bar.map(|b| b as u64))
                    .collect::<Vec<_>>(),
            ),
            datetime_column("exit_time", t.iter().map(|r| r.exit_time))?,
            col_opt_f64("exit_price", |r| r.exit_price),
            Column::new(
                "exit_reason".into(),
                t.iter().map(|r| r.exit_reason.clone()).collect::<Vec<_>>(),
            ),
            col_opt_f64("stop_price_at_close", |r| r.stop_price_at_close),
            col_f64("commission_entry", |r| r.commission_entry),
            col_f64("commission_exit", |r| r.commission_exit),
            col_opt_f64("gross_pnl", |r| r.gross_pnl),
            col_opt_f64("net_pnl", |r| r.net_pnl),
            Column::new(
                "bars_held".into(),
                t.iter().map(|r| r.bars_held as u64).collect::<Vec<_>>(),
            ),
            Column::new(
                "status".into(),
                t.iter().map(|r| r.status.as_str()).collect::<Vec<_>>(),
            ),
        ])
    }

    pub fn equity_frame(&self) -> PolarsResult<DataFrame> {
        let e = &self.equity_curve;
        DataFrame::new(vec![
            datetime_column("time", e.iter().map(|p| Some(p.time)))?,
            Column::new("equity".into(), e.iter().map(|p| p.equity).collect::<Vec<_>>()),
            Column::new("cash".into(), e.iter().map(|p| p.cash).collect::<Vec<_>>()),
            Column::new("qty".into(), e.iter().map(|p| p.qty).collect::<Vec<_>>()),
            Column::new("price".into(), e.iter().map(|p| p.price).collect::<Vec<_>>()),
        ])
    }

    pub fn signals_frame(&self) -> PolarsResult<DataFrame> {
        let s = &self.signals;
        let col = |name: &str, f: fn(&SignalPoint) -> bool| {
            Column::new(name.into(), s.iter().map(f).collect::<Vec<_>>())
        };
        DataFrame::new(vec![
            datetime_column("time", s.iter().map(|p| Some(p.time)))?,
            col("enter_long_requested", |p| p.enter_long_requested),
            col("exit_long_requested", |p| p.exit_long_requested),
            col("did_enter", |p| p.did_enter),
            col("did_exit", |p| p.did_exit),
        ])
    }
}

/// Millisecond datetime column, `None` becoming null.
fn datetime_column(
    name: &str,
    times: impl Iterator<Item = Option<NaiveDateTime>>,
) -> PolarsResult<Column> {
    let millis: Vec<Option<i64>> = times
        .map(|t| t.map(|t| t.and_utc().timestamp_millis()))
        .collect();
    Column::new(name.into(), millis).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
}
