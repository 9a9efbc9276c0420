//! Run artifacts: CSV ledgers, JSON result, parquet frames.
//!
//! A saved run is a directory holding:
//! - `result.json`: the full [`RunResult`]
//! - `trades.csv`, `equity.csv`, `signals.csv`: the three ledgers
//! - `trades.parquet`, `equity.parquet`, `signals.parquet` when requested

use crate::domain::{EquityPoint, SignalPoint, TradeRecord};
use crate::engine::RunResult;
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("parquet: {0}")]
    Polars(#[from] PolarsError),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("csv output is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn time(t: NaiveDateTime) -> String {
    t.format(TIME_FORMAT).to_string()
}

fn opt_time(t: Option<NaiveDateTime>) -> String {
    t.map(time).unwrap_or_default()
}

/// NaN and missing values become empty cells.
fn num(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        v.to_string()
    }
}

fn opt_num(v: Option<f64>) -> String {
    v.map(num).unwrap_or_default()
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let data = wtr
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8(data)?)
}

// ─── CSV ────────────────────────────────────────────────────────────

pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "entry_bar",
        "entry_time",
        "entry_price",
        "entry_qty",
        "entry_signal_reason",
        "exit_bar",
        "exit_time",
        "exit_price",
        "exit_reason",
        "stop_price_at_close",
        "commission_entry",
        "commission_exit",
        "gross_pnl",
        "net_pnl",
        "bars_held",
        "status",
    ])?;
    for t in trades {
        wtr.write_record([
            t.entry_bar.to_string(),
            time(t.entry_time),
            num(t.entry_price),
            num(t.entry_qty),
            t.entry_signal_reason.clone(),
            t.exit_bar.map(|b| b.to_string()).unwrap_or_default(),
            opt_time(t.exit_time),
            opt_num(t.exit_price),
            t.exit_reason.clone().unwrap_or_default(),
            opt_num(t.stop_price_at_close),
            num(t.commission_entry),
            num(t.commission_exit),
            opt_num(t.gross_pnl),
            opt_num(t.net_pnl),
            t.bars_held.to_string(),
            t.status.as_str().to_string(),
        ])?;
    }
    finish(wtr)
}

pub fn export_equity_csv(points: &[EquityPoint]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["time", "equity", "cash", "qty", "price"])?;
    for p in points {
        wtr.write_record([
            time(p.time),
            num(p.equity),
            num(p.cash),
            num(p.qty),
            num(p.price),
        ])?;
    }
    finish(wtr)
}

pub fn export_signals_csv(points: &[SignalPoint]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "time",
        "enter_long_requested",
        "exit_long_requested",
        "did_enter",
        "did_exit",
    ])?;
    for p in points {
        wtr.write_record([
            time(p.time),
            p.enter_long_requested.to_string(),
            p.exit_long_requested.to_string(),
            p.did_enter.to_string(),
            p.did_exit.to_string(),
        ])?;
    }
    finish(wtr)
}

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_json(result: &RunResult) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(result)?)
}

pub fn import_json(json: &str) -> Result<RunResult, ExportError> {
    Ok(serde_json::from_str(json)?)
}

// ─── Parquet ────────────────────────────────────────────────────────

pub fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), ExportError> {
    let file = fs::File::create(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ParquetWriter::new(file).finish(df)?;
    Ok(())
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Which files [`save_run`] writes besides the JSON and CSVs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    pub parquet: bool,
}

/// Write every artifact of `result` into `dir`, creating it if needed.
///
/// Returns `dir` for chaining into log output.
pub fn save_run(
    result: &RunResult,
    dir: &Path,
    options: SaveOptions,
) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let write = |name: &str, contents: String| {
        let path = dir.join(name);
        fs::write(&path, contents).map_err(|source| ExportError::Io { path, source })
    };

    write("result.json", export_json(result)?)?;
    write("trades.csv", export_trades_csv(&result.trades)?)?;
    write("equity.csv", export_equity_csv(&result.equity_curve)?)?;
    write("signals.csv", export_signals_csv(&result.signals)?)?;

    if options.parquet {
        write_parquet(&mut result.trades_frame()?, &dir.join("trades.parquet"))?;
        write_parquet(&mut result.equity_frame()?, &dir.join("equity.parquet"))?;
        write_parquet(&mut result.signals_frame()?, &dir.join("signals.parquet"))?;
    }

    tracing::info!(dir = %dir.display(), trades = result.trades.len(), "run artifacts saved");
    Ok(dir.to_path_buf())
}
