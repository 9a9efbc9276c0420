//! TradeRecord: one ledger row per lot.

use super::lot::Lot;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Whether the lot behind a trade row was closed during the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStatus {
    Closed,
    Open,
}

impl TradeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
        }
    }
}

/// Exit reason recorded for stop-loss fills.
pub const STOP_EXIT_REASON: &str = "stop";

/// Exit reason recorded for signal exits whose decision carried no reason.
pub const SIGNAL_EXIT_REASON: &str = "signal";

/// One row per lot, written when the lot closes or at end of data.
///
/// Lots still open at the end of the run keep their exit fields empty and
/// `status = Open`. They carry no realized P&L: that exposure is tracked by
/// the equity curve instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    // ── Entry ──
    pub entry_bar: usize,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub entry_qty: f64,
    pub entry_signal_reason: String,

    // ── Exit ──
    pub exit_bar: Option<usize>,
    pub exit_time: Option<NaiveDateTime>,
    pub exit_price: Option<f64>,
    pub exit_reason: Option<String>,
    pub stop_price_at_close: Option<f64>,

    // ── Costs ──
    pub commission_entry: f64,
    pub commission_exit: f64,

    // ── PnL ──
    pub gross_pnl: Option<f64>,
    pub net_pnl: Option<f64>,

    pub bars_held: usize,
    pub status: TradeStatus,
}

impl TradeRecord {
    /// Row for a lot closed at `exit_price`.
    pub fn closed(
        lot: Lot,
        exit_bar: usize,
        exit_time: NaiveDateTime,
        exit_price: f64,
        commission_exit: f64,
        exit_reason: String,
    ) -> Self {
        let gross = (exit_price - lot.entry_price) * lot.entry_qty;
        let net = gross - lot.entry_commission - commission_exit;
        Self {
            entry_bar: lot.entry_bar,
            entry_time: lot.entry_time,
            entry_price: lot.entry_price,
            entry_qty: lot.entry_qty,
            entry_signal_reason: lot.signal_reason,
            exit_bar: Some(exit_bar),
            exit_time: Some(exit_time),
            exit_price: Some(exit_price),
            exit_reason: Some(exit_reason),
            stop_price_at_close: lot.stop_price,
            commission_entry: lot.entry_commission,
            commission_exit,
            gross_pnl: Some(gross),
            net_pnl: Some(net),
            bars_held: lot.time_in_trade,
            status: TradeStatus::Closed,
        }
    }

    /// Row for a lot still open when the bar sequence ends.
    pub fn still_open(lot: Lot) -> Self {
        Self {
            entry_bar: lot.entry_bar,
            entry_time: lot.entry_time,
            entry_price: lot.entry_price,
            entry_qty: lot.entry_qty,
            entry_signal_reason: lot.signal_reason,
            exit_bar: None,
            exit_time: None,
            exit_price: None,
            exit_reason: None,
            stop_price_at_close: None,
            commission_entry: lot.entry_commission,
            commission_exit: 0.0,
            gross_pnl: None,
            net_pnl: None,
            bars_held: lot.time_in_trade,
            status: TradeStatus::Open,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status == TradeStatus::Closed
    }

    pub fn is_stop_exit(&self) -> bool {
        self.exit_reason.as_deref() == Some(STOP_EXIT_REASON)
    }

    /// Net return on the entry notional. `None` for open trades.
    pub fn return_pct(&self) -> Option<f64> {
        let notional = self.entry_price * self.entry_qty;
        if notional == 0.0 {
            return None;
        }
        self.net_pnl.map(|net| net / notional)
    }
}
