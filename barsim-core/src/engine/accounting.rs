//! Cash and position accounting for a single long-only instrument.

use crate::domain::{Lot, Position, TradeRecord};
use crate::engine::fill::FillPoint;

/// Why an entry request did not become a lot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntrySkip {
    /// Sizer returned zero, a negative or a non-finite quantity.
    NoQuantity(f64),
    InsufficientCash { needed: f64, available: f64 },
}

/// Cash plus the open position, if any.
///
/// Flat is `position == None`. Every mutation keeps
/// `cash + qty * price` consistent with the fills that caused it.
#[derive(Debug, Clone)]
pub struct Account {
    cash: f64,
    position: Option<Position>,
    commission_paid: f64,
}

impl Account {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            cash: initial_cash,
            position: None,
            commission_paid: 0.0,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.position.is_some()
    }

    pub fn quantity(&self) -> f64 {
        self.position.as_ref().map_or(0.0, Position::quantity)
    }

    pub fn entries_count(&self) -> usize {
        self.position.as_ref().map_or(0, Position::entries_count)
    }

    pub fn commission_paid(&self) -> f64 {
        self.commission_paid
    }

    /// Cash plus the position marked at `price`.
    pub fn equity(&self, price: f64) -> f64 {
        match &self.position {
            Some(pos) => self.cash + pos.market_value(price),
            None => self.cash,
        }
    }

    /// Buy `qty` at `fill` and book it as a new lot.
    ///
    /// Rejected without side effects when the quantity is unusable or cash
    /// does not cover notional plus commission.
    pub fn open_lot(
        &mut self,
        fill: FillPoint,
        qty: f64,
        commission: f64,
        stop_price: Option<f64>,
        signal_reason: String,
    ) -> Result<&Lot, EntrySkip> {
        if !(qty.is_finite() && qty > 0.0) {
            return Err(EntrySkip::NoQuantity(qty));
        }
        let needed = qty * fill.price + commission;
        if needed > self.cash {
            return Err(EntrySkip::InsufficientCash {
                needed,
                available: self.cash,
            });
        }

        self.cash -= needed;
        self.commission_paid += commission;
        let lot = Lot {
            entry_bar: fill.bar,
            entry_time: fill.time,
            entry_price: fill.price,
            entry_qty: qty,
            entry_commission: commission,
            stop_price: stop_price.filter(|s| s.is_finite()),
            time_in_trade: 0,
            signal_reason,
        };
        let pos = match self.position.take() {
            Some(mut pos) => {
                pos.add_lot(lot);
                pos
            }
            None => Position::open(lot),
        };
        let pos = self.position.insert(pos);
        Ok(&pos.lots()[pos.entries_count() - 1])
    }

    /// Replace the stop of the most recent lot. Used for the strategy's
    /// `on_entry` override, which is not subject to the ratchet.
    pub fn set_last_stop(&mut self, stop_price: f64) {
        if !stop_price.is_finite() {
            return;
        }
        if let Some(lot) = self
            .position
            .as_mut()
            .and_then(|p| p.lots_mut().last_mut())
        {
            lot.stop_price = Some(stop_price);
        }
    }

    /// Ratchet every lot's stop toward `candidate`. Returns the number of
    /// lots whose stop moved.
    pub fn raise_stops(&mut self, candidate: f64) -> usize {
        self.position.as_mut().map_or(0, |pos| {
            pos.lots_mut()
                .iter_mut()
                .map(|lot| lot.raise_stop(candidate))
                .filter(|&moved| moved)
                .count()
        })
    }

    /// Sell every lot at `fill`. Each lot pays its own exit commission
    /// and gets its own trade row.
    pub fn close_all(
        &mut self,
        fill: FillPoint,
        commission_pct: f64,
        exit_reason: &str,
    ) -> Vec<TradeRecord> {
        let Some(pos) = self.position.take() else {
            return Vec::new();
        };
        pos.into_lots()
            .into_iter()
            .map(|lot| {
                let proceeds = lot.entry_qty * fill.price;
                let commission = proceeds * commission_pct / 100.0;
                self.cash += proceeds - commission;
                self.commission_paid += commission;
                TradeRecord::closed(
                    lot,
                    fill.bar,
                    fill.time,
                    fill.price,
                    commission,
                    exit_reason.to_string(),
                )
            })
            .collect()
    }

    pub fn tick_bar(&mut self, bar_index: usize) {
        if let Some(pos) = self.position.as_mut() {
            pos.tick_bar(bar_index);
        }
    }

    /// Trade rows for every lot still held. Consumes the account.
    pub fn into_open_trades(self) -> Vec<TradeRecord> {
        self.position
            .map(|pos| {
                pos.into_lots()
                    .into_iter()
                    .map(TradeRecord::still_open)
                    .collect()
            })
            .unwrap_or_default()
    }
}
