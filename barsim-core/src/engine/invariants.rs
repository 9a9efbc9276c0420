//! Accounting invariants checked after every bar in debug builds.

use super::accounting::Account;
use thiserror::Error;

/// Absolute tolerance for float comparisons.
const TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    #[error("cash is negative: {0}")]
    NegativeCash(f64),

    #[error("equity is negative: {0}")]
    NegativeEquity(f64),

    #[error("position quantity {aggregate} does not match lot total {lots}")]
    QuantityMismatch { aggregate: f64, lots: f64 },

    #[error("lot with non-positive quantity {0}")]
    NonPositiveLot(f64),

    #[error("{entries} open lots exceed pyramiding limit {limit}")]
    PyramidingExceeded { entries: usize, limit: usize },

    #[error("equity {equity} != cash {cash} + qty {qty} * price {price}")]
    EquityIdentity {
        equity: f64,
        cash: f64,
        qty: f64,
        price: f64,
    },
}

impl InvariantViolation {
    /// Sign violations that non-positive prices in the input can produce
    /// on their own. The accounting is still consistent when these fire.
    pub fn is_price_driven(&self) -> bool {
        matches!(self, Self::NegativeCash(_) | Self::NegativeEquity(_))
    }
}

/// Check account state against the equity recorded for the bar.
///
/// `mark` is the price the equity was computed at: this bar's close, or the
/// last valid close on a NaN bar. Structural checks run before the sign
/// checks, so a price-driven violation implies the rest held.
pub fn check_invariants(
    account: &Account,
    equity: f64,
    mark: f64,
    pyramiding: usize,
) -> Result<(), InvariantViolation> {
    let cash = account.cash();

    if let Some(pos) = account.position() {
        if let Some(lot) = pos.lots().iter().find(|l| l.entry_qty <= 0.0) {
            return Err(InvariantViolation::NonPositiveLot(lot.entry_qty));
        }
        let lots: f64 = pos.lots().iter().map(|l| l.entry_qty).sum();
        if (lots - pos.quantity()).abs() > TOLERANCE {
            return Err(InvariantViolation::QuantityMismatch {
                aggregate: pos.quantity(),
                lots,
            });
        }
        if pos.entries_count() > pyramiding {
            return Err(InvariantViolation::PyramidingExceeded {
                entries: pos.entries_count(),
                limit: pyramiding,
            });
        }
    }

    let qty = account.quantity();
    let expected = cash + qty * mark;
    if (equity - expected).abs() > TOLERANCE * expected.abs().max(1.0) {
        return Err(InvariantViolation::EquityIdentity {
            equity,
            cash,
            qty,
            price: mark,
        });
    }

    if cash < -TOLERANCE {
        return Err(InvariantViolation::NegativeCash(cash));
    }
    if equity < -TOLERANCE {
        return Err(InvariantViolation::NegativeEquity(equity));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fill::FillPoint;
    use chrono::NaiveDate;

    fn fill(price: f64) -> FillPoint {
        FillPoint {
            bar: 0,
            time: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            price,
        }
    }

    #[test]
    fn flat_account_holds() {
        let acct = Account::new(1_000.0);
        assert_eq!(check_invariants(&acct, 1_000.0, 10.0, 1), Ok(()));
    }

    #[test]
    fn equity_identity_detected() {
        let mut acct = Account::new(1_000.0);
        acct.open_lot(fill(10.0), 10.0, 0.0, None, String::new())
            .unwrap();
        assert_eq!(check_invariants(&acct, 1_000.0, 10.0, 1), Ok(()));
        assert!(matches!(
            check_invariants(&acct, 1_050.0, 10.0, 1),
            Err(InvariantViolation::EquityIdentity { .. })
        ));
    }

    #[test]
    fn pyramiding_limit_detected() {
        let mut acct = Account::new(1_000.0);
        acct.open_lot(fill(10.0), 10.0, 0.0, None, String::new())
            .unwrap();
        acct.open_lot(fill(10.0), 10.0, 0.0, None, String::new())
            .unwrap();
        assert_eq!(
            check_invariants(&acct, 1_000.0, 10.0, 1),
            Err(InvariantViolation::PyramidingExceeded {
                entries: 2,
                limit: 1
            })
        );
    }

    #[test]
    fn negative_mark_is_price_driven() {
        let mut acct = Account::new(1_000.0);
        acct.open_lot(fill(10.0), 50.0, 0.0, None, String::new())
            .unwrap();
        // 500 cash + 50 * -30
        let violation = check_invariants(&acct, -1_000.0, -30.0, 1).unwrap_err();
        assert_eq!(violation, InvariantViolation::NegativeEquity(-1_000.0));
        assert!(violation.is_price_driven());
    }

    #[test]
    fn identity_checked_before_sign() {
        let acct = Account::new(1_000.0);
        let violation = check_invariants(&acct, -5.0, 10.0, 1).unwrap_err();
        assert!(matches!(violation, InvariantViolation::EquityIdentity { .. }));
        assert!(!violation.is_price_driven());
    }
}
