//! Dataset fingerprinting: a short, deterministic identity for a bar table.
//!
//! Hashes summary statistics rather than every cell: two tables with the same
//! row count, price extremes and date span share a fingerprint. That is enough
//! to tell "same download" from "different download" in run artifacts.

use crate::data::BarTable;
use serde::{Deserialize, Serialize};

/// Hex characters kept from the BLAKE3 digest.
pub const FINGERPRINT_LEN: usize = 16;

/// Summary statistics that feed the hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSummary {
    pub rows: usize,
    /// Lowest non-NaN low, `None` if every low is NaN.
    pub min_low: Option<f64>,
    pub max_high: Option<f64>,
    pub first: Option<String>,
    pub last: Option<String>,
}

impl DataSummary {
    pub fn of(table: &BarTable) -> Self {
        let lows = table.iter().map(|b| b.low).filter(|v| !v.is_nan());
        let highs = table.iter().map(|b| b.high).filter(|v| !v.is_nan());
        Self {
            rows: table.len(),
            min_low: lows.reduce(f64::min),
            max_high: highs.reduce(f64::max),
            first: table.first_time().map(|t| t.to_string()),
            last: table.last_time().map(|t| t.to_string()),
        }
    }

    /// Canonical text form. Prices are fixed to 6 decimals so float noise
    /// below that does not change the hash.
    fn canonical(&self) -> String {
        let price = |v: Option<f64>| v.map_or_else(|| "nan".to_string(), |p| format!("{p:.6}"));
        format!(
            "rows={};min_low={};max_high={};first={};last={}",
            self.rows,
            price(self.min_low),
            price(self.max_high),
            self.first.as_deref().unwrap_or("-"),
            self.last.as_deref().unwrap_or("-"),
        )
    }

    pub fn fingerprint(&self) -> String {
        let hash = blake3::hash(self.canonical().as_bytes());
        hash.to_hex()[..FINGERPRINT_LEN].to_string()
    }
}

/// Fingerprint of a table.
pub fn fingerprint(table: &BarTable) -> String {
    DataSummary::of(table).fingerprint()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use chrono::NaiveDate;

    fn table(closes: &[f64]) -> BarTable {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        BarTable::new(
            closes
                .iter()
                .enumerate()
                .map(|(i, &c)| {
                    Bar::new(base + chrono::Duration::days(i as i64), c, c + 1.0, c - 1.0, c)
                })
                .collect(),
        )
    }

    #[test]
    fn fingerprint_is_deterministic_and_short() {
        let t = table(&[100.0, 101.0, 102.0]);
        let f1 = fingerprint(&t);
        let f2 = fingerprint(&t);
        assert_eq!(f1, f2);
        assert_eq!(f1.len(), FINGERPRINT_LEN);
    }

    #[test]
    fn fingerprint_changes_with_extremes() {
        let a = fingerprint(&table(&[100.0, 101.0, 102.0]));
        let b = fingerprint(&table(&[100.0, 101.0, 150.0]));
        assert_ne!(a, b);
    }

    #[test]
    fn summary_skips_nan() {
        let summary = DataSummary::of(&table(&[100.0, f64::NAN, 90.0]));
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.min_low, Some(89.0));
        assert_eq!(summary.max_high, Some(101.0));
    }

    #[test]
    fn empty_table_has_fingerprint() {
        let summary = DataSummary::of(&BarTable::new(Vec::new()));
        assert_eq!(summary.min_low, None);
        assert_eq!(summary.fingerprint().len(), FINGERPRINT_LEN);
    }
}
