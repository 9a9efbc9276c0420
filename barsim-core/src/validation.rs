//! Pre-flight data validation.
//!
//! Runs a fixed battery of checks once before simulation and returns a
//! report. Findings are advisory: the engine logs them and proceeds with
//! whatever data it was given.

use crate::data::BarTable;
use crate::fingerprint::fingerprint;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, SystemTime};

const SECS_PER_DAY: u64 = 86_400;

/// Thresholds for the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub min_rows: usize,
    /// Fraction of NaN values per price column above which the column fails.
    pub max_nan_fraction: f64,
    /// Source files older than this are reported as stale. `None` disables the check.
    pub max_cache_age_days: Option<u64>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_rows: 2,
            max_nan_fraction: 0.05,
            max_cache_age_days: None,
        }
    }
}

/// Result of a validation pass.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub fingerprint: String,
}

impl ValidationReport {
    /// Emit every finding on the warning channel.
    pub fn emit(&self) {
        for err in &self.errors {
            tracing::warn!(fingerprint = %self.fingerprint, "data validation error: {err}");
        }
        for warning in &self.warnings {
            tracing::warn!(fingerprint = %self.fingerprint, "data validation warning: {warning}");
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DataValidator {
    config: ValidationConfig,
}

impl DataValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate a table, optionally checking the file it was loaded from.
    pub fn validate(&self, table: &BarTable, source: Option<&Path>) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        self.check_columns(table, &mut warnings);
        self.check_rows(table, &mut errors);
        self.check_index(table, &mut errors);
        self.check_nans(table, &mut errors, &mut warnings);
        self.check_ohlc(table, &mut errors, &mut warnings);
        if let Some(path) = source {
            self.check_source(path, &mut errors, &mut warnings);
        }

        ValidationReport {
            passed: errors.is_empty(),
            errors,
            warnings,
            fingerprint: fingerprint(table),
        }
    }

    /// Required columns are enforced when the table is built
    /// (`BarTableError::MissingColumn`), so only optional ones are left.
    fn check_columns(&self, table: &BarTable, warnings: &mut Vec<String>) {
        if !table.has_volume() {
            warnings.push("no volume column".into());
        }
    }

    fn check_rows(&self, table: &BarTable, errors: &mut Vec<String>) {
        if table.len() < self.config.min_rows {
            errors.push(format!(
                "only {} rows, need at least {}",
                table.len(),
                self.config.min_rows
            ));
        }
    }

    fn check_index(&self, table: &BarTable, errors: &mut Vec<String>) {
        let bars = table.bars();
        let mut backwards = 0;
        let mut duplicates = 0;
        for pair in bars.windows(2) {
            match pair[1].timestamp.cmp(&pair[0].timestamp) {
                std::cmp::Ordering::Less => backwards += 1,
                std::cmp::Ordering::Equal => duplicates += 1,
                std::cmp::Ordering::Greater => {}
            }
        }
        if backwards > 0 {
            errors.push(format!("time index not monotonic: {backwards} rows go backwards"));
        }
        if duplicates > 0 {
            errors.push(format!("time index has {duplicates} duplicate timestamps"));
        }
    }

    fn check_nans(&self, table: &BarTable, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
        if table.is_empty() {
            return;
        }
        let columns: [(&str, fn(&crate::domain::Bar) -> f64); 4] = [
            ("open", |b| b.open),
            ("high", |b| b.high),
            ("low", |b| b.low),
            ("close", |b| b.close),
        ];
        for (name, get) in columns {
            let nans = table.iter().filter(|b| get(b).is_nan()).count();
            if nans == 0 {
                continue;
            }
            let fraction = nans as f64 / table.len() as f64;
            let msg = format!("{name}: {nans} NaN values ({:.1}%)", fraction * 100.0);
            if fraction > self.config.max_nan_fraction {
                errors.push(msg);
            } else {
                warnings.push(msg);
            }
        }
    }

    fn check_ohlc(&self, table: &BarTable, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
        let mut inverted = 0;
        let mut non_positive = 0;
        let mut outside_range = 0;
        for bar in table.iter().filter(|b| !b.is_void() && !b.is_sane()) {
            if bar.high < bar.low {
                inverted += 1;
            }
            if [bar.open, bar.high, bar.low, bar.close].iter().any(|&p| p <= 0.0) {
                non_positive += 1;
            }
            let in_range = |p: f64| p >= bar.low && p <= bar.high;
            if !in_range(bar.open) || !in_range(bar.close) {
                outside_range += 1;
            }
        }
        if inverted > 0 {
            errors.push(format!("{inverted} rows with high < low"));
        }
        if non_positive > 0 {
            errors.push(format!("{non_positive} rows with zero or negative prices"));
        }
        if outside_range > 0 {
            warnings.push(format!("{outside_range} rows with open/close outside [low, high]"));
        }
    }

    fn check_source(&self, path: &Path, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
        let modified = match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) if !path.exists() => {
                errors.push(format!("source file {} does not exist", path.display()));
                return;
            }
            Err(e) => {
                warnings.push(format!("cannot read modification time of {}: {e}", path.display()));
                return;
            }
        };
        let Some(max_days) = self.config.max_cache_age_days else {
            return;
        };
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age > Duration::from_secs(max_days * SECS_PER_DAY) {
            warnings.push(format!(
                "source file {} is stale: {} days old (max {max_days})",
                path.display(),
                age.as_secs() / SECS_PER_DAY
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(day: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::days(day)
    }

    fn clean(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let c = 100.0 + i as f64;
                Bar::new(ts(i as i64), c, c + 1.0, c - 1.0, c).with_volume(1_000.0)
            })
            .collect()
    }

    #[test]
    fn clean_data_passes() {
        let report = DataValidator::default().validate(&BarTable::new(clean(20)), None);
        assert!(report.passed, "{:?}", report.errors);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        assert_eq!(report.fingerprint.len(), 16);
    }

    #[test]
    fn too_few_rows_fails() {
        let report = DataValidator::default().validate(&BarTable::new(clean(1)), None);
        assert!(!report.passed);
        assert!(report.errors[0].contains("rows"));
    }

    #[test]
    fn non_monotonic_index_fails() {
        let mut bars = clean(5);
        bars.swap(1, 3);
        let report = DataValidator::default().validate(&BarTable::new(bars), None);
        assert!(!report.passed);
        assert!(report.errors.iter().any(|e| e.contains("monotonic")));
    }

    #[test]
    fn inverted_high_low_fails() {
        let mut bars = clean(5);
        bars[2].high = bars[2].low - 1.0;
        let report = DataValidator::default().validate(&BarTable::new(bars), None);
        assert!(report.errors.iter().any(|e| e.contains("high < low")));
    }

    #[test]
    fn negative_prices_fail() {
        let mut bars = clean(5);
        bars[2].low = -1.0;
        let report = DataValidator::default().validate(&BarTable::new(bars), None);
        assert!(report.errors.iter().any(|e| e.contains("negative")));
    }

    #[test]
    fn open_outside_range_only_warns() {
        let mut bars = clean(5);
        bars[3].open = bars[3].high + 0.5;
        let report = DataValidator::default().validate(&BarTable::new(bars), None);
        assert!(report.passed, "{:?}", report.errors);
        assert_eq!(report.warnings, vec!["1 rows with open/close outside [low, high]"]);
    }

    #[test]
    fn few_nans_warn_many_nans_fail() {
        let mut bars = clean(100);
        bars[10].close = f64::NAN;
        let report = DataValidator::default().validate(&BarTable::new(bars.clone()), None);
        assert!(report.passed);
        assert!(report.warnings.iter().any(|w| w.starts_with("close")));

        for bar in bars.iter_mut().take(20) {
            bar.close = f64::NAN;
        }
        let report = DataValidator::default().validate(&BarTable::new(bars), None);
        assert!(!report.passed);
        assert!(report.errors.iter().any(|e| e.starts_with("close")));
    }

    #[test]
    fn missing_volume_is_only_a_warning() {
        let bars: Vec<Bar> = clean(5)
            .into_iter()
            .map(|b| Bar { volume: None, ..b })
            .collect();
        let report = DataValidator::default().validate(&BarTable::new(bars), None);
        assert!(report.passed);
        assert!(report.warnings.iter().any(|w| w.contains("volume")));
    }

    #[test]
    fn missing_source_file_fails() {
        let report = DataValidator::default().validate(
            &BarTable::new(clean(5)),
            Some(Path::new("/definitely/not/here.csv")),
        );
        assert!(report.errors.iter().any(|e| e.contains("does not exist")));
    }

    #[test]
    fn fresh_source_file_is_not_stale() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let validator = DataValidator::new(ValidationConfig {
            max_cache_age_days: Some(1),
            ..ValidationConfig::default()
        });
        let report = validator.validate(&BarTable::new(clean(5)), Some(file.path()));
        assert!(report.passed);
        assert!(!report.warnings.iter().any(|w| w.contains("stale")));
    }
}
