//! Column resolution for bar tables.
//!
//! Bar sources name their columns however they like (`Close`, `CLOSE`,
//! `close`). Lookup is case-insensitive. The OHLC columns and a time index
//! are structural preconditions; `volume` is optional.

use super::BarTableError;

/// Required price columns, canonical lower-case names.
pub const REQUIRED_COLUMNS: [&str; 4] = ["open", "high", "low", "close"];

/// Accepted names for the time index column, in priority order.
pub const TIME_COLUMNS: [&str; 4] = ["timestamp", "datetime", "date", "time"];

pub const VOLUME_COLUMN: &str = "volume";

/// Positions of the bar fields within a source's column list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub time: usize,
    pub open: usize,
    pub high: usize,
    pub low: usize,
    pub close: usize,
    pub volume: Option<usize>,
}

/// Expected layout of a bar source.
pub struct BarSchema;

impl BarSchema {
    /// Resolve column positions from a header list.
    ///
    /// Reports the first missing required column (OHLC checked before the
    /// time index).
    pub fn resolve<S: AsRef<str>>(names: &[S]) -> Result<ColumnMap, BarTableError> {
        let find = |wanted: &str| {
            names
                .iter()
                .position(|n| n.as_ref().trim().eq_ignore_ascii_case(wanted))
        };

        let mut price = [0usize; 4];
        for (slot, wanted) in price.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = find(wanted).ok_or_else(|| BarTableError::MissingColumn(wanted.to_string()))?;
        }

        let time = TIME_COLUMNS
            .iter()
            .find_map(|c| find(c))
            .ok_or_else(|| BarTableError::MissingColumn(TIME_COLUMNS.join("|")))?;

        Ok(ColumnMap {
            time,
            open: price[0],
            high: price[1],
            low: price[2],
            close: price[3],
            volume: find(VOLUME_COLUMN),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_mixed_case_headers() {
        let headers = ["Date", "Open", "HIGH", "low", "Close", "Volume"];
        let map = BarSchema::resolve(&headers).unwrap();
        assert_eq!(
            map,
            ColumnMap {
                time: 0,
                open: 1,
                high: 2,
                low: 3,
                close: 4,
                volume: Some(5),
            }
        );
    }

    #[test]
    fn volume_is_optional() {
        let headers = ["timestamp", "open", "high", "low", "close"];
        let map = BarSchema::resolve(&headers).unwrap();
        assert_eq!(map.volume, None);
    }

    #[test]
    fn prefers_timestamp_over_date() {
        let headers = ["date", "timestamp", "open", "high", "low", "close"];
        let map = BarSchema::resolve(&headers).unwrap();
        assert_eq!(map.time, 1);
    }

    #[test]
    fn rejects_missing_close() {
        let headers = ["date", "open", "high", "low"];
        let err = BarSchema::resolve(&headers).unwrap_err();
        assert!(matches!(err, BarTableError::MissingColumn(ref c) if c == "close"));
    }

    #[test]
    fn rejects_missing_time_index() {
        let headers = ["open", "high", "low", "close"];
        let err = BarSchema::resolve(&headers).unwrap_err();
        assert!(matches!(err, BarTableError::MissingColumn(_)));
    }
}
