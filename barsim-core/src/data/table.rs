//! BarTable: the fully materialized, time-ordered bar source.

use super::schema::{BarSchema, REQUIRED_COLUMNS, TIME_COLUMNS, VOLUME_COLUMN};
use super::BarTableError;
use crate::domain::Bar;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Time formats accepted for string time columns, tried in order.
const TIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// An ordered sequence of bars plus the column names of the source it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct BarTable {
    bars: Vec<Bar>,
    columns: Vec<String>,
}

impl BarTable {
    /// Wrap bars that are already materialized.
    pub fn new(bars: Vec<Bar>) -> Self {
        let mut columns: Vec<String> = std::iter::once(TIME_COLUMNS[0])
            .chain(REQUIRED_COLUMNS)
            .map(str::to_string)
            .collect();
        if bars.iter().any(|b| b.volume.is_some()) {
            columns.push(VOLUME_COLUMN.to_string());
        }
        Self { bars, columns }
    }

    /// Build from a polars frame. Column names are matched case-insensitively.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self, BarTableError> {
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.as_str().to_string())
            .collect();
        let map = BarSchema::resolve(&names)?;
        let column = |idx: usize| df.column(names[idx].as_str());

        let times = read_times(column(map.time)?, &names[map.time])?;
        let opens = read_f64(column(map.open)?)?;
        let highs = read_f64(column(map.high)?)?;
        let lows = read_f64(column(map.low)?)?;
        let closes = read_f64(column(map.close)?)?;
        let volumes = match map.volume {
            Some(idx) => Some(read_f64(column(idx)?)?),
            None => None,
        };

        let bars = (0..df.height())
            .map(|i| Bar {
                timestamp: times[i],
                open: opens[i],
                high: highs[i],
                low: lows[i],
                close: closes[i],
                volume: volumes.as_ref().map(|v| v[i]),
            })
            .collect();

        Ok(Self {
            bars,
            columns: names,
        })
    }

    /// Build from CSV with a header row.
    ///
    /// Empty cells and `NaN` parse as NaN. Time cells accept RFC 3339,
    /// `YYYY-MM-DD[ HH:MM[:SS]]` and `YYYY-MM-DDTHH:MM:SS`.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, BarTableError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let map = BarSchema::resolve(&columns)?;

        let mut bars = Vec::new();
        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            let cell = |idx: usize| record.get(idx).unwrap_or("");
            let price = |idx: usize| parse_price(cell(idx), &columns[idx], row);

            bars.push(Bar {
                timestamp: parse_time(cell(map.time)).ok_or_else(|| BarTableError::ParseTime {
                    row,
                    value: cell(map.time).to_string(),
                })?,
                open: price(map.open)?,
                high: price(map.high)?,
                low: price(map.low)?,
                close: price(map.close)?,
                volume: map.volume.map(price).transpose()?,
            });
        }

        Ok(Self { bars, columns })
    }

    pub fn from_csv_path(path: &Path) -> Result<Self, BarTableError> {
        Self::from_csv_reader(File::open(path)?)
    }

    pub fn from_parquet_path(path: &Path) -> Result<Self, BarTableError> {
        let df = ParquetReader::new(File::open(path)?).finish()?;
        Self::from_dataframe(&df)
    }

    /// Load by file extension: `.parquet` or `.csv`.
    pub fn load(path: &Path) -> Result<Self, BarTableError> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("parquet") => Self::from_parquet_path(path),
            Some("csv") | Some("txt") => Self::from_csv_path(path),
            _ => Err(BarTableError::UnsupportedFormat(path.display().to_string())),
        }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bar> {
        self.bars.iter()
    }

    pub fn has_volume(&self) -> bool {
        self.columns
            .iter()
            .any(|c| c.eq_ignore_ascii_case(VOLUME_COLUMN))
    }

    pub fn first_time(&self) -> Option<NaiveDateTime> {
        self.bars.first().map(|b| b.timestamp)
    }

    pub fn last_time(&self) -> Option<NaiveDateTime> {
        self.bars.last().map(|b| b.timestamp)
    }

    /// Back to a polars frame with canonical column names.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let times: Vec<i64> = self
            .bars
            .iter()
            .map(|b| b.timestamp.and_utc().timestamp_millis())
            .collect();
        let mut columns = vec![
            Column::new("timestamp".into(), times)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
            Column::new("open".into(), self.bars.iter().map(|b| b.open).collect::<Vec<_>>()),
            Column::new("high".into(), self.bars.iter().map(|b| b.high).collect::<Vec<_>>()),
            Column::new("low".into(), self.bars.iter().map(|b| b.low).collect::<Vec<_>>()),
            Column::new("close".into(), self.bars.iter().map(|b| b.close).collect::<Vec<_>>()),
        ];
        if self.has_volume() {
            let volumes: Vec<Option<f64>> = self.bars.iter().map(|b| b.volume).collect();
            columns.push(Column::new("volume".into(), volumes));
        }
        DataFrame::new(columns)
    }
}

impl<'a> IntoIterator for &'a BarTable {
    type Item = &'a Bar;
    type IntoIter = std::slice::Iter<'a, Bar>;

    fn into_iter(self) -> Self::IntoIter {
        self.bars.iter()
    }
}

/// Read a numeric column as f64, nulls becoming NaN.
fn read_f64(col: &Column) -> Result<Vec<f64>, BarTableError> {
    let casted = col.cast(&DataType::Float64)?;
    let ca = casted.f64()?;
    Ok((0..ca.len()).map(|i| ca.get(i).unwrap_or(f64::NAN)).collect())
}

fn read_times(col: &Column, name: &str) -> Result<Vec<NaiveDateTime>, BarTableError> {
    let null = |row: usize| BarTableError::ParseTime {
        row,
        value: "null".into(),
    };

    match col.dtype() {
        DataType::Date => {
            let ca = col.date()?;
            (0..ca.len())
                .map(|i| ca.get(i).and_then(days_to_datetime).ok_or_else(|| null(i)))
                .collect()
        }
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            let ca = col.datetime()?;
            (0..ca.len())
                .map(|i| {
                    ca.get(i)
                        .and_then(|v| epoch_to_datetime(v, unit))
                        .ok_or_else(|| null(i))
                })
                .collect()
        }
        DataType::String => {
            let ca = col.str()?;
            (0..ca.len())
                .map(|i| {
                    let raw = ca.get(i).unwrap_or("");
                    parse_time(raw).ok_or_else(|| BarTableError::ParseTime {
                        row: i,
                        value: raw.to_string(),
                    })
                })
                .collect()
        }
        other => Err(BarTableError::UnsupportedType {
            column: name.to_string(),
            dtype: format!("{other:?}"),
        }),
    }
}

fn days_to_datetime(days: i32) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    epoch
        .checked_add_signed(chrono::Duration::days(days as i64))?
        .and_hms_opt(0, 0, 0)
}

fn epoch_to_datetime(value: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    let dt = match unit {
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(value)?,
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(value)?,
        TimeUnit::Nanoseconds => DateTime::from_timestamp_nanos(value),
    };
    Some(dt.naive_utc())
}

fn parse_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn parse_price(raw: &str, column: &str, row: usize) -> Result<f64, BarTableError> {
    if raw.is_empty() {
        return Ok(f64::NAN);
    }
    raw.parse::<f64>().map_err(|_| BarTableError::ParseValue {
        column: column.to_string(),
        row,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
Date,Open,High,Low,Close,Volume
2024-01-02,100,105,98,103,1000
2024-01-03,103,106,101,,1200
2024-01-04,104,107,102,106,900
";

    #[test]
    fn csv_loads_case_insensitive_headers() {
        let table = BarTable::from_csv_reader(CSV.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);
        assert!(table.has_volume());
        let first = &table.bars()[0];
        assert_eq!(first.open, 100.0);
        assert_eq!(first.volume, Some(1000.0));
        assert_eq!(
            first.timestamp,
            NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn csv_empty_cell_is_nan() {
        let table = BarTable::from_csv_reader(CSV.as_bytes()).unwrap();
        assert!(table.bars()[1].close.is_nan());
    }

    #[test]
    fn csv_missing_low_is_structural_error() {
        let csv = "date,open,high,close\n2024-01-02,1,2,1.5\n";
        let err = BarTable::from_csv_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, BarTableError::MissingColumn(ref c) if c == "low"));
    }

    #[test]
    fn csv_bad_number_reports_cell() {
        let csv = "date,open,high,low,close\n2024-01-02,1,2,x,1.5\n";
        let err = BarTable::from_csv_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, BarTableError::ParseValue { row: 0, .. }));
    }

    #[test]
    fn parses_rfc3339_and_intraday_times() {
        assert!(parse_time("2024-01-02T14:30:00Z").is_some());
        assert!(parse_time("2024-01-02 14:30:00").is_some());
        assert!(parse_time("2024-01-02 14:30").is_some());
        assert!(parse_time("not a date").is_none());
    }

    #[test]
    fn dataframe_with_upper_case_columns() {
        let df = df!(
            "Date" => &["2024-01-02", "2024-01-03"],
            "OPEN" => &[100.0, 101.0],
            "High" => &[102.0, 103.0],
            "Low" => &[99.0, 100.0],
            "Close" => &[101.0, 102.0],
        )
        .unwrap();

        let table = BarTable::from_dataframe(&df).unwrap();
        assert_eq!(table.len(), 2);
        assert!(!table.has_volume());
        assert_eq!(table.bars()[1].close, 102.0);
    }

    #[test]
    fn dataframe_integer_prices_are_cast() {
        let df = df!(
            "timestamp" => &["2024-01-02"],
            "open" => &[100i64],
            "high" => &[102i64],
            "low" => &[99i64],
            "close" => &[101i64],
        )
        .unwrap();

        let table = BarTable::from_dataframe(&df).unwrap();
        assert_eq!(table.bars()[0].high, 102.0);
    }

    #[test]
    fn dataframe_missing_open_is_structural_error() {
        let df = df!(
            "date" => &["2024-01-02"],
            "high" => &[102.0],
            "low" => &[99.0],
            "close" => &[101.0],
        )
        .unwrap();

        let err = BarTable::from_dataframe(&df).unwrap_err();
        assert!(matches!(err, BarTableError::MissingColumn(ref c) if c == "open"));
    }

    #[test]
    fn dataframe_roundtrip_keeps_prices() {
        let table = BarTable::from_csv_reader(CSV.as_bytes()).unwrap();
        let df = table.to_dataframe().unwrap();
        let back = BarTable::from_dataframe(&df).unwrap();
        assert_eq!(back.len(), table.len());
        assert_eq!(back.bars()[2].close, 106.0);
        assert_eq!(back.bars()[0].timestamp, table.bars()[0].timestamp);
    }
}
