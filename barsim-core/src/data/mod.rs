//! Bar source: loading and column resolution.
//!
//! The engine consumes a fully materialized [`BarTable`]. Tables come from a
//! polars frame, a CSV file, or a Parquet file; all three routes share the
//! same case-insensitive column resolution in [`schema`].

pub mod schema;
pub mod table;

pub use schema::{BarSchema, ColumnMap};
pub use table::BarTable;

use thiserror::Error;

/// Errors raised while building a bar table.
///
/// A missing OHLC or time column is a structural precondition failure and is
/// always fatal. Data-quality findings are not errors here; they belong to
/// the validator.
#[derive(Debug, Error)]
pub enum BarTableError {
    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("column {column} has unsupported type {dtype}")]
    UnsupportedType { column: String, dtype: String },

    #[error("row {row}: cannot parse time value '{value}'")]
    ParseTime { row: usize, value: String },

    #[error("row {row}: cannot parse {column} value '{value}'")]
    ParseValue {
        column: String,
        row: usize,
        value: String,
    },

    #[error("unsupported bar file format: {0}")]
    UnsupportedFormat(String),

    #[error("polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
