//! Data-validation errors raised while loading or scoring order lines

use thiserror::Error;

/// A defect in the supplied order data. Fatal for the current invocation.
///
/// `row` is the line in the source CSV file (the header is line 1), or the
/// index of the line for in-memory order lines.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    /// A table is missing a column the join or the scorer needs
    #[error("table `{table}` is missing required column `{column}`")]
    MissingColumn { table: String, column: String },

    /// A required field is null or blank
    #[error("null value in required column `{column}` of `{table}` at row {row}")]
    NullField {
        table: String,
        column: &'static str,
        row: usize,
    },

    /// A timestamp could not be parsed
    #[error("unparsable timestamp in column `{column}` of `{table}` at row {row}: {value:?}")]
    InvalidTimestamp {
        table: String,
        column: &'static str,
        row: usize,
        value: String,
    },

    /// A value is present but unusable (empty identifier, non-finite price, ...)
    #[error("invalid value in column `{column}` of `{table}` at row {row}: {reason}")]
    InvalidValue {
        table: String,
        column: &'static str,
        row: usize,
        reason: String,
    },

    /// A segment label that is not one of the five known labels
    #[error("unknown customer segment {0:?} (expected Top, High value, Medium value, Low value or Lost)")]
    UnknownSegment(String),
}
