//! Core error types: parsing of size/duration config literals.

use thiserror::Error;

/// Errors from parsing human-written size or duration literals (component A).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid size literal: {0:?}")]
    InvalidSize(String),

    #[error("unknown size unit {unit:?} in {literal:?}")]
    UnknownSizeUnit { literal: String, unit: String },

    #[error("invalid duration literal: {0:?}")]
    InvalidDuration(String),

    #[error("unknown duration unit {unit:?} in {literal:?}")]
    UnknownDurationUnit { literal: String, unit: String },
}
