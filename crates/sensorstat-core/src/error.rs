//! Core error types

use thiserror::Error;

/// Errors raised while resolving columns or building filter conditions.
///
/// Every variant describes a malformed configuration rather than bad data,
/// so callers treat them as fatal.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    #[error("Invalid comparison operator '{0}' (expected one of ==, !=, <, <=, >, >=)")]
    InvalidOperator(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Predicate '{predicate}' cannot be applied to column '{column}'")]
    OperandMismatch { column: String, predicate: String },
}

pub type CoreResult<T> = Result<T, CoreError>;
