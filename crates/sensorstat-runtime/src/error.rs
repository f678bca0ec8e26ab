//! Runtime error types

use std::io;
use thiserror::Error;

use sensorstat_core::CoreError;

/// Failure while pulling chunks from a source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Input is missing required column '{0}'")]
    MissingColumn(String),

    #[error("Parse error at line {line}: {reason}")]
    Parse { line: u64, reason: String },

    #[error("Chunk size must be a positive row count, got {0}")]
    InvalidChunkSize(usize),
}

/// Failure while combining two aggregate tables
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("Incompatible grouping: expected [{expected}], found [{found}]")]
    IncompatibleGroupBy { expected: String, found: String },
}

/// Any failure that aborts a run
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error("Invalid grouping: {0}")]
    InvalidGroupBy(String),

    #[error("Metric alias '{alias}' maps to '{target}', which is itself renamed to '{next}'")]
    ChainedAlias {
        alias: String,
        target: String,
        next: String,
    },

    #[error("Outlier threshold must be a finite positive number of standard deviations, got {0}")]
    InvalidThreshold(f64),
}

pub type RunResult<T> = Result<T, RunError>;
