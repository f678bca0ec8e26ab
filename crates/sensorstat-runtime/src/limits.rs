//! Sizing constants for chunked ingestion and reporting.

/// Rows per chunk when the caller does not choose one.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

/// Read buffer for file-backed sources (64 KB).
pub const READ_BUFFER_BYTES: usize = 64 * 1024;

/// Number of groups kept by the top-by-mean and top-by-std rankings.
pub const REPORT_TOP_N: usize = 10;
