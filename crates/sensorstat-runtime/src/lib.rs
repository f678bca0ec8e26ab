//! Sensorstat Runtime - Streaming grouped statistics for sensor readings
//!
//! This crate provides the engine behind the `sensorstat` command:
//!
//! - [`filter`]: evaluates filter conditions against a chunk
//! - [`normalize`]: renames metric aliases before grouping
//! - [`aggregation`]: per-chunk sufficient statistics and their merge
//! - [`driver`]: the chunked first pass producing the final table
//! - [`outlier`]: the lazy second pass flagging far-off readings
//! - [`source`] and [`csv_source`]: rewindable chunk sources
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use sensorstat_core::Record;
//! use sensorstat_runtime::{ChunkSize, MemorySource, StreamingAggregator};
//!
//! let now = Utc::now();
//! let rows = vec![
//!     Record::new(now, "site_0", "device_000", "temp", "C", 20.0),
//!     Record::new(now, "site_0", "device_000", "temp", "C", 22.0),
//! ];
//! let source = MemorySource::new(rows, ChunkSize::new(1).unwrap());
//!
//! let table = StreamingAggregator::default().run(&source).unwrap();
//! let (key, stats) = table.iter().next().unwrap();
//! assert_eq!(key.to_string(), "site_0/device_000/temperature");
//! assert_eq!(stats.count, 2);
//! assert_eq!(stats.mean, 21.0);
//! ```

pub mod aggregation;
pub mod csv_source;
pub mod driver;
pub mod error;
pub mod filter;
pub mod limits;
pub mod normalize;
pub mod outlier;
pub mod pipeline;
pub mod source;

pub use aggregation::{aggregate, merge, AggregateTable, GroupBy, GroupKey, PartialAggregate};
pub use csv_source::{CsvChunkReader, CsvSource};
pub use driver::{RunStats, StreamingAggregator};
pub use error::{MergeError, RunError, RunResult, SourceError};
pub use normalize::MetricNormalizer;
pub use outlier::{OutlierIter, OutlierRecord, OutlierScanner, Scan, DEFAULT_OUTLIER_SIGMA};
pub use pipeline::Pipeline;
pub use source::{ChunkSize, ChunkSource, MemorySource};
