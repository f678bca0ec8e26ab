//! # Sensorstat Core
//!
//! Foundational types for the sensorstat grouped-statistics engine.
//!
//! - **Records**: [`Record`] is one time-stamped reading (site, device,
//!   metric, unit, value); readings travel in [`RecordBatch`]es that carry a
//!   [`Schema`].
//! - **Filters**: [`FilterCondition`] pairs a column name with a typed
//!   [`Predicate`]. Conditions are bound to a schema before evaluation, which
//!   is where unknown columns are reported.
//! - **Values**: [`Value`] is the cell type read out of a record by column.
//! - **Time**: parsing and formatting of the source timestamp layout.
//!
//! ## Quick Start
//!
//! ```rust
//! use sensorstat_core::{FilterCondition, Record, RecordBatch, Schema};
//! use sensorstat_core::time::parse_timestamp;
//!
//! let ts = parse_timestamp("2025-01-05 12:00:00 +0000 UTC").unwrap();
//! let batch = RecordBatch::from_records(vec![
//!     Record::new(ts, "site_0", "device_000", "temp", "C", 21.5),
//! ]);
//!
//! let cond = FilterCondition::equals("site", "site_0");
//! let bound = cond.bind(batch.schema()).unwrap();
//! assert!(bound.matches(&batch.rows()[0]));
//! ```

pub mod error;
pub mod filter;
pub mod record;
pub mod time;
pub mod value;

pub use error::{CoreError, CoreResult};
pub use filter::{BoundCondition, CompareOp, FilterCondition, Predicate};
pub use record::{Column, Record, RecordBatch, Schema};
pub use value::Value;
