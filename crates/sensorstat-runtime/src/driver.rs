//! Streaming aggregation driver
//!
//! Pulls chunks one at a time, runs each through the [`Pipeline`], reduces it
//! to per-group partials and folds those into a single running table. Only
//! one chunk is in memory at a time; the running table grows with the number
//! of groups, not with the number of rows.

use sensorstat_core::Schema;
use tracing::{debug, info, warn};

use crate::aggregation::{aggregate, AggregateTable, GroupBy};
use crate::error::RunResult;
use crate::outlier::OutlierScanner;
use crate::pipeline::Pipeline;
use crate::source::ChunkSource;

/// Counters for one aggregation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub chunks: usize,
    pub rows_read: usize,
    pub rows_matched: usize,
    pub groups: usize,
}

/// First pass: chunked filtering and grouped statistics
#[derive(Debug, Clone, Default)]
pub struct StreamingAggregator {
    pipeline: Pipeline,
    group_by: GroupBy,
}

impl StreamingAggregator {
    pub fn new(pipeline: Pipeline, group_by: GroupBy) -> Self {
        Self { pipeline, group_by }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn group_by(&self) -> &GroupBy {
        &self.group_by
    }

    /// Aggregate every chunk of `source`; the result is sorted by group key.
    ///
    /// An input where nothing survives filtering yields an empty table. Filter
    /// conditions are checked against the reading schema before the source is
    /// opened, so an unknown column fails even on an input with no rows.
    pub fn run<S: ChunkSource>(&self, source: &S) -> RunResult<AggregateTable> {
        self.run_with_stats(source).map(|(table, _)| table)
    }

    pub fn run_with_stats<S: ChunkSource>(
        &self,
        source: &S,
    ) -> RunResult<(AggregateTable, RunStats)> {
        self.pipeline.check(&Schema::sensor())?;

        let mut running = AggregateTable::new(self.group_by.clone());
        let mut stats = RunStats::default();

        for chunk in source.open()? {
            let chunk = chunk?;
            stats.chunks += 1;
            stats.rows_read += chunk.len();

            let prepared = self.pipeline.prepare(chunk)?;
            if prepared.is_empty() {
                debug!(chunk = stats.chunks, "chunk has no matching rows");
                continue;
            }
            stats.rows_matched += prepared.len();

            let partial = aggregate(&prepared, &self.group_by)?;
            debug!(
                chunk = stats.chunks,
                rows = prepared.len(),
                groups = partial.len(),
                "chunk aggregated"
            );
            running.merge_from(partial)?;
        }

        running.sort_by_key();
        stats.groups = running.len();

        if running.is_empty() {
            warn!(
                chunks = stats.chunks,
                rows_read = stats.rows_read,
                "no data: no rows matched the filters"
            );
        } else {
            info!(
                chunks = stats.chunks,
                rows_read = stats.rows_read,
                rows_matched = stats.rows_matched,
                groups = stats.groups,
                "aggregation complete"
            );
        }

        Ok((running, stats))
    }

    /// Outlier scanner sharing this driver's filters and metric aliases.
    pub fn outlier_scanner(&self) -> OutlierScanner<'_> {
        OutlierScanner::new(&self.pipeline)
    }
}
