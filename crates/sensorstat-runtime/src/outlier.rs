//! Second-pass outlier detection
//!
//! The scanner re-reads the source from the first row, runs every chunk
//! through the same [`Pipeline`] as the aggregation pass and compares each
//! surviving reading with its group's final statistics. Readings whose group
//! is missing from the table are dropped without error.
//!
//! The scan is lazy: nothing past the current chunk is read until the caller
//! asks for it, so stopping early skips the rest of the file.

use sensorstat_core::{Record, RecordBatch};
use std::vec;

use crate::aggregation::{AggregateTable, GroupKey, PartialAggregate};
use crate::error::{RunError, RunResult, SourceError};
use crate::pipeline::Pipeline;
use crate::source::ChunkSource;

/// Readings further than this many standard deviations from their group mean are outliers.
pub const DEFAULT_OUTLIER_SIGMA: f64 = 3.0;

/// True if `value` lies strictly more than `sigma` standard deviations from the group mean.
///
/// Unlike the bare `|v - mean| > sigma * std` test, a group with zero spread
/// never flags anything, so rounding noise in a constant or single-row group
/// is not reported. A NaN value is never an outlier either.
pub fn is_outlier(value: f64, stats: &PartialAggregate, sigma: f64) -> bool {
    let std = stats.std();
    if std <= 0.0 || value.is_nan() {
        return false;
    }
    (value - stats.mean).abs() > sigma * std
}

/// A reading flagged by the scan together with its group's final statistics
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierRecord {
    pub record: Record,
    pub group: GroupKey,
    pub stats: PartialAggregate,
}

impl OutlierRecord {
    /// Signed distance from the group mean
    pub fn deviation(&self) -> f64 {
        self.record.value - self.stats.mean
    }

    /// Distance from the group mean in standard deviations
    pub fn z_score(&self) -> f64 {
        let std = self.stats.std();
        if std > 0.0 {
            self.deviation() / std
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OutlierScanner<'p> {
    pipeline: &'p Pipeline,
    sigma: f64,
}

impl<'p> OutlierScanner<'p> {
    pub fn new(pipeline: &'p Pipeline) -> Self {
        Self {
            pipeline,
            sigma: DEFAULT_OUTLIER_SIGMA,
        }
    }

    /// Override the threshold; it must be finite and positive.
    pub fn with_sigma(mut self, sigma: f64) -> RunResult<Self> {
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(RunError::InvalidThreshold(sigma));
        }
        self.sigma = sigma;
        Ok(self)
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Start a fresh pass over `source` against the final `table`.
    ///
    /// An empty table short-circuits to [`Scan::NoData`] without opening the source.
    pub fn scan<'a, S>(
        &self,
        source: &S,
        table: &'a AggregateTable,
    ) -> RunResult<Scan<'a, S::Chunks>>
    where
        S: ChunkSource,
        'p: 'a,
    {
        if table.is_empty() {
            return Ok(Scan::NoData);
        }
        let chunks = source.open()?;
        Ok(Scan::Rows(OutlierIter {
            chunks,
            pipeline: self.pipeline,
            table,
            sigma: self.sigma,
            pending: Vec::new().into_iter(),
            done: false,
        }))
    }
}

/// Outcome of starting a scan
pub enum Scan<'a, C> {
    /// The final table has no groups; there is nothing to compare against.
    NoData,
    Rows(OutlierIter<'a, C>),
}

impl<'a, C> Scan<'a, C>
where
    C: Iterator<Item = Result<RecordBatch, SourceError>>,
{
    pub fn is_no_data(&self) -> bool {
        matches!(self, Scan::NoData)
    }

    /// Drain the scan; `NoData` becomes an empty list.
    pub fn collect_all(self) -> RunResult<Vec<OutlierRecord>> {
        match self {
            Scan::NoData => Ok(Vec::new()),
            Scan::Rows(rows) => rows.collect(),
        }
    }
}

/// Lazy stream of outliers, one source chunk at a time
pub struct OutlierIter<'a, C> {
    chunks: C,
    pipeline: &'a Pipeline,
    table: &'a AggregateTable,
    sigma: f64,
    pending: vec::IntoIter<Record>,
    done: bool,
}

impl<'a, C> OutlierIter<'a, C> {
    fn check(&self, record: Record) -> Option<OutlierRecord> {
        let group = self.table.group_by().key_for(&record);
        let stats = *self.table.get(&group)?;
        is_outlier(record.value, &stats, self.sigma).then_some(OutlierRecord {
            record,
            group,
            stats,
        })
    }
}

impl<'a, C> Iterator for OutlierIter<'a, C>
where
    C: Iterator<Item = Result<RecordBatch, SourceError>>,
{
    type Item = RunResult<OutlierRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            while let Some(record) = self.pending.next() {
                if let Some(hit) = self.check(record) {
                    return Some(Ok(hit));
                }
            }
            let prepared = match self.chunks.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(e)) => Err(RunError::from(e)),
                Some(Ok(chunk)) => self.pipeline.prepare(chunk).map_err(RunError::from),
            };
            match prepared {
                Ok(batch) => self.pending = batch.into_rows().into_iter(),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
