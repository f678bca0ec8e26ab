//! Per-chunk preparation shared by both passes: filter, then normalize.

use sensorstat_core::{CoreResult, FilterCondition, RecordBatch, Schema};

use crate::filter;
use crate::normalize::MetricNormalizer;

/// Filter conditions plus the metric alias table
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    conditions: Vec<FilterCondition>,
    normalizer: MetricNormalizer,
}

impl Pipeline {
    pub fn new(conditions: Vec<FilterCondition>, normalizer: MetricNormalizer) -> Self {
        Self {
            conditions,
            normalizer,
        }
    }

    pub fn conditions(&self) -> &[FilterCondition] {
        &self.conditions
    }

    pub fn normalizer(&self) -> &MetricNormalizer {
        &self.normalizer
    }

    /// Bind every condition against `schema` without looking at any rows.
    pub fn check(&self, schema: &Schema) -> CoreResult<()> {
        filter::bind_all(&self.conditions, schema).map(|_| ())
    }

    /// Filter `chunk` and rename its metrics.
    pub fn prepare(&self, chunk: RecordBatch) -> CoreResult<RecordBatch> {
        let filtered = filter::evaluate_owned(chunk, &self.conditions)?;
        Ok(self.normalizer.apply(filtered))
    }
}
