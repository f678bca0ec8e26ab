//! Filter predicate evaluation over record batches
//!
//! All conditions are bound to the batch schema up front, so a condition on
//! an unknown column fails even when the batch has no rows. Surviving rows
//! must satisfy every condition (logical AND).

use sensorstat_core::{BoundCondition, CoreResult, FilterCondition, RecordBatch, Schema};

/// Bind every condition against `schema`.
pub fn bind_all<'c>(
    conditions: &'c [FilterCondition],
    schema: &Schema,
) -> CoreResult<Vec<BoundCondition<'c>>> {
    conditions.iter().map(|c| c.bind(schema)).collect()
}

/// Return the rows of `batch` matching all `conditions` as a new batch.
///
/// An empty condition list returns the batch unchanged.
pub fn evaluate(batch: &RecordBatch, conditions: &[FilterCondition]) -> CoreResult<RecordBatch> {
    if conditions.is_empty() {
        return Ok(batch.clone());
    }
    let bound = bind_all(conditions, batch.schema())?;
    Ok(batch.filter_rows(|row| bound.iter().all(|c| c.matches(row))))
}

/// Owned variant of [`evaluate`] that filters in place instead of copying rows.
pub fn evaluate_owned(
    batch: RecordBatch,
    conditions: &[FilterCondition],
) -> CoreResult<RecordBatch> {
    if conditions.is_empty() {
        return Ok(batch);
    }
    let schema = batch.schema_ref();
    let bound = bind_all(conditions, &schema)?;
    let mut rows = batch.into_rows();
    rows.retain(|row| bound.iter().all(|c| c.matches(row)));
    Ok(RecordBatch::new(schema, rows))
}
