//! Grouped sufficient statistics and their merge.
//!
//! Each chunk of readings is reduced to one [`PartialAggregate`] per group.
//! Partials carry `count`, `mean`, `min`, `max` and the raw sum of squares,
//! which is enough to rebuild the sample standard deviation after any number
//! of merges. Merging a mean and a standard deviation on their own would not
//! be: the sum of squares has to travel with them.
//!
//! | Statistic | Merge rule |
//! |-----------|------------|
//! | `count` | `count_a + count_b` |
//! | `mean` | `(count_a * mean_a + count_b * mean_b) / count` |
//! | `min` / `max` | extremum of both sides |
//! | `sum_of_squares` | `sum_of_squares_a + sum_of_squares_b` |
//! | `std` | `sqrt(max(ssq - count * mean^2, 0) / max(count - 1, 1))` |
//!
//! The merge is associative and commutative, so the final table does not
//! depend on where chunk boundaries fell or in which order chunks arrived.
//!
//! # Example
//!
//! ```rust
//! use sensorstat_runtime::aggregation::PartialAggregate;
//!
//! let left = PartialAggregate::from_values([1.0, 2.0, 3.0]);
//! let right = PartialAggregate::from_values([4.0, 5.0, 6.0]);
//! let merged = left.merge(&right);
//!
//! let direct = PartialAggregate::from_values([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(merged.count, 6);
//! assert!((merged.mean - 3.5).abs() < 1e-12);
//! assert!((merged.std() - direct.std()).abs() < 1e-12);
//! ```

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use sensorstat_core::{Column, CoreError, CoreResult, Record, RecordBatch, Schema};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{MergeError, RunError, RunResult};

/// Type alias for IndexMap with FxBuildHasher, used for per-group state.
pub type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

// =============================================================================
// Grouping
// =============================================================================

/// Ordered list of columns that identify a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupBy {
    columns: Vec<Column>,
}

impl Default for GroupBy {
    fn default() -> Self {
        Self {
            columns: vec![Column::Site, Column::Device, Column::Metric],
        }
    }
}

impl GroupBy {
    pub fn new(columns: Vec<Column>) -> RunResult<Self> {
        if columns.is_empty() {
            return Err(RunError::InvalidGroupBy(
                "at least one grouping column is required".to_string(),
            ));
        }
        if columns.contains(&Column::Value) {
            return Err(RunError::InvalidGroupBy(
                "cannot group by the aggregated 'value' column".to_string(),
            ));
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].contains(column) {
                return Err(RunError::InvalidGroupBy(format!(
                    "column '{}' listed twice",
                    column
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Resolve column names; unknown names fail with `UnknownColumn`.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> RunResult<Self> {
        let columns = names
            .iter()
            .map(|n| {
                let n = n.as_ref().trim();
                Column::from_name(n).ok_or_else(|| CoreError::UnknownColumn(n.to_string()))
            })
            .collect::<CoreResult<Vec<_>>>()?;
        Self::new(columns)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    /// Fail if a grouping column is not part of `schema`.
    pub fn check_schema(&self, schema: &Schema) -> CoreResult<()> {
        for column in &self.columns {
            schema.resolve(column.name())?;
        }
        Ok(())
    }

    pub fn key_for(&self, record: &Record) -> GroupKey {
        GroupKey(
            self.columns
                .iter()
                .map(|c| match record.str_field(*c) {
                    Some(s) => s.to_string(),
                    None => record.get(*c).to_string(),
                })
                .collect(),
        )
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names().join(", "))
    }
}

/// Plain string values of the grouping columns, in `GroupBy` order.
///
/// Keys compare lexicographically, column by column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(pub Vec<String>);

impl GroupKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GroupKey(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

// =============================================================================
// Partial aggregate
// =============================================================================

/// Sufficient statistics of one group
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartialAggregate {
    pub count: u64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Sum of squared values (not of squared deviations)
    pub sum_of_squares: f64,
}

impl Default for PartialAggregate {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialAggregate {
    /// The merge identity: no observations.
    pub fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum_of_squares: 0.0,
        }
    }

    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let mut agg = Self::new();
        for v in values {
            agg.observe(v);
        }
        agg
    }

    /// Add one observation. NaN is not an observation and is skipped.
    pub fn observe(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.count += 1;
        self.mean += (value - self.mean) / self.count as f64;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum_of_squares += value * value;
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Sample variance (n - 1 denominator); 0 for fewer than two observations.
    pub fn variance(&self) -> f64 {
        let n = self.count as f64;
        let radicand = (self.sum_of_squares - n * self.mean * self.mean).max(0.0);
        radicand / (n - 1.0).max(1.0)
    }

    /// Sample standard deviation (ddof = 1); 0 for fewer than two observations.
    pub fn std(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Combine two partials of the same group.
    pub fn merge(&self, other: &Self) -> Self {
        if other.count == 0 {
            return *self;
        }
        if self.count == 0 {
            return *other;
        }

        let count = self.count + other.count;
        let mean =
            (self.count as f64 * self.mean + other.count as f64 * other.mean) / count as f64;

        Self {
            count,
            mean,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            sum_of_squares: self.sum_of_squares + other.sum_of_squares,
        }
    }
}

// =============================================================================
// Aggregate table
// =============================================================================

/// Per-group statistics for one grouping
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateTable {
    group_by: GroupBy,
    groups: FxIndexMap<GroupKey, PartialAggregate>,
}

impl AggregateTable {
    pub fn new(group_by: GroupBy) -> Self {
        Self {
            group_by,
            groups: IndexMap::with_hasher(FxBuildHasher),
        }
    }

    pub fn group_by(&self) -> &GroupBy {
        &self.group_by
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, key: &GroupKey) -> Option<&PartialAggregate> {
        self.groups.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &PartialAggregate)> {
        self.groups.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &GroupKey> {
        self.groups.keys()
    }

    /// Merge `partial` into the entry for `key`.
    pub fn insert(&mut self, key: GroupKey, partial: PartialAggregate) {
        if partial.is_empty() {
            return;
        }
        self.groups
            .entry(key)
            .and_modify(|existing| *existing = existing.merge(&partial))
            .or_insert(partial);
    }

    fn check_compatible(&self, other: &AggregateTable) -> Result<(), MergeError> {
        if self.group_by != other.group_by {
            return Err(MergeError::IncompatibleGroupBy {
                expected: self.group_by.to_string(),
                found: other.group_by.to_string(),
            });
        }
        Ok(())
    }

    /// Fold `other` into this table.
    pub fn merge_from(&mut self, other: AggregateTable) -> Result<(), MergeError> {
        self.check_compatible(&other)?;
        for (key, partial) in other.groups {
            self.insert(key, partial);
        }
        Ok(())
    }

    /// Order groups ascending by key.
    pub fn sort_by_key(&mut self) {
        self.groups.sort_keys();
    }

    fn top_by<F>(&self, n: usize, stat: F) -> Vec<(&GroupKey, &PartialAggregate)>
    where
        F: Fn(&PartialAggregate) -> f64,
    {
        let mut ranked: Vec<(&GroupKey, &PartialAggregate)> = self.groups.iter().collect();
        ranked.sort_by(|&(ka, a), &(kb, b)| stat(b).total_cmp(&stat(a)).then_with(|| ka.cmp(kb)));
        ranked.truncate(n);
        ranked
    }

    /// The `n` groups with the highest mean, highest first.
    pub fn top_by_mean(&self, n: usize) -> Vec<(&GroupKey, &PartialAggregate)> {
        self.top_by(n, |a| a.mean)
    }

    /// The `n` groups with the highest standard deviation, highest first.
    pub fn top_by_std(&self, n: usize) -> Vec<(&GroupKey, &PartialAggregate)> {
        self.top_by(n, |a| a.std())
    }
}

/// Reduce one batch to per-group partials.
///
/// Groups with no (non-NaN) observations do not appear in the result.
pub fn aggregate(batch: &RecordBatch, group_by: &GroupBy) -> CoreResult<AggregateTable> {
    group_by.check_schema(batch.schema())?;
    batch.schema().resolve(Column::Value.name())?;

    let mut groups: FxIndexMap<GroupKey, PartialAggregate> = IndexMap::with_hasher(FxBuildHasher);
    for record in batch {
        groups
            .entry(group_by.key_for(record))
            .or_default()
            .observe(record.value);
    }
    groups.retain(|_, partial| !partial.is_empty());

    Ok(AggregateTable {
        group_by: group_by.clone(),
        groups,
    })
}

/// Combine two tables over the same grouping into a new table.
///
/// The key set of the result is the union of both inputs; a group present on
/// one side only passes through unchanged.
pub fn merge(a: &AggregateTable, b: &AggregateTable) -> Result<AggregateTable, MergeError> {
    let mut out = a.clone();
    out.merge_from(b.clone())?;
    Ok(out)
}

/// Compare two partials within an absolute tolerance on every float statistic.
pub fn approx_eq(a: &PartialAggregate, b: &PartialAggregate, tolerance: f64) -> bool {
    let close = |x: f64, y: f64| match x.partial_cmp(&y) {
        Some(Ordering::Equal) => true,
        _ => (x - y).abs() <= tolerance * x.abs().max(y.abs()).max(1.0),
    };
    a.count == b.count
        && close(a.mean, b.mean)
        && close(a.min, b.min)
        && close(a.max, b.max)
        && close(a.std(), b.std())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn reading(site: &str, device: &str, metric: &str, value: f64) -> Record {
        Record::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            site,
            device,
            metric,
            "u",
            value,
        )
    }

    #[test]
    fn test_partial_basic() {
        let agg = PartialAggregate::from_values([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(agg.count, 8);
        assert!((agg.mean - 5.0).abs() < 1e-12);
        assert_eq!(agg.min, 2.0);
        assert_eq!(agg.max, 9.0);
        assert_eq!(agg.sum_of_squares, 232.0);
        // Sample variance = 32 / 7
        assert!((agg.variance() - 32.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_value_std_is_zero() {
        let agg = PartialAggregate::from_values([42.0]);
        assert_eq!(agg.count, 1);
        assert_eq!(agg.std(), 0.0);
        assert!(!agg.std().is_nan());
    }

    #[test]
    fn test_empty_partial() {
        let agg = PartialAggregate::new();
        assert!(agg.is_empty());
        assert_eq!(agg.mean, 0.0);
        assert_eq!(agg.std(), 0.0);
    }

    #[test]
    fn test_nan_skipped() {
        let agg = PartialAggregate::from_values([1.0, f64::NAN, 3.0]);
        assert_eq!(agg.count, 2);
        assert!((agg.mean - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_merge_identity() {
        let agg = PartialAggregate::from_values([1.0, 2.0]);
        assert_eq!(agg.merge(&PartialAggregate::new()), agg);
        assert_eq!(PartialAggregate::new().merge(&agg), agg);
        assert!(PartialAggregate::new()
            .merge(&PartialAggregate::new())
            .is_empty());
    }

    #[test]
    fn test_merge_matches_direct() {
        let merged = PartialAggregate::from_values([0.0, 0.0, 0.0])
            .merge(&PartialAggregate::from_values([0.0, 100.0]));
        let direct = PartialAggregate::from_values([0.0, 0.0, 0.0, 0.0, 100.0]);
        assert!(approx_eq(&merged, &direct, 1e-12));
        assert!((merged.mean - 20.0).abs() < 1e-12);
        assert!((merged.std() - 44.721_359_549_995_8).abs() < 1e-9);
    }

    #[test]
    fn test_merge_is_not_std_average() {
        // Two constant halves: each has std 0, but the union does not.
        let a = PartialAggregate::from_values([1.0, 1.0]);
        let b = PartialAggregate::from_values([3.0, 3.0]);
        let merged = a.merge(&b);
        assert!(merged.std() > 1.0);
    }

    #[test]
    fn test_group_by_validation() {
        assert!(GroupBy::new(vec![]).is_err());
        assert!(GroupBy::new(vec![Column::Site, Column::Value]).is_err());
        assert!(GroupBy::new(vec![Column::Site, Column::Site]).is_err());
        assert!(matches!(
            GroupBy::from_names(&["site", "zone"]),
            Err(RunError::Core(CoreError::UnknownColumn(name))) if name == "zone"
        ));
        let gb = GroupBy::from_names(&["metric", " site "]).unwrap();
        assert_eq!(gb.names(), vec!["metric", "site"]);
    }

    #[test]
    fn test_group_key_order() {
        let a = GroupKey::new(["site_0", "device_001"]);
        let b = GroupKey::new(["site_0", "device_002"]);
        let c = GroupKey::new(["site_1", "device_000"]);
        assert!(a < b && b < c);
        assert_eq!(a.to_string(), "site_0/device_001");
    }

    #[test]
    fn test_aggregate_groups() {
        let batch = RecordBatch::from_records(vec![
            reading("s1", "d1", "temp", 1.0),
            reading("s1", "d1", "temp", 3.0),
            reading("s1", "d2", "temp", 10.0),
            reading("S1", "d1", "temp", 7.0),
        ]);
        let table = aggregate(&batch, &GroupBy::default()).unwrap();
        assert_eq!(table.len(), 3);

        let g = table.get(&GroupKey::new(["s1", "d1", "temp"])).unwrap();
        assert_eq!(g.count, 2);
        assert!((g.mean - 2.0).abs() < 1e-12);

        // Case-sensitive grouping
        assert!(table.get(&GroupKey::new(["S1", "d1", "temp"])).is_some());
    }

    #[test]
    fn test_aggregate_all_nan_group_dropped() {
        let batch = RecordBatch::from_records(vec![
            reading("s1", "d1", "temp", f64::NAN),
            reading("s1", "d2", "temp", 1.0),
        ]);
        let table = aggregate(&batch, &GroupBy::default()).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_table_merge_union() {
        let gb = GroupBy::default();
        let a = aggregate(
            &RecordBatch::from_records(vec![reading("s", "d1", "m", 1.0)]),
            &gb,
        )
        .unwrap();
        let b = aggregate(
            &RecordBatch::from_records(vec![
                reading("s", "d1", "m", 3.0),
                reading("s", "d2", "m", 5.0),
            ]),
            &gb,
        )
        .unwrap();

        let merged = merge(&a, &b).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get(&GroupKey::new(["s", "d1", "m"])).unwrap().count, 2);
        let only_b = merged.get(&GroupKey::new(["s", "d2", "m"])).unwrap();
        assert_eq!(only_b, b.get(&GroupKey::new(["s", "d2", "m"])).unwrap());
    }

    #[test]
    fn test_table_merge_rejects_other_grouping() {
        let a = AggregateTable::new(GroupBy::default());
        let b = AggregateTable::new(GroupBy::new(vec![Column::Site]).unwrap());
        assert!(matches!(
            merge(&a, &b),
            Err(MergeError::IncompatibleGroupBy { .. })
        ));
    }

    #[test]
    fn test_sort_and_top() {
        let gb = GroupBy::new(vec![Column::Device]).unwrap();
        let batch = RecordBatch::from_records(vec![
            reading("s", "c", "m", 5.0),
            reading("s", "a", "m", 1.0),
            reading("s", "a", "m", 9.0),
            reading("s", "b", "m", 5.0),
        ]);
        let mut table = aggregate(&batch, &gb).unwrap();
        table.sort_by_key();
        let keys: Vec<String> = table.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);

        // All means are 5.0: ties fall back to key order
        let by_mean: Vec<String> = table
            .top_by_mean(2)
            .into_iter()
            .map(|(k, _)| k.to_string())
            .collect();
        assert_eq!(by_mean, vec!["a", "b"]);

        let by_std = table.top_by_std(10);
        assert_eq!(by_std.len(), 3);
        assert_eq!(by_std[0].0.to_string(), "a");
    }

    #[test]
    fn test_aggregate_requires_group_columns() {
        let schema = std::sync::Arc::new(Schema::new(vec![Column::Time, Column::Value]));
        let batch = RecordBatch::new(schema, vec![reading("s", "d", "m", 1.0)]);
        assert!(matches!(
            aggregate(&batch, &GroupBy::default()),
            Err(CoreError::UnknownColumn(_))
        ));
    }
}
