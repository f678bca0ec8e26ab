//! Metric-name normalization
//!
//! Abbreviated metric names are rewritten to canonical names before
//! grouping. The lookup table is passed in explicitly so that two runs can
//! use different tables. Chained aliases (`a -> b` while `b -> c`) are
//! rejected when the table is built, which keeps normalization idempotent.

use rustc_hash::FxHashMap;
use sensorstat_core::RecordBatch;

use crate::error::{RunError, RunResult};

/// Static alias table applied to the `metric` column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricNormalizer {
    aliases: FxHashMap<String, String>,
}

impl Default for MetricNormalizer {
    fn default() -> Self {
        let aliases = [
            ("temp", "temperature"),
            ("hum", "humidity"),
            ("press", "pressure"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self { aliases }
    }
}

impl MetricNormalizer {
    /// Build a normalizer from `(alias, canonical)` pairs.
    pub fn new<I, K, V>(aliases: I) -> RunResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let aliases: FxHashMap<String, String> = aliases
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        for (alias, target) in &aliases {
            if let Some(next) = aliases.get(target) {
                if next != target {
                    return Err(RunError::ChainedAlias {
                        alias: alias.clone(),
                        target: target.clone(),
                        next: next.clone(),
                    });
                }
            }
        }

        Ok(Self { aliases })
    }

    /// A normalizer that leaves every name as is.
    pub fn identity() -> Self {
        Self {
            aliases: FxHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Canonical name for `name`; unmapped names pass through.
    pub fn normalize<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Rewrite the metric of every row in `batch`.
    pub fn apply(&self, batch: RecordBatch) -> RecordBatch {
        if self.aliases.is_empty() {
            return batch;
        }
        batch.map_rows(|row| {
            if let Some(canonical) = self.aliases.get(row.metric.as_str()) {
                row.metric.clone_from(canonical);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sensorstat_core::Record;

    #[test]
    fn test_default_aliases() {
        let n = MetricNormalizer::default();
        assert_eq!(n.normalize("temp"), "temperature");
        assert_eq!(n.normalize("hum"), "humidity");
        assert_eq!(n.normalize("press"), "pressure");
        assert_eq!(n.normalize("co2"), "co2");
        assert_eq!(n.len(), 3);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let n = MetricNormalizer::default();
        for name in ["temp", "temperature", "hum", "press", "voltage", ""] {
            let once = n.normalize(name);
            assert_eq!(n.normalize(once), once);
        }
    }

    #[test]
    fn test_chained_alias_rejected() {
        let err = MetricNormalizer::new([("t", "temp"), ("temp", "temperature")]).unwrap_err();
        assert!(matches!(err, RunError::ChainedAlias { .. }));
    }

    #[test]
    fn test_self_alias_allowed() {
        let n = MetricNormalizer::new([("temp", "temperature"), ("temperature", "temperature")])
            .unwrap();
        assert_eq!(n.normalize("temp"), "temperature");
    }

    #[test]
    fn test_apply_rewrites_metric_only() {
        let batch = RecordBatch::from_records(vec![
            Record::new(Utc::now(), "temp", "temp", "temp", "temp", 1.0),
            Record::new(Utc::now(), "s", "d", "co2", "ppm", 2.0),
        ]);
        let out = MetricNormalizer::default().apply(batch);
        assert_eq!(out.rows()[0].metric, "temperature");
        assert_eq!(out.rows()[0].site, "temp");
        assert_eq!(out.rows()[0].unit, "temp");
        assert_eq!(out.rows()[1].metric, "co2");
    }

    #[test]
    fn test_identity() {
        let n = MetricNormalizer::identity();
        assert!(n.is_empty());
        assert_eq!(n.normalize("temp"), "temp");
    }
}
