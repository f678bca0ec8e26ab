//! Filter evaluation over whole batches and through the streaming driver.

use chrono::{Duration, TimeZone, Utc};
use sensorstat_core::{CoreError, FilterCondition, Record, RecordBatch, Schema};
use sensorstat_runtime::filter::evaluate;
use sensorstat_runtime::{
    ChunkSize, GroupBy, MemorySource, MetricNormalizer, Pipeline, StreamingAggregator,
};

/// One reading per day from 2025-01-01 through 2025-01-10.
fn ten_days() -> Vec<Record> {
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    (0..10)
        .map(|day| {
            Record::new(
                start + Duration::days(day),
                if day % 2 == 0 { "site_0" } else { "site_1" },
                "device_000",
                "temp",
                "C",
                day as f64,
            )
        })
        .collect()
}

fn window() -> Vec<FilterCondition> {
    vec![
        FilterCondition::parse("time", ">=", "2025-01-03").unwrap(),
        FilterCondition::parse("time", "<=", "2025-01-07").unwrap(),
    ]
}

// =============================================================================
// Batch evaluation
// =============================================================================

#[test]
fn test_time_window_selects_five_days() {
    let batch = RecordBatch::from_records(ten_days());
    let selected = evaluate(&batch, &window()).unwrap();

    assert_eq!(selected.len(), 5);
    let days: Vec<f64> = selected.iter().map(|r| r.value).collect();
    assert_eq!(days, vec![2.0, 3.0, 4.0, 5.0, 6.0]);
    // input untouched
    assert_eq!(batch.len(), 10);
}

#[test]
fn test_bounds_are_inclusive() {
    let batch = RecordBatch::from_records(ten_days());
    let conditions = vec![
        FilterCondition::parse("time", ">=", "2025-01-04 00:00:00 +0000 UTC").unwrap(),
        FilterCondition::parse("time", "<=", "2025-01-04 00:00:00 +0000 UTC").unwrap(),
    ];
    let selected = evaluate(&batch, &conditions).unwrap();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected.rows()[0].value, 3.0);
}

#[test]
fn test_exclusive_bounds() {
    let batch = RecordBatch::from_records(ten_days());
    let conditions = vec![
        FilterCondition::parse("time", ">", "2025-01-03").unwrap(),
        FilterCondition::parse("time", "<", "2025-01-07").unwrap(),
    ];
    assert_eq!(evaluate(&batch, &conditions).unwrap().len(), 3);
}

#[test]
fn test_conditions_are_conjunctive() {
    let batch = RecordBatch::from_records(ten_days());
    let mut conditions = window();
    conditions.push(FilterCondition::equals("site", "site_0"));
    let selected = evaluate(&batch, &conditions).unwrap();
    // days 3, 5, 7 fall on site_0
    assert_eq!(selected.len(), 3);
    assert!(selected.iter().all(|r| r.site == "site_0"));
}

#[test]
fn test_not_equals() {
    let batch = RecordBatch::from_records(ten_days());
    let selected = evaluate(&batch, &[FilterCondition::not_equals("site", "site_0")]).unwrap();
    assert_eq!(selected.len(), 5);
    assert!(selected.iter().all(|r| r.site == "site_1"));
}

#[test]
fn test_no_conditions_keeps_everything() {
    let batch = RecordBatch::from_records(ten_days());
    assert_eq!(evaluate(&batch, &[]).unwrap(), batch);
}

#[test]
fn test_unknown_column_is_reported() {
    let batch = RecordBatch::from_records(ten_days());
    let err = evaluate(&batch, &[FilterCondition::equals("region", "north")]).unwrap_err();
    assert!(matches!(err, CoreError::UnknownColumn(c) if c == "region"));
}

#[test]
fn test_legacy_time_keys_are_not_columns() {
    let batch = RecordBatch::from_records(ten_days());
    let cond = FilterCondition::parse("time_start", ">=", "2025-01-03").unwrap();
    assert!(matches!(
        evaluate(&batch, &[cond]),
        Err(CoreError::UnknownColumn(_))
    ));
}

#[test]
fn test_column_missing_from_schema() {
    let batch = RecordBatch::new(
        std::sync::Arc::new(Schema::new(vec![
            sensorstat_core::Column::Time,
            sensorstat_core::Column::Value,
        ])),
        ten_days(),
    );
    assert!(matches!(
        evaluate(&batch, &[FilterCondition::equals("site", "site_0")]),
        Err(CoreError::UnknownColumn(_))
    ));
}

// =============================================================================
// Through the driver
// =============================================================================

#[test]
fn test_window_through_driver_any_chunk_size() {
    for rows in [1, 2, 3, 10, 100] {
        let source = MemorySource::new(ten_days(), ChunkSize::new(rows).unwrap());
        let driver = StreamingAggregator::new(
            Pipeline::new(window(), MetricNormalizer::default()),
            GroupBy::from_names(&["metric"]).unwrap(),
        );
        let (table, stats) = driver.run_with_stats(&source).unwrap();
        assert_eq!(stats.rows_read, 10, "chunk size {rows}");
        assert_eq!(stats.rows_matched, 5, "chunk size {rows}");

        let (key, agg) = table.iter().next().unwrap();
        assert_eq!(key.to_string(), "temperature");
        assert_eq!(agg.count, 5);
        assert_eq!(agg.min, 2.0);
        assert_eq!(agg.max, 6.0);
    }
}

#[test]
fn test_metric_filter_matches_raw_name() {
    let mut rows = ten_days();
    rows[0].metric = "temperature".to_string();
    let source = MemorySource::new(rows, ChunkSize::new(4).unwrap());
    let driver = StreamingAggregator::new(
        Pipeline::new(
            vec![FilterCondition::equals("metric", "temp")],
            MetricNormalizer::default(),
        ),
        GroupBy::default(),
    );
    let (_, stats) = driver.run_with_stats(&source).unwrap();
    assert_eq!(stats.rows_matched, 9);
}
