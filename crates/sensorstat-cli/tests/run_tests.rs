//! End-to-end runs: CSV in, reports out.

use std::fmt::Write as _;
use std::path::Path;

use sensorstat_cli::config::{Config, FilterConfig, OutlierConfig};
use sensorstat_cli::run;

/// Readings for 3 sites x 4 devices x 3 metrics over 100 hours, plus one spike.
fn sample_csv() -> String {
    let mut body = String::from("time,site,device,metric,unit,value\n");
    let metrics = [("temp", "C"), ("hum", "%"), ("press", "hPa")];
    for hour in 0..100u32 {
        for site in 0..3 {
            for device in 0..4 {
                for (m, (metric, unit)) in metrics.iter().enumerate() {
                    let base = 10.0 * (m as f64 + 1.0) + site as f64 + device as f64;
                    let value = base + ((hour * 37 + device * 11) % 13) as f64 / 10.0;
                    writeln!(
                        body,
                        "2025-01-{:02} {:02}:00:00 +0000 UTC,site_{site},device_{device:03},{metric},{unit},{value}",
                        1 + hour / 24,
                        hour % 24
                    )
                    .unwrap();
                }
            }
        }
    }
    body.push_str("2025-01-05 12:30:00 +0000 UTC,site_0,device_000,temp,C,500\n");
    body
}

fn setup() -> (tempfile::TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sample_data.csv");
    std::fs::write(&input, sample_csv()).unwrap();
    let config = Config {
        input,
        output_prefix: format!("{}/output_", dir.path().display()),
        ..Default::default()
    };
    (dir, config)
}

fn read_rows(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header = reader
        .headers()
        .unwrap()
        .iter()
        .map(String::from)
        .collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    (header, rows)
}

#[test]
fn run_writes_all_reports() {
    let (_dir, config) = setup();
    let summary = run(&config).unwrap();

    assert_eq!(summary.stats.rows_read, 3601);
    assert_eq!(summary.stats.groups, 36);
    assert_eq!(summary.outliers, Some(1));

    let (header, rows) = read_rows(&summary.paths.aggregated);
    assert_eq!(
        header,
        vec![
            "site",
            "device",
            "metric",
            "value_count",
            "value_mean",
            "value_min",
            "value_max",
            "value_std"
        ]
    );
    assert_eq!(rows.len(), 36);
    assert_eq!(rows[0][..3], ["site_0", "device_000", "humidity"]);

    let (_, top_avg) = read_rows(&summary.paths.top_by_mean);
    assert_eq!(top_avg.len(), 10);
    let means: Vec<f64> = top_avg.iter().map(|r| r[4].parse().unwrap()).collect();
    assert!(means.windows(2).all(|w| w[0] >= w[1]));

    let (_, top_std) = read_rows(&summary.paths.top_by_std);
    assert_eq!(top_std[0][..3], ["site_0", "device_000", "temperature"]);

    let (header, outliers) = read_rows(&summary.paths.outliers);
    assert_eq!(header, vec!["time", "site", "device", "metric", "value", "unit"]);
    assert_eq!(
        outliers,
        vec![vec![
            "2025-01-05 12:30:00 +0000 UTC",
            "site_0",
            "device_000",
            "temperature",
            "500",
            "C"
        ]]
    );
}

#[test]
fn run_chunk_size_consistency() {
    let (_dir, config) = setup();
    let small = Config {
        chunk_size: 1000,
        output_prefix: format!("{}small_", config.output_prefix),
        ..config.clone()
    };
    let large = Config {
        chunk_size: 100_000,
        output_prefix: format!("{}large_", config.output_prefix),
        ..config
    };
    let a = run(&small).unwrap();
    let b = run(&large).unwrap();
    assert_eq!(a.stats.chunks, 4);
    assert_eq!(b.stats.chunks, 1);

    let (_, rows_a) = read_rows(&a.paths.aggregated);
    let (_, rows_b) = read_rows(&b.paths.aggregated);
    assert_eq!(rows_a.len(), rows_b.len());
    for (ra, rb) in rows_a.iter().zip(&rows_b) {
        assert_eq!(ra[..4], rb[..4]);
        for col in 4..8 {
            let x: f64 = ra[col].parse().unwrap();
            let y: f64 = rb[col].parse().unwrap();
            assert!((x - y).abs() <= 1e-6, "{ra:?} vs {rb:?}");
        }
    }
}

#[test]
fn run_filters_and_grouping() {
    let (_dir, mut config) = setup();
    config.group_by = vec!["metric".to_string()];
    config.filters = FilterConfig {
        site: Some("site_1".to_string()),
        time_start: Some("2025-01-02".to_string()),
        time_end: Some("2025-01-02 23:00:00 +0000 UTC".to_string()),
        ..Default::default()
    };
    let summary = run(&config).unwrap();

    // 24 hours x 4 devices x 3 metrics
    assert_eq!(summary.stats.rows_matched, 288);
    let (header, rows) = read_rows(&summary.paths.aggregated);
    assert_eq!(header[0], "metric");
    let metrics: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(metrics, vec!["humidity", "pressure", "temperature"]);
    assert!(rows.iter().all(|r| r[1] == "96"));
}

#[test]
fn run_no_data_writes_headers_only() {
    let (_dir, mut config) = setup();
    config.filters.site = Some("site_42".to_string());
    let summary = run(&config).unwrap();

    assert!(summary.is_no_data());
    assert_eq!(summary.outliers, Some(0));
    for path in [
        &summary.paths.aggregated,
        &summary.paths.top_by_mean,
        &summary.paths.top_by_std,
        &summary.paths.outliers,
    ] {
        let (header, rows) = read_rows(path);
        assert!(!header.is_empty());
        assert!(rows.is_empty(), "{}", path.display());
    }
}

#[test]
fn run_without_outlier_pass() {
    let (_dir, mut config) = setup();
    config.outliers = OutlierConfig {
        enabled: false,
        ..Default::default()
    };
    let summary = run(&config).unwrap();
    assert_eq!(summary.outliers, None);
    assert!(!summary.paths.outliers.exists());
}

#[test]
fn run_unknown_filter_column_fails() {
    let (_dir, mut config) = setup();
    config.filters.conditions.push(sensorstat_cli::config::ConditionConfig {
        key: "region".to_string(),
        op: "==".to_string(),
        value: "north".to_string(),
    });
    let err = run(&config).unwrap_err();
    assert!(format!("{err:#}").contains("region"));
}

#[test]
fn run_unknown_filter_column_fails_on_header_only_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("empty.csv");
    std::fs::write(&input, "time,site,device,metric,unit,value\n").unwrap();
    let mut config = Config {
        input,
        output_prefix: format!("{}/output_", dir.path().display()),
        ..Default::default()
    };
    config.filters.conditions.push(sensorstat_cli::config::ConditionConfig {
        key: "region".to_string(),
        op: "==".to_string(),
        value: "north".to_string(),
    });
    let err = run(&config).unwrap_err();
    assert!(format!("{err:#}").contains("region"));
    assert!(!dir.path().join("output_aggregated.csv").exists());
}
