//! CSV report writers
//!
//! Every report is written with its header even when it has no rows, so a
//! run that matched nothing still leaves well-formed files behind.

use sensorstat_core::time::format_timestamp;
use sensorstat_runtime::{AggregateTable, GroupBy, GroupKey, OutlierRecord, PartialAggregate};
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

/// Statistic columns following the group key columns
pub const STAT_COLUMNS: [&str; 5] = [
    "value_count",
    "value_mean",
    "value_min",
    "value_max",
    "value_std",
];

pub const OUTLIER_COLUMNS: [&str; 6] = ["time", "site", "device", "metric", "value", "unit"];

/// Report file locations derived from one prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub aggregated: PathBuf,
    pub top_by_mean: PathBuf,
    pub top_by_std: PathBuf,
    pub outliers: PathBuf,
}

impl OutputPaths {
    pub fn from_prefix(prefix: &str) -> Self {
        let path = |name: &str| PathBuf::from(format!("{}{}", prefix, name));
        Self {
            aggregated: path("aggregated.csv"),
            top_by_mean: path("top10_avg.csv"),
            top_by_std: path("top10_std.csv"),
            outliers: path("outliers.csv"),
        }
    }

    /// Create the parent directory of the reports if needed.
    pub fn ensure_parent(&self) -> Result<(), OutputError> {
        if let Some(parent) = self.aggregated.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| OutputError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

fn create(path: &Path) -> Result<csv::Writer<File>, OutputError> {
    let file = File::create(path).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(csv::WriterBuilder::new().has_headers(false).from_writer(file))
}

fn stat_header(group_by: &GroupBy) -> Vec<&'static str> {
    let mut header = group_by.names();
    header.extend(STAT_COLUMNS);
    header
}

fn stat_row(key: &GroupKey, stats: &PartialAggregate) -> Vec<String> {
    let mut row: Vec<String> = key.parts().to_vec();
    row.push(stats.count.to_string());
    row.push(stats.mean.to_string());
    row.push(stats.min.to_string());
    row.push(stats.max.to_string());
    row.push(stats.std().to_string());
    row
}

fn write_stats<'a, I>(path: &Path, group_by: &GroupBy, rows: I) -> Result<usize, OutputError>
where
    I: IntoIterator<Item = (&'a GroupKey, &'a PartialAggregate)>,
{
    let mut writer = create(path)?;
    writer.write_record(stat_header(group_by))?;
    let mut written = 0;
    for (key, stats) in rows {
        writer.write_record(stat_row(key, stats))?;
        written += 1;
    }
    writer.flush().map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), rows = written, "report written");
    Ok(written)
}

/// Write the full table in its current order.
pub fn write_table(path: &Path, table: &AggregateTable) -> Result<usize, OutputError> {
    write_stats(path, table.group_by(), table.iter())
}

/// Write the `n` groups with the highest mean.
pub fn write_top_by_mean(
    path: &Path,
    table: &AggregateTable,
    n: usize,
) -> Result<usize, OutputError> {
    write_stats(path, table.group_by(), table.top_by_mean(n))
}

/// Write the `n` groups with the highest standard deviation.
pub fn write_top_by_std(
    path: &Path,
    table: &AggregateTable,
    n: usize,
) -> Result<usize, OutputError> {
    write_stats(path, table.group_by(), table.top_by_std(n))
}

#[derive(Serialize)]
struct OutlierRow<'a> {
    time: String,
    site: &'a str,
    device: &'a str,
    metric: &'a str,
    value: String,
    unit: &'a str,
}

/// Incremental writer for outlier rows, fed straight from the scan
pub struct OutlierWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
    rows: usize,
}

impl OutlierWriter {
    /// Create the file and write its header.
    pub fn create(path: &Path) -> Result<Self, OutputError> {
        let mut writer = create(path)?;
        writer.write_record(OUTLIER_COLUMNS)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            rows: 0,
        })
    }

    pub fn write(&mut self, outlier: &OutlierRecord) -> Result<(), OutputError> {
        let r = &outlier.record;
        self.writer.serialize(OutlierRow {
            time: format_timestamp(&r.time),
            site: &r.site,
            device: &r.device,
            metric: &r.metric,
            value: r.value.to_string(),
            unit: &r.unit,
        })?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush and close; returns the number of rows written.
    pub fn finish(mut self) -> Result<usize, OutputError> {
        self.writer.flush().map_err(|source| OutputError::Io {
            path: self.path.clone(),
            source,
        })?;
        info!(path = %self.path.display(), rows = self.rows, "report written");
        Ok(self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_from_prefix() {
        let paths = OutputPaths::from_prefix("out/run1_");
        assert_eq!(paths.aggregated, PathBuf::from("out/run1_aggregated.csv"));
        assert_eq!(paths.top_by_mean, PathBuf::from("out/run1_top10_avg.csv"));
        assert_eq!(paths.top_by_std, PathBuf::from("out/run1_top10_std.csv"));
        assert_eq!(paths.outliers, PathBuf::from("out/run1_outliers.csv"));
    }

    #[test]
    fn test_stat_row_layout() {
        let key = GroupKey::new(["site_0", "device_000", "temperature"]);
        let stats = PartialAggregate::from_values([1.0, 3.0]);
        assert_eq!(
            stat_row(&key, &stats),
            vec![
                "site_0",
                "device_000",
                "temperature",
                "2",
                "2",
                "1",
                "3",
                "1.4142135623730951"
            ]
        );
    }

    #[test]
    fn test_empty_table_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agg.csv");
        let table = AggregateTable::new(GroupBy::default());
        assert_eq!(write_table(&path, &table).unwrap(), 0);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "site,device,metric,value_count,value_mean,value_min,value_max,value_std\n"
        );
    }

    #[test]
    fn test_outlier_writer_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outliers.csv");
        let writer = OutlierWriter::create(&path).unwrap();
        assert_eq!(writer.finish().unwrap(), 0);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "time,site,device,metric,value,unit\n"
        );
    }
}
