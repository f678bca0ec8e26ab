//! Sensorstat CLI library - testable functions and modules
//!
//! This library provides the core functionality for the `sensorstat` binary:
//! configuration loading, logging setup, and the run that ties the engine to
//! the CSV reports.

pub mod config;
pub mod output;

use anyhow::{Context, Result};
use sensorstat_runtime::limits::REPORT_TOP_N;
use sensorstat_runtime::{CsvSource, Pipeline, RunStats, Scan, StreamingAggregator};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use config::{Config, LogFormat, LoggingConfig};
use output::{OutlierWriter, OutputPaths};

/// What a run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub stats: RunStats,
    /// Outlier rows written, `None` when the scan was disabled
    pub outliers: Option<usize>,
    pub paths: OutputPaths,
}

impl RunSummary {
    pub fn is_no_data(&self) -> bool {
        self.stats.groups == 0
    }
}

/// Install the global tracing subscriber; `RUST_LOG` overrides the configured level.
pub fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .with_context(|| format!("invalid log level '{}'", logging.level))?;

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    }
    .context("failed to install log subscriber")
}

/// Aggregate the configured input, write every report and scan for outliers.
pub fn run(config: &Config) -> Result<RunSummary> {
    config.validate()?;

    let conditions = config.filter_conditions()?;
    let pipeline = Pipeline::new(conditions, config.normalizer()?);
    let driver = StreamingAggregator::new(pipeline, config.group_by()?);
    let source = CsvSource::new(&config.input, config.chunk_size()?);

    info!(
        input = %config.input.display(),
        chunk_size = config.chunk_size,
        group_by = %driver.group_by(),
        filters = driver.pipeline().conditions().len(),
        "starting run"
    );

    let (table, stats) = driver
        .run_with_stats(&source)
        .with_context(|| format!("aggregating {}", config.input.display()))?;

    let paths = OutputPaths::from_prefix(&config.output_prefix);
    paths.ensure_parent()?;
    output::write_table(&paths.aggregated, &table)?;
    output::write_top_by_mean(&paths.top_by_mean, &table, REPORT_TOP_N)?;
    output::write_top_by_std(&paths.top_by_std, &table, REPORT_TOP_N)?;

    let outliers = if config.outliers.enabled {
        let scanner = driver.outlier_scanner().with_sigma(config.outliers.sigma)?;
        let mut writer = OutlierWriter::create(&paths.outliers)?;
        match scanner.scan(&source, &table)? {
            Scan::NoData => warn!("no data: skipping outlier scan"),
            Scan::Rows(rows) => {
                for outlier in rows {
                    let outlier = outlier.context("scanning for outliers")?;
                    writer.write(&outlier)?;
                }
            }
        }
        Some(writer.finish()?)
    } else {
        None
    };

    if let Some(count) = outliers {
        info!(outliers = count, sigma = config.outliers.sigma, "outlier scan complete");
    }

    Ok(RunSummary {
        stats,
        outliers,
        paths,
    })
}
