//! Sensorstat CLI - grouped statistics and outlier reports for sensor readings

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sensorstat_cli::config::{ConditionConfig, Config, FilterConfig, OutlierConfig};

#[derive(Parser)]
#[command(name = "sensorstat")]
#[command(version)]
#[command(about = "Chunked grouped statistics and outlier detection for sensor CSV files", long_about = None)]
struct Cli {
    /// Path to configuration file (YAML or TOML)
    #[arg(short, long, global = true, env = "SENSORSTAT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate a CSV file and write the reports
    Run {
        /// Input CSV file
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Prefix for the output files
        #[arg(short, long)]
        output_prefix: Option<String>,

        /// Keep only this site
        #[arg(long)]
        site: Option<String>,

        /// Keep only this device
        #[arg(long)]
        device: Option<String>,

        /// Keep only this metric (name as written in the input)
        #[arg(long)]
        metric: Option<String>,

        /// Keep readings at or after this time
        #[arg(long)]
        time_start: Option<String>,

        /// Keep readings at or before this time
        #[arg(long)]
        time_end: Option<String>,

        /// Extra filter condition, e.g. "unit!=F" (repeatable)
        #[arg(long = "where", value_name = "KEY OP VALUE")]
        conditions: Vec<String>,

        /// Rows per chunk
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Comma-separated grouping columns
        #[arg(long, value_delimiter = ',')]
        group_by: Option<Vec<String>>,

        /// Skip the outlier pass
        #[arg(long)]
        no_outliers: bool,

        /// Outlier threshold in standard deviations
        #[arg(long)]
        sigma: Option<f64>,
    },

    /// Generate an example configuration file
    ConfigGen {
        /// Output format (yaml or toml)
        #[arg(short, long, default_value = "yaml")]
        format: String,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Split `key<op>value` into its parts; two-character operators are tried first.
fn parse_where(text: &str) -> Result<ConditionConfig> {
    for op in ["==", "!=", "<=", ">=", "=", "<", ">"] {
        if let Some((key, value)) = text.split_once(op) {
            return Ok(ConditionConfig {
                key: key.trim().to_string(),
                op: op.to_string(),
                value: value.trim().to_string(),
            });
        }
    }
    anyhow::bail!("Invalid condition '{}': expected KEY OP VALUE", text)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config file if specified
    let mut config = match cli.config {
        Some(ref path) => Config::load(path).map_err(|e| anyhow::anyhow!("{}", e))?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Run {
            input,
            output_prefix,
            site,
            device,
            metric,
            time_start,
            time_end,
            conditions,
            chunk_size,
            group_by,
            no_outliers,
            sigma,
        } => {
            // Command line values take precedence over the config file
            let defaults = Config::default();
            let overrides = Config {
                input: input.unwrap_or(defaults.input),
                output_prefix: output_prefix.unwrap_or(defaults.output_prefix),
                chunk_size: chunk_size.unwrap_or(defaults.chunk_size),
                group_by: group_by.unwrap_or(defaults.group_by),
                filters: FilterConfig {
                    site,
                    device,
                    metric,
                    time_start,
                    time_end,
                    conditions: conditions
                        .iter()
                        .map(|c| parse_where(c))
                        .collect::<Result<_>>()?,
                },
                outliers: OutlierConfig {
                    enabled: !no_outliers,
                    sigma: sigma.unwrap_or(defaults.outliers.sigma),
                },
                ..Config::default()
            };
            config.merge(overrides);

            sensorstat_cli::init_logging(&config.logging)?;
            let summary = sensorstat_cli::run(&config)?;

            if summary.is_no_data() {
                println!("No data matched the filters; wrote empty reports.");
            } else {
                println!(
                    "{} groups from {} of {} rows",
                    summary.stats.groups, summary.stats.rows_matched, summary.stats.rows_read
                );
            }
            println!("  {}", summary.paths.aggregated.display());
            println!("  {}", summary.paths.top_by_mean.display());
            println!("  {}", summary.paths.top_by_std.display());
            if let Some(count) = summary.outliers {
                println!("  {} ({} outliers)", summary.paths.outliers.display(), count);
            }
        }

        Commands::ConfigGen { format, output } => {
            let content = match format.to_lowercase().as_str() {
                "yaml" | "yml" => Config::example_yaml(),
                "toml" => Config::example_toml(),
                _ => anyhow::bail!("Unsupported format: {}. Use 'yaml' or 'toml'", format),
            };

            if let Some(path) = output {
                std::fs::write(&path, &content)?;
                println!("Configuration written to: {}", path.display());
            } else {
                println!("{}", content);
            }
        }
    }

    Ok(())
}
