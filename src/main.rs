//! CLI entry point for the mobility metrics tool.
//!
//! Provides subcommands for aggregating trip and vehicle-event files into a
//! summary (plus its privacy-suppressed variant), printing a report, and
//! exporting a persisted summary as CSV or JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mobility_metrics::analyzers::{aggregate_events, aggregate_trips};
use mobility_metrics::config::{
    AggregationConfig, DEFAULT_CYCLE_LENGTH, DEFAULT_GPS_PRECISION, DEFAULT_PERIOD_SECONDS,
    DEFAULT_PRIVACY_LEVEL,
};
use mobility_metrics::parser::{InputFormat, read_events, read_trips};
use mobility_metrics::{Metrics, codec, output, stats, suppress};
use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "mobility_metrics")]
#[command(about = "Aggregate MDS trips into privacy-suppressed zone metrics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate trips (and optionally vehicle events) into a metrics summary
    Aggregate {
        /// Trips file: .json/.jsonl (MDS trips), .csv, or an existing .pbf summary
        #[arg(value_name = "TRIPS")]
        input_trips: PathBuf,

        /// Vehicle status change events (.json lines)
        #[arg(long)]
        changes: Option<PathBuf>,

        /// Time period in seconds
        #[arg(long, env = "MOBILITY_METRICS_PERIOD", default_value_t = DEFAULT_PERIOD_SECONDS)]
        period: u32,

        /// Number of periods in a cycle, e.g. 168 for hour of week
        #[arg(long, env = "MOBILITY_METRICS_CYCLE_LENGTH", default_value_t = DEFAULT_CYCLE_LENGTH)]
        cycle_length: u32,

        /// Decimal digits of GPS accuracy used for zones
        #[arg(long, env = "MOBILITY_METRICS_ACCURACY", default_value_t = DEFAULT_GPS_PRECISION)]
        accuracy: usize,

        /// k-anonymity / l-diversity level for the suppressed output
        #[arg(long, env = "MOBILITY_METRICS_PRIVACY", default_value_t = DEFAULT_PRIVACY_LEVEL)]
        privacy: u32,

        /// Summary output file
        #[arg(short, long, default_value = "output.pbf")]
        output: PathBuf,

        /// Skip writing the suppressed summary
        #[arg(long, default_value_t = false)]
        no_suppress: bool,

        /// Suppressed output is written to <PREFIX>-<privacy>.pbf
        #[arg(long, default_value = "suppress")]
        suppress_prefix: String,
    },
    /// Print totals, sparklines and suppression statistics for a summary
    Report {
        /// Summary file (.pbf)
        #[arg(value_name = "METRICS")]
        input: PathBuf,

        /// Privacy levels to evaluate
        #[arg(long, value_delimiter = ',', default_value = "1,2,3,4,5")]
        levels: Vec<u32>,

        /// Number of top trip volumes to list
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Export a summary's volumes and flows as CSV
    ExportCsv {
        /// Summary file (.pbf)
        #[arg(value_name = "METRICS")]
        input: PathBuf,

        /// Output prefix: <PREFIX>-volume.csv and <PREFIX>-flow.csv
        #[arg(value_name = "PREFIX")]
        prefix: String,

        /// Write the flow CSV
        #[arg(short, long, default_value_t = false)]
        flow: bool,

        /// Skip the volume CSV
        #[arg(long, default_value_t = false)]
        no_volume: bool,
    },
    /// Dump a summary as JSON
    ToJson {
        /// Summary file (.pbf)
        #[arg(value_name = "METRICS")]
        input: PathBuf,

        /// Output JSON file; printed to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/mobility_metrics.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("mobility_metrics.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Aggregate {
            input_trips,
            changes,
            period,
            cycle_length,
            accuracy,
            privacy,
            output,
            no_suppress,
            suppress_prefix,
        } => {
            let config = AggregationConfig {
                period_seconds: period,
                cycle_length,
                gps_precision: accuracy,
                privacy_level: privacy,
            };
            config.validate()?;

            let metrics = build_metrics(&input_trips, changes.as_deref(), &config)?;
            codec::write_metrics(&output, &metrics)
                .with_context(|| format!("writing {}", output.display()))?;
            info!(path = %output.display(), "Summary written");

            if !no_suppress {
                let suppressed = suppress(&metrics, config.privacy_level)?;
                let path = PathBuf::from(format!("{suppress_prefix}-{}.pbf", config.privacy_level));
                codec::write_metrics(&path, &suppressed)
                    .with_context(|| format!("writing {}", path.display()))?;
                info!(
                    path = %path.display(),
                    trip_volume_suppressed = suppressed.trip_volume_suppressed,
                    flows_suppressed = suppressed.flows_suppressed,
                    "Suppressed summary written"
                );
            }
        }
        Commands::Report { input, levels, top } => {
            let metrics = load(&input)?;
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            stats::write_report(&metrics, &levels, top, &mut out)?;
        }
        Commands::ExportCsv {
            input,
            prefix,
            flow,
            no_volume,
        } => {
            let metrics = load(&input)?;
            if !no_volume {
                let path = format!("{prefix}-volume.csv");
                let rows = output::write_volume_csv(&metrics, create(&path)?)?;
                info!(path, rows, "Volume CSV written");
            }
            if flow {
                let path = format!("{prefix}-flow.csv");
                let rows = output::write_flow_csv(&metrics, create(&path)?)?;
                info!(path, rows, "Flow CSV written");
            }
        }
        Commands::ToJson { input, output } => {
            let metrics = load(&input)?;
            match output {
                Some(path) => {
                    let mut writer = create(&path)?;
                    output::write_json(&metrics, &mut writer)?;
                    writer.flush()?;
                }
                None => output::write_json(&metrics, std::io::stdout().lock())?,
            }
        }
    }

    Ok(())
}

/// Loads or aggregates the trip input, then folds in vehicle events.
#[tracing::instrument(skip(config), fields(trips = %input_trips.display()))]
fn build_metrics(
    input_trips: &Path,
    changes: Option<&Path>,
    config: &AggregationConfig,
) -> Result<Metrics> {
    let mut metrics = match InputFormat::from_path(input_trips)? {
        InputFormat::Metrics => load(input_trips)?,
        _ => {
            let trips = read_trips(input_trips)
                .with_context(|| format!("reading trips from {}", input_trips.display()))?;
            let mut metrics = Metrics::new(config.period_seconds, config.cycle_length);
            aggregate_trips(&mut metrics, config, trips);
            metrics
        }
    };

    if let Some(path) = changes {
        let events =
            read_events(path).with_context(|| format!("reading events from {}", path.display()))?;
        aggregate_events(&mut metrics, config, &events);
    }
    Ok(metrics)
}

fn load(path: &Path) -> Result<Metrics> {
    codec::read_metrics(path).with_context(|| format!("reading summary {}", path.display()))
}

fn create(path: impl AsRef<Path>) -> Result<BufWriter<File>> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    Ok(BufWriter::new(file))
}
