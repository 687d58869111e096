//! CLI entry point for the crowd-level estimator.
//!
//! Provides subcommands for estimating the current crowd level of a
//! route/stop, ingesting individual reports into a CSV store, and seeding a
//! CSV store with synthetic history.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use crowd_level::{
    EstimateRequest, Estimator, FusionConfig, PartitionKey, Report, Source,
    fetch::{BasicClient, auth::ApiKey},
    level::{MAX_LEVEL, MIN_LEVEL},
    output::{append_report, append_reports, print_pretty, write_json},
    store::{CsvReportStore, HttpReportStore, ReportStore},
    synth::{SynthParams, generate_history, generate_live},
};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "crowd_level")]
#[command(about = "Estimate how crowded a transit stop is from crowd-sourced reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the current crowd level for a route/stop
    Estimate {
        /// Report store: path to a CSV file or base URL of a REST endpoint
        #[arg(short, long, default_value = "reports.csv")]
        store: String,

        #[arg(long)]
        route: String,

        #[arg(long)]
        stop: String,

        /// Reference instant (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<String>,

        /// Width of the current report window in minutes
        #[arg(short, long)]
        window_min: Option<i64>,

        /// Give extra weight to reports from this bus
        #[arg(short, long)]
        bus_id: Option<String>,

        /// Pretty-print the JSON result
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
    /// Append a single report to a CSV store
    Ingest {
        /// CSV file to append the report to
        #[arg(short, long, default_value = "reports.csv")]
        output: String,

        #[arg(long)]
        route: String,

        #[arg(long)]
        stop: String,

        /// Who filed the report: driver or rider
        #[arg(long)]
        source: String,

        /// Crowd level, 1 (empty) to 4 (packed)
        #[arg(long)]
        level: i64,

        #[arg(short, long)]
        bus_id: Option<String>,

        /// Observed headcount, informational only
        #[arg(long)]
        headcount: Option<u32>,

        /// Report instant (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<String>,
    },
    /// Fill a CSV store with synthetic history (and optionally live reports)
    Seed {
        /// CSV file to append the reports to
        #[arg(short, long, default_value = "reports.csv")]
        output: String,

        #[arg(long)]
        route: String,

        #[arg(long)]
        stop: String,

        /// Instant the history is generated relative to (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<String>,

        /// Number of past weeks to generate
        #[arg(long, default_value_t = 4)]
        weeks: u32,

        /// Reports per week around the same time slot
        #[arg(long, default_value_t = 6)]
        per_week: usize,

        /// Level the synthetic reports cluster around
        #[arg(long, default_value_t = 3)]
        typical_level: i64,

        /// Number of reports to generate inside the current window
        #[arg(long, default_value_t = 0)]
        live: usize,

        /// RNG seed
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/crowd_level.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("crowd_level.log"));

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
    let config = FusionConfig::from_env()?;

    match cli.command {
        Commands::Estimate {
            store,
            route,
            stop,
            at,
            window_min,
            bus_id,
            pretty,
        } => {
            let store = open_store(&store, &config)?;
            let estimator = Estimator::new(config, store);

            let mut request = EstimateRequest::new(&route, &stop).at(parse_at(at.as_deref())?);
            request.window_min = window_min;
            request.bus_id = bus_id;

            let result = estimator.estimate(&request).await;
            print_pretty(&result);
            write_json(std::io::stdout().lock(), &result, pretty)?;
        }
        Commands::Ingest {
            output,
            route,
            stop,
            source,
            level,
            bus_id,
            headcount,
            at,
        } => {
            if !(MIN_LEVEL as i64..=MAX_LEVEL as i64).contains(&level) {
                bail!("level must be between {MIN_LEVEL} and {MAX_LEVEL}, got {level}");
            }
            let source: Source = source.parse()?;

            let report = Report {
                route,
                stop,
                bus_id,
                source,
                level,
                headcount,
                timestamp: parse_at(at.as_deref())?,
            };
            append_report(&output, &report)?;

            info!(
                key = %report.key(),
                source = %report.source,
                level = report.level,
                output = %output,
                "Report ingested"
            );
        }
        Commands::Seed {
            output,
            route,
            stop,
            at,
            weeks,
            per_week,
            typical_level,
            live,
            seed,
        } => {
            let key = PartitionKey::new(&route, &stop);
            let anchor = parse_at(at.as_deref())?;
            let params = SynthParams {
                weeks,
                per_week,
                half_window_min: config.prior_half_window_min,
                typical_level,
                capacity: config.capacity,
                seed,
                ..SynthParams::default()
            };

            let mut reports = generate_history(&key, anchor, &params);
            reports.extend(generate_live(&key, anchor, config.window_min, live, &params));
            append_reports(&output, &reports)?;

            info!(key = %key, count = reports.len(), output = %output, "Synthetic reports written");
        }
    }

    Ok(())
}

/// Opens a CSV file store, or an HTTP store when `location` is a URL.
fn open_store(location: &str, config: &FusionConfig) -> Result<Arc<dyn ReportStore>> {
    if location.starts_with("http") {
        let client = BasicClient::with_timeout(config.store_timeout)?;
        let store: Arc<dyn ReportStore> = match std::env::var("REPORT_STORE_API_KEY") {
            Ok(key) if !key.is_empty() => {
                let client = ApiKey::bearer(ApiKey::new(client, "apikey", &key)?, &key)?;
                Arc::new(HttpReportStore::new(client, location)?)
            }
            _ => Arc::new(HttpReportStore::new(client, location)?),
        };
        info!(url = location, "Using HTTP report store");
        Ok(store)
    } else {
        let store = CsvReportStore::open(location)?;
        info!(
            path = location,
            reports = store.len(),
            skipped = store.skipped(),
            "Using CSV report store"
        );
        Ok(Arc::new(store))
    }
}

fn parse_at(at: Option<&str>) -> Result<DateTime<Utc>> {
    match at {
        Some(raw) => Ok(DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("invalid RFC 3339 instant '{raw}'"))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}
