//! CLI entry point for the COVID-19 insights tool.
//!
//! Provides subcommands for building the insights report, inspecting a
//! single country, summarizing the input table, and downloading the dataset.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use covid_insights::analyzers::StatsAggregator;
use covid_insights::config::AnalysisConfig;
use covid_insights::fetch::{BasicClient, DEFAULT_DATASET_URL, download_dataset};
use covid_insights::output::{
    format_count, format_fraction_pct, format_pct, print_summary, write_artifacts,
};
use covid_insights::parser::load_table;
use covid_insights::report::build_report;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "covid_insights")]
#[command(about = "Descriptive statistics over the OWID COVID-19 dataset", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the markdown report and JSON summary
    Report {
        /// Input CSV (plain or .gz)
        #[arg(short, long, default_value = "data/owid-covid-data.csv")]
        input: PathBuf,

        /// Directory to write the report files into
        #[arg(short, long, default_value = "reports")]
        out_dir: PathBuf,

        /// Optional JSON file with analysis settings
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Reference date (YYYY-MM-DD); defaults to the latest date in the input
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Trend window in days
        #[arg(short, long)]
        window: Option<u32>,

        /// Rows in the rolling mean used for wave detection
        #[arg(long)]
        wave_window: Option<usize>,

        /// Rows per ranking table
        #[arg(short = 'n', long)]
        top: Option<usize>,

        /// Minimum population for the vaccination leaders table
        #[arg(long)]
        min_population: Option<f64>,

        /// Percent fully vaccinated above which a country is highly vaccinated
        #[arg(long)]
        high_threshold: Option<f64>,

        /// Percent fully vaccinated below which a country is less vaccinated
        #[arg(long)]
        low_threshold: Option<f64>,

        /// Keep regional and income groupings in per-country rankings
        #[arg(long, default_value_t = false)]
        include_aggregates: bool,

        /// Also write the per-country latest metrics CSV
        #[arg(long, default_value_t = false)]
        export_csv: bool,
    },
    /// Show the latest record for one country
    Snapshot {
        #[arg(short, long, default_value = "data/owid-covid-data.csv")]
        input: PathBuf,

        /// Country name as written in the dataset (e.g. "Kenya")
        #[arg(long)]
        country: String,

        /// Use the most recent record on or before this date (YYYY-MM-DD)
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Summarize the input table: rows, entities, date span, missing values
    Overview {
        #[arg(short, long, default_value = "data/owid-covid-data.csv")]
        input: PathBuf,
    },
    /// Download the dataset snapshot
    Fetch {
        #[arg(long, default_value = DEFAULT_DATASET_URL)]
        url: String,

        #[arg(short, long, default_value = "data/owid-covid-data.csv")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/covid_insights.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("covid_insights.log"));

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
        Commands::Report {
            input,
            out_dir,
            config,
            as_of,
            window,
            wave_window,
            top,
            min_population,
            high_threshold,
            low_threshold,
            include_aggregates,
            export_csv,
        } => {
            let mut settings = match config {
                Some(path) => AnalysisConfig::load(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => AnalysisConfig::default(),
            };

            // CLI flags override the file
            if as_of.is_some() {
                settings.as_of = as_of;
            }
            if let Some(window) = window {
                settings.trend_window = window;
            }
            if let Some(wave_window) = wave_window {
                settings.wave_window = wave_window;
            }
            if let Some(top) = top {
                settings.top_n = top;
            }
            if let Some(min_population) = min_population {
                settings.min_population = min_population;
            }
            if let Some(high) = high_threshold {
                settings.high_threshold = high;
            }
            if let Some(low) = low_threshold {
                settings.low_threshold = low;
            }
            if include_aggregates {
                settings.exclude_aggregates = false;
            }

            run_report(&input, &out_dir, &settings, export_csv)?;
        }
        Commands::Snapshot {
            input,
            country,
            as_of,
        } => {
            run_snapshot(&input, &country, as_of)?;
        }
        Commands::Overview { input } => {
            run_overview(&input)?;
        }
        Commands::Fetch { url, output } => {
            let client = BasicClient::new().context("building HTTP client")?;
            download_dataset(&client, &url, &output).await?;
        }
    }

    Ok(())
}

#[tracing::instrument(
    skip_all,
    fields(input = %input.display(), out_dir = %out_dir.display(), export_csv)
)]
fn run_report(
    input: &Path,
    out_dir: &Path,
    settings: &AnalysisConfig,
    export_csv: bool,
) -> Result<()> {
    let parsed = load_table(input)?;
    let report = build_report(&parsed.table, settings)?;

    print_summary(&report);
    let artifacts = write_artifacts(&report, out_dir, export_csv)?;

    info!(
        report = %artifacts.report.display(),
        summary = %artifacts.summary.display(),
        "Report complete"
    );
    Ok(())
}

#[tracing::instrument(skip(input), fields(input = %input.display()))]
fn run_snapshot(input: &Path, country: &str, as_of: Option<NaiveDate>) -> Result<()> {
    let parsed = load_table(input)?;
    let aggregator = StatsAggregator::new(&parsed.table);

    let Some(snapshot) = aggregator.country_snapshot(country, as_of) else {
        bail!("no data for {} on or before the requested date", country);
    };

    info!(
        country = %snapshot.country,
        date = %snapshot.date,
        total_cases = %snapshot.total_cases.map(format_count).unwrap_or_default(),
        total_deaths = %snapshot.total_deaths.map(format_count).unwrap_or_default(),
        new_cases = ?snapshot.new_cases,
        new_deaths = ?snapshot.new_deaths,
        mortality = %format_fraction_pct(snapshot.mortality_rate),
        fully_vaccinated = %format_pct(snapshot.vaccination_rate.percent()),
        "Country snapshot"
    );
    Ok(())
}

#[tracing::instrument(skip(input), fields(input = %input.display()))]
fn run_overview(input: &Path) -> Result<()> {
    let parsed = load_table(input)?;
    let overview = parsed.table.overview();

    info!(
        rows = overview.rows,
        skipped_rows = parsed.skipped_rows,
        entities = overview.entities,
        aggregate_entities = overview.aggregate_entities,
        first_date = ?overview.first_date,
        last_date = ?overview.last_date,
        "Dataset overview"
    );

    for column in overview.missing.iter().filter(|m| m.missing > 0) {
        warn!(column = %column.column, missing = column.missing, "Missing values");
    }
    Ok(())
}
