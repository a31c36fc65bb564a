//! Forecast Zarr creator.
//!
//! Reads one Harmonie GRIB2 forecast run and writes one consolidated
//! Zarr store per collection part.

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use zarr_creator::{load_creator_config, run, CreatorConfig, RunOptions};

const DEFAULT_ANALYSIS_TIME: &str = "2025-02-17T01:00:00Z";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Parser, Debug)]
#[command(name = "zarr-creator", version)]
#[command(about = "Create analysis-time Zarr stores from Harmonie GRIB2 forecasts")]
struct Args {
    /// Analysis time as ISO8601 string
    #[arg(long, default_value = DEFAULT_ANALYSIS_TIME, value_parser = parse_t_analysis)]
    t_analysis: DateTime<Utc>,

    /// Creator configuration file (built-in DINI collection when absent)
    #[arg(short, long, env = "ZARR_CREATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding one run directory per analysis time
    #[arg(long, env = "ZARR_CREATOR_SOURCE_ROOT")]
    source_root: Option<PathBuf>,

    /// chrono format of the run directory name
    #[arg(long)]
    run_dir_pattern: Option<String>,

    /// GRIB parameter table (YAML)
    #[arg(long)]
    definitions: Option<PathBuf>,

    /// Destination template, local path or s3:// URL
    #[arg(short, long, env = "ZARR_CREATOR_OUTPUT")]
    output: Option<String>,

    /// Ensemble member written into the destination
    #[arg(long)]
    member: Option<String>,

    /// S3 region
    #[arg(long, env = "ZARR_CREATOR_REGION")]
    region: Option<String>,

    /// Custom S3 endpoint
    #[arg(long, env = "ZARR_CREATOR_ENDPOINT")]
    endpoint: Option<String>,

    /// Also keep every store under this directory
    #[arg(long)]
    local_copy: Option<PathBuf>,

    /// Only build this part (repeatable)
    #[arg(long = "part")]
    parts: Vec<String>,

    /// Build and chunk-plan every part without writing
    #[arg(long)]
    dry_run: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "json")]
    log_format: LogFormat,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    /// Command-line values take precedence over the configuration file.
    fn apply(&self, config: &mut CreatorConfig) {
        if let Some(root) = &self.source_root {
            config.source.root = root.clone();
        }
        if let Some(pattern) = &self.run_dir_pattern {
            config.source.run_dir_pattern = pattern.clone();
        }
        if let Some(definitions) = &self.definitions {
            config.source.definitions = Some(definitions.clone());
        }
        if let Some(output) = &self.output {
            config.output.template = output.clone();
        }
        if let Some(member) = &self.member {
            config.output.member = member.clone();
        }
        if let Some(region) = &self.region {
            config.output.store.region = region.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            config.output.store.endpoint = Some(endpoint.clone());
        }
        if let Some(local_copy) = &self.local_copy {
            config.output.store.local_copy = Some(local_copy.clone());
        }
    }
}

fn parse_t_analysis(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid ISO8601 analysis time {s:?}: {e}"))
}

fn parse_log_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn init_tracing(args: &Args) -> Result<()> {
    let parsed = parse_log_level(&args.log_level);
    let level = parsed.unwrap_or(Level::INFO);

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true);

    let log_file = match &args.log_file {
        Some(path) => Some(Mutex::new(
            File::create(path).with_context(|| format!("Failed to create log file {path:?}"))?,
        )),
        None => None,
    };

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = match (log_file, args.log_format)
    {
        (Some(file), LogFormat::Json) => Box::new(builder.json().with_writer(file).finish()),
        (Some(file), LogFormat::Text) => {
            Box::new(builder.with_ansi(false).with_writer(file).finish())
        }
        (None, LogFormat::Json) => Box::new(builder.json().with_writer(std::io::stderr).finish()),
        (None, LogFormat::Text) => Box::new(builder.with_writer(std::io::stderr).finish()),
    };

    tracing::subscriber::set_global_default(subscriber)?;
    if parsed.is_none() {
        warn!(log_level = %args.log_level, "Unknown log level, using info");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args)?;

    info!(
        version = level_transform::VERSION,
        t_analysis = %args.t_analysis,
        "Starting zarr-creator"
    );

    let mut config = match &args.config {
        Some(path) => load_creator_config(path)?,
        None => CreatorConfig::default(),
    };
    config.output.store.apply_env();
    args.apply(&mut config);
    config.output.store.validate()?;

    let options = RunOptions {
        t_analysis: args.t_analysis,
        config,
        parts: args.parts.clone(),
        dry_run: args.dry_run,
    };

    let report = run(&options).await?;
    for line in report.to_string().lines() {
        info!("{line}");
    }

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        error!(failed = ?report.failed(), "Some parts failed");
        Ok(ExitCode::FAILURE)
    }
}
