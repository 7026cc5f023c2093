use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};

use trailsync::analysis::{ActivitySummary, summarize};
use trailsync::gpx_types::ActivityType;
use trailsync::options::{NormalizeOptions, RunkeeperOptions, ServiceChoice};
use trailsync::pipeline::{self, CONVERTED_SUFFIX, RUNKEEPER_SUFFIX};
use trailsync::runkeeper_export;

#[derive(Parser)]
#[command(
    name = "trailsync",
    version,
    about = "Normalize GPX exports from Yamareco, Strava and Runkeeper"
)]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a GPX file into the canonical format.
    Normalize(NormalizeArgs),
    /// Convert a Yamareco GPX file into a file Runkeeper imports as one activity.
    Runkeeper(RunkeeperArgs),
}

#[derive(Args)]
struct NormalizeArgs {
    input: PathBuf,

    /// Output path (default: <input>_converted.gpx)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Track name (default: taken from the file or generated)
    #[arg(short, long)]
    name: Option<String>,

    /// Activity type such as hiking, running or cycling (default: from the file, else hiking)
    #[arg(short = 't', long = "type")]
    activity_type: Option<String>,

    /// Normalize as this service instead of detecting it
    #[arg(long, value_enum)]
    service: Option<ServiceChoice>,

    /// Log an analysis of the activity dates
    #[arg(short, long)]
    analyze: bool,

    /// JSON file with normalize options; flags override it
    #[arg(long)]
    options: Option<PathBuf>,
}

#[derive(Args)]
struct RunkeeperArgs {
    input: PathBuf,

    /// Output path (default: <input>_runkeeper.gpx)
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ActivityType::Hiking)]
    activity_type: ActivityType,

    /// Track name (default: "<Type> DD/MM/YY h:mm am|pm")
    #[arg(long)]
    track_name: Option<String>,

    /// Indent the output
    #[arg(long)]
    format_xml: bool,

    #[arg(long, default_value_t = 6)]
    coordinate_precision: u32,

    /// Meters added to every elevation
    #[arg(long, default_value_t = 5.2, allow_negative_numbers = true)]
    elevation_adjustment: f64,

    /// Leave out the <metadata> block
    #[arg(long)]
    no_metadata: bool,

    /// Leave out the source service record
    #[arg(long)]
    no_source: bool,

    /// Produce the minimal layout; other conversion flags are ignored
    #[arg(long)]
    basic: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Normalize(args) => run_normalize(args),
        Command::Runkeeper(args) => run_runkeeper(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

fn ensure_exists(input: &Path) -> anyhow::Result<()> {
    if !input.is_file() {
        bail!("file '{}' not found", input.display());
    }
    Ok(())
}

fn run_normalize(args: NormalizeArgs) -> anyhow::Result<()> {
    ensure_exists(&args.input)?;

    let mut opts = match &args.options {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading options file '{}'", path.display()))?;
            serde_json::from_str::<NormalizeOptions>(&text)
                .with_context(|| format!("parsing options file '{}'", path.display()))?
        }
        None => NormalizeOptions::default(),
    };
    if args.name.is_some() {
        opts.track_name = args.name;
    }
    if args.activity_type.is_some() {
        opts.activity_type = args.activity_type;
    }
    if let Some(service) = args.service {
        opts.service = service;
    }

    let output = args
        .output
        .unwrap_or_else(|| pipeline::default_output_path(&args.input, CONVERTED_SUFFIX));

    tracing::info!("parsing '{}'", args.input.display());
    let doc = pipeline::normalize_path(&args.input, &output, &opts)
        .with_context(|| format!("converting '{}'", args.input.display()))?;
    tracing::info!("wrote '{}'", output.display());

    let summary = summarize(&doc);
    if args.analyze {
        log_analysis(&summary);
    }
    log_statistics(&summary);
    Ok(())
}

fn run_runkeeper(args: RunkeeperArgs) -> anyhow::Result<()> {
    ensure_exists(&args.input)?;

    let opts = if args.basic {
        RunkeeperOptions::basic()
    } else {
        RunkeeperOptions {
            activity_type: Some(args.activity_type),
            track_name: args.track_name,
            format_xml: args.format_xml,
            coordinate_precision: args.coordinate_precision,
            elevation_adjustment: args.elevation_adjustment,
            add_metadata: !args.no_metadata,
            keep_source: !args.no_source,
            ..RunkeeperOptions::default()
        }
    };

    let output = args
        .output
        .unwrap_or_else(|| pipeline::default_output_path(&args.input, RUNKEEPER_SUFFIX));

    if !runkeeper_export::convert(&args.input, &output, &opts) {
        bail!("conversion of '{}' failed", args.input.display());
    }
    tracing::info!("wrote '{}'", output.display());
    Ok(())
}

fn log_analysis(summary: &ActivitySummary) {
    tracing::info!("creator: {}", summary.creator);
    tracing::info!("tracks: {}", summary.tracks.len());
    for (i, track) in summary.tracks.iter().enumerate() {
        tracing::info!(
            "  track {}: name={} type={} points={}",
            i + 1,
            track.name.as_deref().unwrap_or("-"),
            track.track_type.as_deref().unwrap_or("-"),
            track.points
        );
    }
    if let (Some(start), Some(end), Some(span)) = (summary.start, summary.end, summary.span_days) {
        tracing::info!("start: {}", start.format("%Y-%m-%d %H:%M:%S"));
        tracing::info!("end: {}", end.format("%Y-%m-%d %H:%M:%S"));
        tracing::info!("span: {span} days over {} dates", summary.unique_dates());
        for (date, count) in &summary.points_per_date {
            tracing::info!("  {date}: {count} points");
        }
    }
}

fn log_statistics(summary: &ActivitySummary) {
    tracing::info!("points: {}", summary.point_count);
    if let Some(duration) = summary.duration_label() {
        tracing::info!("duration: {duration}");
    }
}
