//! tapeloc CLI: offline tape detection and odometry replay.

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tapeloc::detect::{detect_image, detect_image_with_edges, load_image};
use tapeloc::replay::{replay, TickLog};
use tapeloc::TapelocConfig;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "tapeloc")]
#[command(about = "Detect tape landmarks in images and replay tracking-wheel odometry logs")]
#[command(version)]
struct Cli {
    /// Log debug output.
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit structured JSON logs (requires the `tracing` feature).
    #[arg(long, global = true)]
    json_log: bool,

    /// Log filter such as `info,tapeloc_odometry=debug`; overrides `--verbose`.
    #[arg(id = "log_filter", long = "log", global = true, value_name = "FILTER")]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the tape landmark in one or more images of the same size.
    Detect(DetectArgs),

    /// Run the localizer over a recorded tick log.
    Replay(ReplayArgs),

    /// Print or write the default configuration.
    DefaultConfig {
        /// Write to this path instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
struct DetectArgs {
    /// Input images.
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// JSON config; defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the per-image reports here (JSON array) instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Directory for edge map PNGs, one per input image.
    #[arg(long)]
    edges_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct ReplayArgs {
    /// Tick log (JSON).
    log: PathBuf,

    /// JSON config; defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the trajectory here (JSON) instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Serialize)]
struct ImageReport {
    image: String,
    #[serde(flatten)]
    report: tapeloc::vision::FrameReport,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_log, cli.log.as_deref())?;

    match cli.command {
        Commands::Detect(args) => run_detect(&args),
        Commands::Replay(args) => run_replay(&args),
        Commands::DefaultConfig { out } => run_default_config(out.as_deref()),
    }
}

#[cfg(feature = "tracing")]
fn init_logging(verbose: bool, json: bool, filter: Option<&str>) -> CliResult<()> {
    let filter = filter.or(verbose.then_some("debug"));
    tapeloc::core::init_tracing(json, filter);
    Ok(())
}

#[cfg(not(feature = "tracing"))]
fn init_logging(verbose: bool, json: bool, filter: Option<&str>) -> CliResult<()> {
    use log::LevelFilter;
    use tapeloc::core::LogFilter;

    if json {
        return Err("--json-log requires the `tracing` feature".into());
    }
    let filter = match filter {
        Some(spec) => spec.parse()?,
        None if verbose => LogFilter::new(LevelFilter::Debug),
        None => LogFilter::new(LevelFilter::Info),
    };
    tapeloc::core::init_with_filter(filter)?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> CliResult<TapelocConfig> {
    match path {
        Some(path) => {
            log::info!("loading config {}", path.display());
            Ok(TapelocConfig::load_json(path)?)
        }
        None => Ok(TapelocConfig::default()),
    }
}

fn emit_json<T: Serialize>(value: &T, out: Option<&Path>) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            fs::write(path, json)?;
            log::info!("wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn run_detect(args: &DetectArgs) -> CliResult<()> {
    let config = load_config(args.config.as_deref())?;
    let detector = config.build_detector()?;
    if let Some(dir) = &args.edges_dir {
        fs::create_dir_all(dir)?;
    }

    let mut reports = Vec::with_capacity(args.images.len());
    for path in &args.images {
        let img = load_image(path)?;
        let report = match &args.edges_dir {
            Some(dir) => {
                let (report, edges) = detect_image_with_edges(&detector, &img)?;
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "frame".to_string());
                let edge_path = dir.join(format!("{stem}_edges.png"));
                edges.save(&edge_path)?;
                log::debug!("edge map written to {}", edge_path.display());
                report
            }
            None => detect_image(&detector, &img)?,
        };
        log::info!(
            "{}: valid={} center={:.1} angle={:.2} correction={:.3} ({} of {} segments, {:.1} ms)",
            path.display(),
            report.estimate.valid,
            report.estimate.pixel_center,
            report.estimate.angle_degrees,
            report.estimate.correction,
            report.diagnostics.kept_segments,
            report.diagnostics.raw_segments,
            report.diagnostics.timings.total_ms
        );

        reports.push(ImageReport {
            image: path.display().to_string(),
            report,
        });
    }

    emit_json(&reports, args.out.as_deref())
}

fn run_replay(args: &ReplayArgs) -> CliResult<()> {
    let config = load_config(args.config.as_deref())?;
    let mut localizer = config.build_localizer()?;
    let raw = fs::read_to_string(&args.log)?;
    let log: TickLog = serde_json::from_str(&raw)?;
    log::info!("replaying {} ticks from {}", log.ticks.len(), args.log.display());

    let trajectory = replay(&mut localizer, &log)?;
    if let Some(last) = trajectory.last() {
        log::info!(
            "final pose: ({:.3}, {:.3}, {:.4} rad)",
            last.pose.x,
            last.pose.y,
            last.pose.heading
        );
    }
    emit_json(&trajectory, args.out.as_deref())
}

fn run_default_config(out: Option<&Path>) -> CliResult<()> {
    let config = TapelocConfig::default();
    match out {
        Some(path) => {
            config.write_json(path)?;
            log::info!("wrote {}", path.display());
            Ok(())
        }
        None => emit_json(&config, None),
    }
}
