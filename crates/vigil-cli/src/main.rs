use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vigil_core::{
    AlignmentClassifier, BoxCenteringAlignment, LandmarkAlignment, NullOverlay, Overlay,
};

mod config;
mod overlay;
mod runner;

use runner::{GazeInput, SessionPlan};

/// Exam proctoring monitor: counts suspicious behaviour during a timed test
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a proctored session over recorded detections
    Run(RunArgs),
    /// Print the effective configuration as TOML
    Config {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// detection log (JSON lines, one record per frame)
    #[arg(short, long)]
    detections: PathBuf,

    /// directory of captured frames matching the detection log
    #[arg(short, long)]
    frames: Option<PathBuf>,

    /// frame rate of the captured frames
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// flip frames horizontally, as a webcam preview does
    #[arg(long)]
    mirror: bool,

    /// play frames back at capture speed
    #[arg(long)]
    realtime: bool,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// override test_duration_seconds
    #[arg(long)]
    duration: Option<f64>,

    /// override max_violations
    #[arg(long)]
    max_violations: Option<u32>,

    /// how head alignment is judged
    #[arg(long, value_enum, default_value_t = AlignmentMode::BoxCentering)]
    alignment: AlignmentMode,

    /// where gaze answers come from
    #[arg(long, value_enum, default_value_t = GazeMode::Recorded)]
    gaze: GazeMode,

    /// how status text is shown while the session runs
    #[arg(long, value_enum, default_value_t = OverlayMode::Terminal)]
    overlay: OverlayMode,

    /// print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum AlignmentMode {
    /// face box centred in the frame
    #[value(name = "box")]
    BoxCentering,
    /// nose and eye landmark geometry
    Landmarks,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum GazeMode {
    Recorded,
    Landmarks,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OverlayMode {
    Terminal,
    Log,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Config { config: path } => {
            let cfg = config::load(path.as_deref())?;
            print!("{}", toml::to_string(&cfg).context("failed to render configuration")?);
            Ok(())
        }
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let mut cfg = config::load(args.config.as_deref())?;
    if let Some(duration) = args.duration {
        cfg.test_duration_seconds = duration;
    }
    if let Some(max) = args.max_violations {
        cfg.max_violations = max;
    }
    cfg.validate().context("invalid session configuration")?;

    let alignment: Box<dyn AlignmentClassifier> = match args.alignment {
        AlignmentMode::BoxCentering => Box::new(BoxCenteringAlignment::default()),
        AlignmentMode::Landmarks => Box::new(LandmarkAlignment::default()),
    };
    let overlay: Box<dyn Overlay> = match args.overlay {
        OverlayMode::Terminal => Box::new(overlay::TerminalOverlay::default()),
        OverlayMode::Log => Box::new(overlay::LogOverlay),
        OverlayMode::Off => Box::new(NullOverlay),
    };

    let plan = SessionPlan {
        config: cfg,
        detections: args.detections,
        frames: args.frames,
        fps: args.fps,
        mirror: args.mirror,
        realtime: args.realtime,
        alignment,
        gaze: match args.gaze {
            GazeMode::Recorded => GazeInput::Recorded,
            GazeMode::Landmarks => GazeInput::Landmarks,
        },
        overlay,
    };

    let handle = runner::spawn_session(plan).context("failed to start session")?;
    let summary = handle.wait().await.context("session failed")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("failed to encode summary")?
        );
    } else {
        print!("{summary}");
    }

    Ok(())
}
