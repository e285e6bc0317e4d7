mod frames;
#[cfg(feature = "opencv")]
mod opencv_io;
mod runner;
mod sim;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use gimbal_servo::{ControlMode, ServoConfig, ValidatedConfig};
use runner::{GateMode, RunOptions};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "servo_tester")]
#[command(about = "Drive the gimbal servo loop against simulated, recorded, or live video")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Closed-loop simulation: a colored disc on a virtual gimbal.
    Sim(SimArgs),

    /// Run over a directory of images and write annotated PNGs.
    Frames(FramesArgs),

    /// Run over a video file or camera and show a window.
    #[cfg(feature = "opencv")]
    Video(VideoArgs),
}

#[derive(Debug, Clone, Args)]
struct ServoArgs {
    /// TOML file with a full `ServoConfig`. Flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Lower HSV bound, "h,s,v".
    #[arg(long)]
    hsvlower: Option<String>,

    /// Upper HSV bound, "h,s,v".
    #[arg(long)]
    hsvupper: Option<String>,

    /// Proportional gain for both axes.
    #[arg(long)]
    kp: Option<f64>,

    /// Integral gain for both axes.
    #[arg(long)]
    ki: Option<f64>,

    /// Derivative gain for both axes.
    #[arg(long)]
    kd: Option<f64>,

    /// Skip actuation while both error components are inside this band.
    #[arg(long)]
    deadband: Option<f64>,

    /// Send commands in FPV mode instead of SDK mode.
    #[arg(long)]
    fpv: bool,

    /// What to do with frames that arrive while a cycle is in flight.
    #[arg(long, value_enum, default_value_t = GateArg::Drop)]
    gate: GateArg,

    /// Stop after this many completed cycles.
    #[arg(long)]
    max_frames: Option<u64>,

    /// Wait for the display to show each frame before finishing the cycle.
    #[arg(long)]
    blocking_display: bool,

    /// Write each cycle's segmentation mask to this directory as PNG.
    #[arg(long)]
    dump_masks: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GateArg {
    Drop,
    Queue,
}

#[derive(Debug, Clone, Args)]
struct SimArgs {
    #[command(flatten)]
    servo: ServoArgs,

    #[arg(long, default_value = "640")]
    width: u32,

    #[arg(long, default_value = "480")]
    height: u32,

    /// Starting target position in pixels.
    #[arg(long, default_value = "120.0")]
    start_x: f64,

    #[arg(long, default_value = "90.0")]
    start_y: f64,

    #[arg(long, default_value = "30.0")]
    radius: f64,

    /// Number of frames the simulated camera produces.
    #[arg(long, default_value = "60")]
    frames: u64,

    /// Simulated camera rate. 0 runs as fast as possible.
    #[arg(long, default_value = "30")]
    fps: u32,

    /// Write annotated frames here instead of discarding them.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct FramesArgs {
    #[command(flatten)]
    servo: ServoArgs,

    /// Directory of input images, processed in file-name order.
    #[arg(long)]
    input: PathBuf,

    /// Directory for annotated output PNGs.
    #[arg(long)]
    output: PathBuf,
}

#[cfg(feature = "opencv")]
#[derive(Debug, Clone, Args)]
struct VideoArgs {
    #[command(flatten)]
    servo: ServoArgs,

    /// Video file path, or a camera index such as "0".
    #[arg(long)]
    input: String,
}

impl ServoArgs {
    /// File (or defaults), then flags, then the source's resolution, validated once.
    fn resolve(&self, width: u32, height: u32) -> anyhow::Result<ValidatedConfig> {
        let mut config = match &self.config {
            Some(path) => ServoConfig::from_file(path)?,
            None => ServoConfig::default(),
        };
        self.apply(&mut config);
        config.width = width;
        config.height = height;
        config.validate().context("invalid servo configuration")
    }

    fn apply(&self, config: &mut ServoConfig) {
        if let Some(lower) = &self.hsvlower {
            config.hsv_lower = lower.clone();
        }
        if let Some(upper) = &self.hsvupper {
            config.hsv_upper = upper.clone();
        }
        for axis in [&mut config.yaw, &mut config.pitch] {
            if let Some(kp) = self.kp {
                axis.kp = kp;
            }
            if let Some(ki) = self.ki {
                axis.ki = ki;
            }
            if let Some(kd) = self.kd {
                axis.kd = kd;
            }
        }
        if let Some(deadband) = self.deadband {
            config.deadband = deadband;
        }
        if self.fpv {
            config.control_mode = ControlMode::Fpv;
        }
    }

    fn run_options(&self) -> RunOptions {
        RunOptions {
            gate: match self.gate {
                GateArg::Drop => GateMode::Drop,
                GateArg::Queue => GateMode::Queue,
            },
            max_frames: self.max_frames,
            blocking_display: self.blocking_display,
            mask_dir: self.dump_masks.clone(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Sim(args) => {
            let config = args.servo.resolve(args.width, args.height)?;
            let frame_interval =
                (args.fps > 0).then(|| Duration::from_secs_f64(1.0 / args.fps as f64));
            let scene = sim::SceneSetup {
                width: args.width,
                height: args.height,
                start: (args.start_x, args.start_y),
                radius: args.radius,
                frames: args.frames,
                frame_interval,
            };
            let outcome = sim::run(&config, scene, args.out.as_deref(), args.servo.run_options())?;
            info!(
                cycles = outcome.stats.cycles,
                commands = outcome.stats.commands_sent,
                dropped = outcome.dropped_frames,
                "simulation finished, target {:.1}px from center",
                outcome.final_offset
            );
        }
        Commands::Frames(args) => {
            let source = frames::ImageDirSource::open(&args.input)?;
            let (width, height) = source.resolution();
            let config = args.servo.resolve(width, height)?;
            let display = frames::PngDirDisplay::create(&args.output)?;
            let outcome = runner::run(
                &config,
                display,
                source,
                runner::LoggingTransport::default(),
                args.servo.run_options(),
            )?;
            info!(
                frames = outcome.frames_offered,
                cycles = outcome.stats.cycles,
                tracking = outcome.stats.tracking_cycles,
                superseded = outcome.superseded_frames,
                frame_errors = outcome.stats.frame_errors,
                "annotated frames written to {}",
                args.output.display()
            );
        }
        #[cfg(feature = "opencv")]
        Commands::Video(args) => {
            let source = opencv_io::VideoSource::open(&args.input)?;
            let (width, height) = source.resolution();
            let config = args.servo.resolve(width, height)?;
            let quit = gimbal_servo::QuitSignal::new();
            let display =
                opencv_io::WindowDisplay::new("servo_tester", (width, height), quit.clone())?;
            let outcome = runner::run_with_quit(
                &config,
                display,
                source,
                runner::LoggingTransport::default(),
                args.servo.run_options(),
                quit,
            )?;
            info!(
                frames = outcome.frames_offered,
                cycles = outcome.stats.cycles,
                dropped = outcome.dropped_frames,
                superseded = outcome.superseded_frames,
                "video finished"
            );
        }
    }
    Ok(())
}
