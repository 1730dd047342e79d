//! Instrument Cluster Simulator CLI
//!
//! One binary, four roles:
//! - `cluster`: receive frames and display the reconstructed vehicle state
//! - `controls`: turn operator commands into frames
//! - `replay`: loop a captured log onto the bus (background traffic)
//! - `layout`: print the frame layout a seed and difficulty produce

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use icsim_core::{
    ControlPanel, DifficultyLevel, InstrumentCluster, LayoutGenerator, OperatorIntent, SimConfig,
    TickSource, TrafficLog, UdpBus, WallClock,
};
use std::path::PathBuf;
use std::sync::Arc;

mod config;
mod input;
mod player;
mod render;

use config::{AppConfig, Overrides};
use render::{LogRenderer, Renderer, TextRenderer};

/// ICSim - vehicle bus simulator for reverse-engineering practice
#[derive(Parser, Debug)]
#[command(name = "icsim")]
#[command(
    about = "Instrument cluster and control panel over a virtual vehicle bus",
    long_about = None
)]
#[command(version)]
struct Args {
    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the instrument cluster (receiving side)
    Cluster(ClusterArgs),
    /// Run the control panel (sending side)
    Controls(ControlsArgs),
    /// Replay a candump log onto the bus
    Replay(ReplayArgs),
    /// Print the layout derived from a seed
    Layout(LayoutArgs),
}

#[derive(ClapArgs, Debug)]
struct ClusterArgs {
    /// Bus device to listen on (host:port)
    device: String,

    /// Seed for the frame layout
    #[arg(
        short,
        long,
        allow_negative_numbers = true,
        conflicts_with_all = ["randomize", "seed_file"]
    )]
    seed: Option<i32>,

    /// Pick a seed from the clock and publish it in the seed file
    #[arg(short, long)]
    randomize: bool,

    /// Read the seed from a file (with -r: where to publish it)
    #[arg(long, value_name = "FILE")]
    seed_file: Option<PathBuf>,

    /// Difficulty: 0 none, 1 padded frames, 2 randomized unused bytes
    #[arg(short = 'l', long, value_name = "LEVEL")]
    difficulty: Option<u8>,

    /// Full-screen text dashboard instead of log lines
    #[arg(short, long)]
    text: bool,

    /// Print state changes as JSON lines
    #[arg(long, conflicts_with = "text")]
    json: bool,
}

#[derive(ClapArgs, Debug)]
struct ControlsArgs {
    /// Bus device to send to (host:port)
    device: String,

    /// Seed for the frame layout (must match the cluster)
    #[arg(short, long, allow_negative_numbers = true, conflicts_with = "seed_file")]
    seed: Option<i32>,

    /// Read the seed from a file (as written by `cluster -r`)
    #[arg(long, value_name = "FILE")]
    seed_file: Option<PathBuf>,

    /// Difficulty (must match the cluster)
    #[arg(short = 'l', long, value_name = "LEVEL")]
    difficulty: Option<u8>,

    /// Background traffic log to replay
    #[arg(long, value_name = "FILE", conflicts_with = "no_traffic")]
    traffic: Option<PathBuf>,

    /// Run without background traffic
    #[arg(long)]
    no_traffic: bool,

    /// Control loop poll interval in milliseconds
    #[arg(long, value_name = "MS")]
    poll_ms: Option<u64>,
}

#[derive(ClapArgs, Debug)]
struct ReplayArgs {
    /// Bus device to send to (host:port)
    device: String,

    /// candump log to replay
    #[arg(short = 'I', long, value_name = "FILE")]
    input: PathBuf,

    /// Number of passes over the log, or "infinite"
    #[arg(long, default_value = "1", value_parser = parse_loops)]
    loops: Loops,
}

#[derive(ClapArgs, Debug)]
struct LayoutArgs {
    /// Seed (0 gives the fixed default layout)
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    seed: i32,

    /// Difficulty level
    #[arg(short = 'l', long, default_value_t = 0, value_name = "LEVEL")]
    difficulty: u8,

    /// Print as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Loops {
    Count(u64),
    Infinite,
}

fn parse_loops(text: &str) -> std::result::Result<Loops, String> {
    if text.eq_ignore_ascii_case("infinite") {
        return Ok(Loops::Infinite);
    }
    match text.parse::<u64>() {
        Ok(0) => Err("loop count must be at least 1".to_string()),
        Ok(count) => Ok(Loops::Count(count)),
        Err(_) => Err(format!("expected a number or 'infinite', got '{}'", text)),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("ICSim v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using simulator core v{}", icsim_core::VERSION);

    let app = config::load_or_default(args.config.as_deref())?;

    match args.command {
        Command::Cluster(cmd) => run_cluster(&app, cmd),
        Command::Controls(cmd) => run_controls(&app, cmd),
        Command::Replay(cmd) => run_replay(cmd),
        Command::Layout(cmd) => show_layout(cmd),
    }
}

/// Seed chosen on the command line; `-r` publishes a fresh one to the seed file
fn cluster_seed(app: &AppConfig, cmd: &ClusterArgs) -> Result<Option<i32>> {
    if !cmd.randomize {
        return Ok(cmd.seed);
    }
    let path = cmd.seed_file.as_deref().unwrap_or(app.cluster.seed_file.as_path());
    let seed = config::clock_seed();
    config::write_seed_file(path, seed)?;
    log::info!("Seed: {} (saved to {:?})", seed, path);
    Ok(Some(seed))
}

/// Receive frames forever and redraw on every accepted one
fn run_cluster(app: &AppConfig, cmd: ClusterArgs) -> Result<()> {
    let seed = cluster_seed(app, &cmd)?;

    let sim = config::resolve(
        &app.simulation,
        Overrides {
            seed,
            seed_file: cmd.seed_file.as_deref(),
            difficulty: cmd.difficulty,
            poll_ms: None,
        },
    )?;
    log_session("Cluster", &sim);

    let bus = UdpBus::listen(&cmd.device)
        .with_context(|| format!("Failed to open bus device '{}'", cmd.device))?;
    let mut cluster = InstrumentCluster::new(&sim, bus);

    let mut renderer: Box<dyn Renderer> = if cmd.text || app.cluster.text_mode {
        Box::new(TextRenderer::stdout())
    } else {
        Box::new(LogRenderer::new(cmd.json || app.cluster.json))
    };
    renderer.redraw(cluster.state())?;

    loop {
        match cluster.step() {
            Ok(applied) if applied.any() => renderer.redraw(cluster.state())?,
            Ok(_) => {}
            Err(e) if e.is_recoverable() => log::warn!("Dropped frame: {}", e),
            Err(e) => return Err(e).context("Bus receive failed"),
        }
    }
}

/// Poll operator intent and send frames until the operator quits
fn run_controls(app: &AppConfig, cmd: ControlsArgs) -> Result<()> {
    let sim = config::resolve(
        &app.simulation,
        Overrides {
            seed: cmd.seed,
            seed_file: cmd.seed_file.as_deref(),
            difficulty: cmd.difficulty,
            poll_ms: cmd.poll_ms,
        },
    )?;
    log_session("Control panel", &sim);

    let bus = UdpBus::connect(&cmd.device)
        .with_context(|| format!("Failed to open bus device '{}'", cmd.device))?;
    let mut panel = ControlPanel::new(&sim, bus);

    let _player = if cmd.no_traffic || !(app.controls.play_traffic || cmd.traffic.is_some()) {
        log::info!("Background traffic disabled");
        None
    } else {
        let traffic = cmd.traffic.as_deref().unwrap_or(&app.controls.traffic_file);
        player::TrafficPlayer::try_spawn(&cmd.device, traffic)
    };

    let intent = Arc::new(OperatorIntent::new());
    input::spawn_stdin_reader(Arc::clone(&intent)).context("Failed to start input thread")?;
    println!("Commands: w/s/h throttle, a/d/x indicators, u<n>/l<n>/U/L doors, q quit");

    let mut clock = WallClock::new();
    while intent.is_running() {
        panel.tick(clock.elapsed(), &intent);
        clock.pause(sim.poll_interval());
    }

    let stats = panel.stats();
    log::info!(
        "Control panel stopped: {} frames sent, {} send failures",
        stats.frames_sent,
        stats.send_failures
    );
    Ok(())
}

fn run_replay(cmd: ReplayArgs) -> Result<()> {
    let traffic = TrafficLog::load(&cmd.input)
        .with_context(|| format!("Failed to load traffic log: {:?}", cmd.input))?;
    if traffic.is_empty() {
        bail!("Traffic log {:?} holds no frames", cmd.input);
    }

    let mut bus = UdpBus::connect(&cmd.device)
        .with_context(|| format!("Failed to open bus device '{}'", cmd.device))?;
    let mut clock = WallClock::new();

    let mut pass = 0u64;
    let mut total = 0u64;
    while cmd.loops == Loops::Infinite || Loops::Count(pass) != cmd.loops {
        total += traffic.replay(&mut bus, &mut clock, || true);
        pass += 1;
        log::debug!("Replay pass {} done ({} frames so far)", pass, total);
    }

    log::info!("Replayed {} frames in {} passes", total, pass);
    Ok(())
}

fn show_layout(cmd: LayoutArgs) -> Result<()> {
    let difficulty = DifficultyLevel::try_from(cmd.difficulty)?;
    let layout = LayoutGenerator::generate(cmd.seed, difficulty);

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&layout)?);
    } else {
        println!("Seed {} / difficulty {}", cmd.seed, difficulty);
        println!("  door:   {}", layout.door);
        println!("  signal: {}", layout.turn);
        println!("  speed:  {}", layout.speed);
    }
    Ok(())
}

fn log_session(role: &str, sim: &SimConfig) {
    if sim.is_randomized() {
        log::info!("{} using seed {} at difficulty {}", role, sim.seed, sim.difficulty);
    } else {
        log::info!("{} using the default layout at difficulty {}", role, sim.difficulty);
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(buf, "[{} {}] {}", record.level(), record.target(), record.args())
        })
        .init();
}
