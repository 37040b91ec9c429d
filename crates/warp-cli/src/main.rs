//! Warp CLI - headless driver for time-warped scenes

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{run, validate};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "warpsim")]
#[command(about = "Deterministic headless simulation of Warp scenes", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a scene for a fixed number of frames
    Run {
        /// Path to scene file
        scene: String,

        /// Number of frames to simulate
        #[arg(long, default_value_t = 120)]
        frames: u64,

        /// Real seconds per frame
        #[arg(long, default_value_t = 1.0 / 60.0)]
        dt: f64,

        /// Warp factor while the warp is engaged (overrides config)
        #[arg(long)]
        warp: Option<f32>,

        /// First frame with the warp engaged
        #[arg(long)]
        warp_from: Option<u64>,

        /// First frame after the warp is released
        #[arg(long)]
        warp_to: Option<u64>,

        /// Simulation config file
        #[arg(long)]
        config: Option<String>,

        /// Print a summary line every N frames (0 = only the final one)
        #[arg(long, default_value_t = 30)]
        report_every: u64,
    },

    /// Check every emitter and task in a scene without running it
    Validate {
        /// Path to scene file
        scene: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            scene,
            frames,
            dt,
            warp,
            warp_from,
            warp_to,
            config,
            report_every,
        } => run::run(run::RunArgs {
            scene,
            frames,
            dt,
            warp,
            warp_from,
            warp_to,
            config,
            report_every,
        }),
        Commands::Validate { scene } => validate::run(&scene),
    }
}
