//! Run command - step a scene headless with an optional warp window

use anyhow::{Context, Result};
use std::ops::Range;
use std::path::Path;
use warp_runtime::{GameClock, TimeWarp};
use warp_sim::{load_scene, FrameStats, SimConfig};

pub struct RunArgs {
    pub scene: String,
    pub frames: u64,
    pub dt: f64,
    pub warp: Option<f32>,
    pub warp_from: Option<u64>,
    pub warp_to: Option<u64>,
    pub config: Option<String>,
    pub report_every: u64,
}

/// Frames with the warp engaged, if any warp option was given
fn warp_window(args: &RunArgs) -> Option<Range<u64>> {
    if args.warp.is_none() && args.warp_from.is_none() && args.warp_to.is_none() {
        return None;
    }
    let start = args.warp_from.unwrap_or(0);
    let end = args.warp_to.unwrap_or(args.frames);
    Some(start..end)
}

fn load_config(args: &RunArgs) -> Result<SimConfig> {
    let mut config = match &args.config {
        Some(path) => SimConfig::load(Path::new(path))
            .with_context(|| format!("Failed to load config {}", path))?,
        None => {
            let mut config = SimConfig::default();
            config.apply_env_overrides();
            config
        }
    };
    if let Some(factor) = args.warp {
        config.warp.factor = factor;
    }
    Ok(config)
}

fn print_stats(stats: &FrameStats, sim_time: f64) {
    println!(
        "frame {:>5}  dilation {:>5.2}  sim {:>8.3}s  tasks {:>3} (+{} pending)  emitters {:>2}  particles {:>5}",
        stats.frame,
        stats.dilation,
        sim_time,
        stats.active_tasks,
        stats.pending_tasks,
        stats.emitters,
        stats.particles
    );
}

pub fn run(args: RunArgs) -> Result<()> {
    let config = load_config(&args)?;
    let (mut world, scene) = load_scene(&args.scene, &config)
        .with_context(|| format!("Failed to load scene {}", args.scene))?;

    println!("Loaded scene: {}", scene.scene.name);
    println!("Nodes: {}  Tasks: {}", scene.nodes.len(), scene.tasks.len());

    let mut clock = GameClock::with_max_frame_time(config.max_frame_time);
    let mut warp = TimeWarp::new(config.warp.factor, config.warp.ramp_time)?;
    let window = warp_window(&args);
    if let Some(w) = &window {
        println!(
            "Warp x{} over frames {}..{} (ramp {}s)",
            config.warp.factor, w.start, w.end, config.warp.ramp_time
        );
    }
    println!();
    tracing::debug!(frames = args.frames, dt = args.dt, seed = config.seed, "starting run");

    let mut sim_time = 0.0_f64;
    let mut last = FrameStats::default();
    for frame in 0..args.frames {
        let real = clock.advance(args.dt) as f32;
        let engaged = window.as_ref().is_some_and(|w| w.contains(&frame));
        world.set_dilation(warp.update(engaged, real))?;

        last = world.update(real)?;
        sim_time += last.scaled_elapsed as f64;
        if args.report_every > 0 && last.frame % args.report_every == 0 {
            print_stats(&last, sim_time);
        }
    }

    println!();
    println!(
        "Simulated {} frames: {:.3}s real, {:.3}s scaled",
        last.frame, clock.total_time, sim_time
    );
    print_stats(&last, sim_time);
    for def in &scene.nodes {
        match world.nodes().find(&def.name) {
            Some(node) => {
                let p = world.nodes().position(node).unwrap_or_default();
                println!("  {:<16} ({:.3}, {:.3}, {:.3})", def.name, p.x, p.y, p.z);
            }
            None => println!("  {:<16} (despawned)", def.name),
        }
    }

    world.shutdown()?;
    Ok(())
}
