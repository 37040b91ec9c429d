//! Validate command - import every emitter and task entry of a scene

use anyhow::{bail, Context, Result};
use warp_sim::SceneFile;

pub fn run(scene_path: &str) -> Result<()> {
    let content = std::fs::read_to_string(scene_path)
        .with_context(|| format!("Failed to read {}", scene_path))?;
    let scene: SceneFile = content
        .parse()
        .with_context(|| format!("Failed to parse {}", scene_path))?;

    let issues = scene.validate();
    if issues.is_empty() {
        println!(
            "{}: {} node(s), {} task(s), no problems",
            scene.scene.name,
            scene.nodes.len(),
            scene.tasks.len()
        );
        return Ok(());
    }

    println!("{}:", scene.scene.name);
    for issue in &issues {
        let kind = if issue.error.is_configuration() {
            "config"
        } else {
            "scene"
        };
        println!("  [{}] {}: {}", kind, issue.location, issue.error);
    }
    bail!("{} problem(s) in {}", issues.len(), scene_path)
}
