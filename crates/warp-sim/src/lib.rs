//! Warp Sim - the simulation world and its scene format
//!
//! - `World` - nodes, time, tasks, particles and scripts stepped together
//! - `SceneFile` - TOML scene description that builds a `World`
//! - `SimConfig` - layered simulation settings

mod config;
mod scene;
mod world;

pub use config::{ParticleSettings, SimConfig, WarpSettings};
pub use scene::{
    load_scene, load_scene_string, NodeDef, SceneFile, SceneIssue, SceneMetadata, TaskDef,
};
pub use world::{FrameStats, World};
