//! World - everything a frame touches, stepped in a fixed order

use crate::config::SimConfig;
use warp_core::{Result, Vec3, WarpError};
use warp_particles::{EmitterConfig, EmitterId, ParticleSystem};
use warp_runtime::{RuntimeSystem, TimeContext};
use warp_script::{ScriptContext, ScriptHost};
use warp_tasks::{Task, TaskHandle, TaskScheduler};
use warp_world::{NodeHandle, NodeWorld};

/// Summary of one `World::update`
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    pub frame: u64,
    pub real_elapsed: f32,
    pub dilation: f32,
    pub scaled_elapsed: f32,
    pub active_tasks: usize,
    pub pending_tasks: usize,
    pub emitters: usize,
    pub particles: usize,
}

/// Owns the node world and every system that runs on it.
///
/// Per frame: tasks first (scripts included), then particles, so emitters see
/// node positions after this frame's moves.
pub struct World {
    nodes: NodeWorld,
    time: TimeContext,
    scheduler: TaskScheduler,
    particles: ParticleSystem,
    scripts: ScriptHost,
    frame: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::new(&SimConfig::default())
    }
}

impl World {
    pub fn new(config: &SimConfig) -> Self {
        let scheduler = TaskScheduler::new();
        let scripts = ScriptHost::new(scheduler.registry());
        Self {
            nodes: NodeWorld::new(),
            time: TimeContext::new(),
            scheduler,
            particles: ParticleSystem::new(config.seed),
            scripts,
            frame: 0,
        }
    }

    pub fn nodes(&self) -> &NodeWorld {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut NodeWorld {
        &mut self.nodes
    }

    pub fn time(&self) -> &TimeContext {
        &self.time
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut TaskScheduler {
        &mut self.scheduler
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut ParticleSystem {
        &mut self.particles
    }

    pub fn scripts(&self) -> &ScriptHost {
        &self.scripts
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn spawn_node(&mut self, name: &str, position: Vec3) -> Result<NodeHandle> {
        self.nodes.spawn(name, position)
    }

    /// Takes effect from the next `update`
    pub fn set_dilation(&mut self, dilation: f32) -> Result<()> {
        self.time.set_dilation(dilation)
    }

    pub fn spawn_task(&mut self, task: impl Task + 'static) -> TaskHandle {
        self.scheduler.spawn(task)
    }

    pub fn run_script(
        &mut self,
        name: &str,
        source: &str,
        context: ScriptContext,
    ) -> Result<TaskHandle> {
        self.scripts.run_inline(name, source, context)
    }

    pub fn attach_emitter(&mut self, node: NodeHandle, config: EmitterConfig) -> Result<EmitterId> {
        if !self.nodes.is_valid(node) {
            return Err(WarpError::NodeNotFound(format!("{:?}", node)));
        }
        // Seed the node's controls now so ramp tasks see them on the first frame
        if self.nodes.emitter_controls(node).is_none() {
            self.nodes.set_emitter_controls(node, config.controls());
        }
        Ok(self.particles.attach(node, config))
    }

    /// Advance one frame by `real_elapsed` wall-clock seconds
    pub fn update(&mut self, real_elapsed: f32) -> Result<FrameStats> {
        self.time.begin_frame(real_elapsed);
        self.scripts.set_frame(&self.time);

        self.scheduler.update(&mut self.nodes, &self.time)?;
        self.particles.update(&mut self.nodes, &self.time)?;

        self.frame += 1;
        let stats = FrameStats {
            frame: self.frame,
            real_elapsed: self.time.real_elapsed(),
            dilation: self.time.dilation(),
            scaled_elapsed: self.time.scaled_elapsed(),
            active_tasks: self.scheduler.active_count(),
            pending_tasks: self.scheduler.pending_count(),
            emitters: self.particles.emitter_count(),
            particles: self.particles.total_alive(),
        };
        tracing::trace!(
            frame = stats.frame,
            dilation = stats.dilation,
            tasks = stats.active_tasks,
            particles = stats.particles,
            "frame"
        );
        Ok(stats)
    }

    /// Kill every task and drop every emitter
    pub fn shutdown(&mut self) -> Result<()> {
        self.scheduler.shutdown()?;
        self.particles.shutdown()?;
        tracing::debug!(frames = self.frame, "world shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp_tasks::{TaskOutcome, Translate, Wait};

    #[test]
    fn test_dilation_applies_from_next_update() {
        let mut world = World::default();
        let wait = world.spawn_task(Wait::new(1.0));

        world.set_dilation(0.5).unwrap();
        let stats = world.update(1.0).unwrap();
        assert_eq!(stats.frame, 1);
        assert!((stats.scaled_elapsed - 0.5).abs() < 1e-6);
        assert!(!world.scheduler().is_finished(wait).unwrap());

        world.update(1.0).unwrap();
        assert!(world.scheduler().is_finished(wait).unwrap());
    }

    #[test]
    fn test_invalid_dilation_is_rejected_and_kept() {
        let mut world = World::default();
        world.set_dilation(2.0).unwrap();
        assert!(matches!(
            world.set_dilation(0.0),
            Err(WarpError::InvalidDilation(_))
        ));
        assert_eq!(world.time().dilation(), 2.0);
    }

    #[test]
    fn test_tasks_run_before_particles() {
        let mut world = World::default();
        let node = world.spawn_node("torch", Vec3::ZERO).unwrap();
        world.spawn_task(Translate::new(node, Vec3::new(0.0, 5.0, 0.0), 0.0));
        let emitter = world
            .attach_emitter(
                node,
                EmitterConfig {
                    emission_rate: 0.0,
                    burst_count: 1,
                    speed_min: 0.0,
                    speed_max: 0.0,
                    ..EmitterConfig::default()
                },
            )
            .unwrap();

        world.update(0.1).unwrap();
        let particles = world.particles().particles(emitter).unwrap();
        assert_eq!(particles.len(), 1);
        assert_eq!(particles[0].position, Vec3::new(0.0, 5.0, 0.0));
    }

    #[test]
    fn test_attach_to_missing_node_fails() {
        let mut world = World::default();
        let node = world.spawn_node("gone", Vec3::ZERO).unwrap();
        world.nodes_mut().despawn(node).unwrap();
        assert!(matches!(
            world.attach_emitter(node, EmitterConfig::default()),
            Err(WarpError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_shutdown_kills_everything() {
        let mut world = World::default();
        let node = world.spawn_node("n", Vec3::ZERO).unwrap();
        let wait = world.spawn_task(Wait::new(100.0));
        let script = world
            .run_script(
                "idle",
                "fn on_update(dt) { false }",
                ScriptContext::default(),
            )
            .unwrap();
        world.attach_emitter(node, EmitterConfig::default()).unwrap();
        world.update(0.1).unwrap();

        world.shutdown().unwrap();
        assert_eq!(world.scheduler().active_count(), 0);
        assert_eq!(world.particles().emitter_count(), 0);
        assert_eq!(world.scheduler().status(wait).unwrap(), TaskOutcome::Killed);
        assert_eq!(world.scheduler().status(script).unwrap(), TaskOutcome::Killed);
    }
}
