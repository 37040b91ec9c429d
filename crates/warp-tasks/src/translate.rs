//! Move a node by an offset, over a dilated duration or at a dilated speed

use crate::easing::Easing;
use crate::task::{Task, TaskOutcome, TaskState};
use warp_core::Vec3;
use warp_runtime::{TimeDependency, TimeStep};
use warp_world::{NodeHandle, NodeWorld};

/// Interpolates a node from its position at the first update toward
/// `start + direction`
pub struct Translate {
    node: NodeHandle,
    direction: Vec3,
    duration: f32,
    dependency: TimeDependency,
    easing: Easing,
    priority: i32,
    start: Option<Vec3>,
    elapsed: f32,
    state: TaskState,
}

impl Translate {
    pub fn new(node: NodeHandle, direction: Vec3, duration: f32) -> Self {
        Self {
            node,
            direction,
            duration,
            dependency: TimeDependency::Duration,
            easing: Easing::Linear,
            priority: 0,
            start: None,
            elapsed: 0.0,
            state: TaskState::default(),
        }
    }

    /// Move at `speed` units per dilated second. The task is tagged
    /// speed-dependent, so it integrates real time scaled by the dilation.
    /// A non-positive speed jumps straight to the target.
    pub fn at_speed(node: NodeHandle, direction: Vec3, speed: f32) -> Self {
        let duration = if speed.is_finite() && speed > 0.0 {
            direction.length() / speed
        } else {
            0.0
        };
        Self {
            dependency: TimeDependency::Speed,
            ..Self::new(node, direction, duration)
        }
    }

    /// Dilated seconds the move takes
    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Interpolation parameter in [0, 1]
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            if self.start.is_some() {
                1.0
            } else {
                0.0
            }
        } else {
            (self.elapsed / self.duration).min(1.0)
        }
    }
}

impl Task for Translate {
    fn update(&mut self, step: &TimeStep, world: &mut NodeWorld) {
        if !self.state.is_running() {
            return;
        }
        let start = match self.start.or_else(|| world.position(self.node)) {
            Some(p) => p,
            None => {
                tracing::debug!(task = "translate", "target node lost");
                self.state.finish(TaskOutcome::TargetLost);
                return;
            }
        };
        self.start = Some(start);

        let t = if self.duration <= 0.0 {
            1.0
        } else {
            self.elapsed += step.scaled();
            (self.elapsed / self.duration).min(1.0)
        };

        let target = start + self.direction * self.easing.apply(t);
        if !world.set_position(self.node, target) {
            self.state.finish(TaskOutcome::TargetLost);
            return;
        }
        if t >= 1.0 {
            self.state.finish(TaskOutcome::Completed);
        }
    }

    fn outcome(&self) -> TaskOutcome {
        self.state.outcome.clone()
    }

    fn kill(&mut self) {
        self.state.finish(TaskOutcome::Killed);
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn dependency(&self) -> TimeDependency {
        self.dependency
    }

    fn name(&self) -> &str {
        "translate"
    }
}
