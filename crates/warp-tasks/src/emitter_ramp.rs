//! Ramp an emitter parameter through its node's `EmitterControls`

use crate::easing::Easing;
use crate::task::{Task, TaskOutcome, TaskState};
use warp_runtime::TimeStep;
use warp_world::{EmitterControls, NodeHandle, NodeWorld};

/// End value of an emitter ramp
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EmitterTarget {
    /// Particles per dilated second
    Rate(f32),
    /// Launch speed range
    Speed { min: f32, max: f32 },
    /// Sphere radius
    Radius(f32),
}

impl EmitterTarget {
    pub fn type_name(&self) -> &'static str {
        match self {
            EmitterTarget::Rate(_) => "emitter_rate",
            EmitterTarget::Speed { .. } => "emitter_speed",
            EmitterTarget::Radius(_) => "emitter_radius",
        }
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Eases one emitter parameter from its value at the first update to the
/// target. Progress runs in the node's local time, so a warped node ramps
/// its emitter faster or slower.
pub struct EmitterRamp {
    node: NodeHandle,
    target: EmitterTarget,
    duration: f32,
    easing: Easing,
    priority: i32,
    start: Option<EmitterControls>,
    elapsed: f32,
    state: TaskState,
}

impl EmitterRamp {
    pub fn new(node: NodeHandle, target: EmitterTarget, duration: f32) -> Self {
        Self {
            node,
            target,
            duration,
            easing: Easing::Linear,
            priority: 0,
            start: None,
            elapsed: 0.0,
            state: TaskState::default(),
        }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    fn blend(
        &self,
        start: &EmitterControls,
        current: EmitterControls,
        a: f32,
    ) -> Option<EmitterControls> {
        let mut next = current;
        match self.target {
            EmitterTarget::Rate(rate) => {
                next.emission_rate = lerp(start.emission_rate, rate, a).max(0.0);
            }
            EmitterTarget::Speed { min, max } => {
                next.speed_min = lerp(start.speed_min, min, a);
                next.speed_max = lerp(start.speed_max, max, a);
            }
            EmitterTarget::Radius(radius) => {
                next.radius = Some(lerp(start.radius?, radius, a));
            }
        }
        Some(next)
    }
}

impl Task for EmitterRamp {
    fn update(&mut self, step: &TimeStep, world: &mut NodeWorld) {
        if !self.state.is_running() {
            return;
        }
        let Some(current) = world.emitter_controls(self.node) else {
            tracing::debug!(task = self.target.type_name(), "target emitter lost");
            self.state.finish(TaskOutcome::TargetLost);
            return;
        };
        let start = *self.start.get_or_insert(current);

        let t = if self.duration <= 0.0 {
            1.0
        } else {
            let local = world.time_multiplier(self.node).unwrap_or(1.0);
            self.elapsed += step.scaled() * local;
            (self.elapsed / self.duration).min(1.0)
        };

        let Some(next) = self.blend(&start, current, self.easing.apply(t)) else {
            let reason = "emitter shape has no radius".to_string();
            self.state.finish(TaskOutcome::Failed(reason));
            return;
        };
        if !world.set_emitter_controls(self.node, next) {
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

    fn name(&self) -> &str {
        self.target.type_name()
    }
}
