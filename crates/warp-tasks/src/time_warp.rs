//! Ramp a node's local time multiplier

use crate::task::{Task, TaskOutcome, TaskState};
use warp_runtime::TimeStep;
use warp_world::{NodeHandle, NodeWorld};

/// Moves a node's time multiplier linearly from `from` to `to` over a
/// dilated duration. The ramp itself runs on global time, so warping a node
/// never changes how long its own warp takes.
pub struct NodeTimeWarp {
    node: NodeHandle,
    from: f32,
    to: f32,
    duration: f32,
    priority: i32,
    elapsed: f32,
    state: TaskState,
}

impl NodeTimeWarp {
    pub fn new(node: NodeHandle, from: f32, to: f32, duration: f32) -> Self {
        Self {
            node,
            from,
            to,
            duration,
            priority: 0,
            elapsed: 0.0,
            state: TaskState::default(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl Task for NodeTimeWarp {
    fn update(&mut self, step: &TimeStep, world: &mut NodeWorld) {
        if !self.state.is_running() {
            return;
        }
        let t = if self.duration <= 0.0 {
            1.0
        } else {
            self.elapsed += step.scaled();
            (self.elapsed / self.duration).min(1.0)
        };
        let multiplier = self.from + (self.to - self.from) * t;
        if !world.set_time_multiplier(self.node, multiplier) {
            tracing::debug!(task = "time_warp", "target node lost");
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
        "time_warp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp_core::Vec3;
    use warp_runtime::{TimeContext, TimeDependency};

    fn step(dt: f32, dilation: f32) -> TimeStep {
        TimeContext::with(dt, dilation)
            .unwrap()
            .step(TimeDependency::Duration)
    }

    #[test]
    fn test_ramps_then_holds_end_value() {
        let mut world = NodeWorld::new();
        let n = world.spawn("n", Vec3::ZERO).unwrap();
        let mut task = NodeTimeWarp::new(n, 1.0, 0.2, 2.0);

        task.update(&step(1.0, 1.0), &mut world);
        assert!((world.time_multiplier(n).unwrap() - 0.6).abs() < 1e-5);
        assert!(!task.is_finished());

        task.update(&step(1.5, 1.0), &mut world);
        assert!((world.time_multiplier(n).unwrap() - 0.2).abs() < 1e-5);
        assert_eq!(task.outcome(), TaskOutcome::Completed);
    }

    #[test]
    fn test_global_dilation_stretches_the_ramp() {
        let mut world = NodeWorld::new();
        let n = world.spawn("n", Vec3::ZERO).unwrap();
        let mut task = NodeTimeWarp::new(n, 0.0, 1.0, 1.0);
        task.update(&step(1.0, 0.25), &mut world);
        assert!((world.time_multiplier(n).unwrap() - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_zero_duration_applies_end_value() {
        let mut world = NodeWorld::new();
        let n = world.spawn("n", Vec3::ZERO).unwrap();
        let mut task = NodeTimeWarp::new(n, 1.0, 3.0, 0.0);
        task.update(&step(0.0, 1.0), &mut world);
        assert_eq!(world.time_multiplier(n), Some(3.0));
        assert!(task.is_finished());
    }

    #[test]
    fn test_lost_target() {
        let mut world = NodeWorld::new();
        let n = world.spawn("n", Vec3::ZERO).unwrap();
        world.despawn(n).unwrap();
        let mut task = NodeTimeWarp::new(n, 1.0, 0.5, 1.0);
        task.update(&step(0.1, 1.0), &mut world);
        assert_eq!(task.outcome(), TaskOutcome::TargetLost);
    }
}
