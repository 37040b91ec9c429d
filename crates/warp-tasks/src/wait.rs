//! Wait for a dilated duration

use crate::task::{Task, TaskOutcome, TaskState};
use warp_runtime::TimeStep;
use warp_world::NodeWorld;

pub struct Wait {
    remaining: f32,
    priority: i32,
    state: TaskState,
}

impl Wait {
    pub fn new(duration: f32) -> Self {
        Self {
            remaining: duration,
            priority: 0,
            state: TaskState::default(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn remaining(&self) -> f32 {
        self.remaining.max(0.0)
    }
}

impl Task for Wait {
    fn update(&mut self, step: &TimeStep, _world: &mut NodeWorld) {
        if !self.state.is_running() {
            return;
        }
        self.remaining -= step.elapsed;
        if self.remaining <= 0.0 {
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
        "wait"
    }
}
