//! The task contract

use std::fmt;
use warp_runtime::{TimeDependency, TimeStep};
use warp_world::NodeWorld;

/// Lifecycle state of a task
#[derive(Clone, Debug, Default, PartialEq)]
pub enum TaskOutcome {
    #[default]
    Running,
    /// Completion predicate was satisfied
    Completed,
    /// Terminated by `kill()`
    Killed,
    /// Target node disappeared
    TargetLost,
    /// Behavior raised an error
    Failed(String),
}

impl TaskOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskOutcome::Running)
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Running => write!(f, "running"),
            TaskOutcome::Completed => write!(f, "completed"),
            TaskOutcome::Killed => write!(f, "killed"),
            TaskOutcome::TargetLost => write!(f, "target lost"),
            TaskOutcome::Failed(msg) => write!(f, "failed: {}", msg),
        }
    }
}

/// A unit of timed world behavior
///
/// `update` receives time already scaled for `dependency()`. Once the outcome
/// is terminal the scheduler never calls `update` again.
pub trait Task: Send {
    fn update(&mut self, step: &TimeStep, world: &mut NodeWorld);

    fn outcome(&self) -> TaskOutcome;

    fn is_finished(&self) -> bool {
        self.outcome().is_terminal()
    }

    /// Force the terminal `Killed` state
    fn kill(&mut self);

    /// Lower runs first
    fn priority(&self) -> i32 {
        0
    }

    fn dependency(&self) -> TimeDependency {
        TimeDependency::Duration
    }

    fn name(&self) -> &str;
}

/// Terminal-state bookkeeping shared by the built-in tasks
#[derive(Clone, Debug, Default)]
pub(crate) struct TaskState {
    pub outcome: TaskOutcome,
}

impl TaskState {
    pub fn is_running(&self) -> bool {
        !self.outcome.is_terminal()
    }

    /// Move to a terminal state. The first terminal state wins.
    pub fn finish(&mut self, outcome: TaskOutcome) {
        if self.is_running() {
            self.outcome = outcome;
        }
    }
}
