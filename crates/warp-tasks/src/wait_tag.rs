//! Wait until a node's tags satisfy a predicate

use crate::task::{Task, TaskOutcome, TaskState};
use warp_runtime::TimeStep;
use warp_world::{NodeHandle, NodeWorld};

#[derive(Clone, Debug, PartialEq)]
pub enum TagPredicate {
    /// A single tag is present (or absent)
    Has { tag: String, present: bool },
    /// Every tag is present. Empty lists are satisfied.
    All(Vec<String>),
    /// At least one tag is present. Empty lists never are.
    Any(Vec<String>),
}

impl TagPredicate {
    pub fn present(tag: impl Into<String>) -> Self {
        TagPredicate::Has {
            tag: tag.into(),
            present: true,
        }
    }

    pub fn absent(tag: impl Into<String>) -> Self {
        TagPredicate::Has {
            tag: tag.into(),
            present: false,
        }
    }

    pub fn is_satisfied(&self, world: &NodeWorld, node: NodeHandle) -> bool {
        match self {
            TagPredicate::Has { tag, present } => world.has_tag(node, tag) == *present,
            TagPredicate::All(tags) => tags.iter().all(|t| world.has_tag(node, t)),
            TagPredicate::Any(tags) => tags.iter().any(|t| world.has_tag(node, t)),
        }
    }
}

pub struct WaitTag {
    node: NodeHandle,
    predicate: TagPredicate,
    priority: i32,
    state: TaskState,
}

impl WaitTag {
    pub fn new(node: NodeHandle, predicate: TagPredicate) -> Self {
        Self {
            node,
            predicate,
            priority: 0,
            state: TaskState::default(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn predicate(&self) -> &TagPredicate {
        &self.predicate
    }
}

impl Task for WaitTag {
    fn update(&mut self, _step: &TimeStep, world: &mut NodeWorld) {
        if !self.state.is_running() {
            return;
        }
        if !world.is_valid(self.node) {
            tracing::debug!(task = "wait_tag", "target node lost");
            self.state.finish(TaskOutcome::TargetLost);
            return;
        }
        if self.predicate.is_satisfied(world, self.node) {
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
        "wait_tag"
    }
}
