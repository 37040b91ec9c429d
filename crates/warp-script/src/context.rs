//! Script execution context
//!
//! ScriptCallContext is the shared state accessed by Rhai API functions during
//! a script call. The node world is moved in before each call and moved back
//! out afterwards, so API functions only ever touch it inside a call.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use warp_tasks::{SharedRegistry, TaskHandle};
use warp_world::{NodeHandle, NodeWorld};

pub type SharedContext = Arc<Mutex<ScriptCallContext>>;

pub fn lock_context(ctx: &SharedContext) -> MutexGuard<'_, ScriptCallContext> {
    ctx.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ScriptCallContext {
    /// Lent for the duration of one call, empty otherwise
    pub world: NodeWorld,
    pub registry: SharedRegistry,
    /// Node the running script is attached to
    pub self_node: Option<NodeHandle>,
    pub script_name: String,
    /// Dilated seconds this frame
    pub delta_time: f64,
    pub dilation: f64,
    /// Tasks created by the running script during this call
    pub spawned: Vec<TaskHandle>,
    /// Set by `wait(handle)`: the awaited task and its priority
    pub wait_request: Option<(TaskHandle, i32)>,
    pub finish_requested: bool,
}

impl ScriptCallContext {
    pub fn new(registry: SharedRegistry) -> Self {
        Self {
            world: NodeWorld::new(),
            registry,
            self_node: None,
            script_name: String::new(),
            delta_time: 0.0,
            dilation: 1.0,
            spawned: Vec::new(),
            wait_request: None,
            finish_requested: false,
        }
    }

    /// Reset per-call outputs before a script call
    pub fn begin_call(&mut self, name: &str, node: Option<NodeHandle>, delta_time: f64) {
        self.script_name.clear();
        self.script_name.push_str(name);
        self.self_node = node;
        self.delta_time = delta_time;
        self.spawned.clear();
        self.wait_request = None;
        self.finish_requested = false;
    }
}
