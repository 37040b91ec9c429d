//! ScriptTask - a compiled script scheduled as a task

use crate::context::{lock_context, SharedContext};
use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, FuncArgs, Map, Scope, AST};
use std::sync::Arc;
use warp_runtime::TimeStep;
use warp_tasks::{lock_registry, SharedRegistry, Task, TaskHandle, TaskOutcome};
use warp_world::{NodeHandle, NodeWorld};

/// Priority of a script that is not waiting on anything
pub const DEFAULT_SCRIPT_PRIORITY: i32 = 100;

/// Added to the awaited task's priority while a script is suspended, so the
/// script resumes after that task's update in the same pass
pub const WAIT_PRIORITY_OFFSET: i32 = 100;

fn has_function(ast: &AST, name: &str) -> bool {
    ast.iter_functions().any(|f| f.name == name)
}

/// Call a script function with `this` bound to the task's state map.
/// Top-level statements are not re-run.
fn call_callback(
    engine: &Engine,
    scope: &mut Scope<'static>,
    ast: &AST,
    state: &mut Dynamic,
    name: &str,
    args: impl FuncArgs,
) -> Result<Dynamic, Box<EvalAltResult>> {
    let options = CallFnOptions::new()
        .eval_ast(false)
        .rewind_scope(false)
        .bind_this_ptr(state);
    engine.call_fn_with_options::<Dynamic>(options, scope, ast, name, args)
}

/// What a callback sequence asked for
enum CallResult {
    Continue,
    Finish,
}

pub struct ScriptTask {
    engine: Arc<Engine>,
    ctx: SharedContext,
    registry: SharedRegistry,
    ast: AST,
    scope: Scope<'static>,
    /// Bound as `this` in every callback
    state: Dynamic,
    name: String,
    self_node: Option<NodeHandle>,
    base_priority: i32,
    started: bool,
    has_on_start: bool,
    has_on_update: bool,
    has_on_resume: bool,
    /// Awaited task and its priority when the wait began
    waiting: Option<(TaskHandle, i32)>,
    /// Tasks this script created that may still be running
    spawned: Vec<TaskHandle>,
    outcome: TaskOutcome,
}

impl ScriptTask {
    pub fn new(
        engine: Arc<Engine>,
        ctx: SharedContext,
        registry: SharedRegistry,
        ast: AST,
        name: impl Into<String>,
        self_node: Option<NodeHandle>,
        priority: i32,
    ) -> Self {
        Self {
            has_on_start: has_function(&ast, "on_start"),
            has_on_update: has_function(&ast, "on_update"),
            has_on_resume: has_function(&ast, "on_resume"),
            engine,
            ctx,
            registry,
            ast,
            scope: Scope::new(),
            state: Dynamic::from_map(Map::new()),
            name: name.into(),
            self_node,
            base_priority: priority,
            started: false,
            waiting: None,
            spawned: Vec::new(),
            outcome: TaskOutcome::Running,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting.is_some()
    }

    pub fn awaited(&self) -> Option<TaskHandle> {
        self.waiting.map(|(h, _)| h)
    }

    /// Handles of spawned tasks not yet seen finished
    pub fn spawned(&self) -> &[TaskHandle] {
        &self.spawned
    }

    fn is_running(&self) -> bool {
        !self.outcome.is_terminal()
    }

    /// True when the current call queued a wait or asked to finish
    fn call_wants_stop(&self) -> bool {
        let c = lock_context(&self.ctx);
        c.wait_request.is_some() || c.finish_requested
    }

    fn run_callbacks(
        &mut self,
        resumed: Option<TaskHandle>,
        dt: f64,
    ) -> Result<CallResult, Box<EvalAltResult>> {
        lock_context(&self.ctx).begin_call(&self.name, self.self_node, dt);

        if !self.started {
            self.started = true;
            self.engine.run_ast_with_scope(&mut self.scope, &self.ast)?;
            if self.has_on_start {
                call_callback(
                    &self.engine,
                    &mut self.scope,
                    &self.ast,
                    &mut self.state,
                    "on_start",
                    (),
                )?;
            }
        } else if let Some(handle) = resumed {
            if self.has_on_resume {
                call_callback(
                    &self.engine,
                    &mut self.scope,
                    &self.ast,
                    &mut self.state,
                    "on_resume",
                    (crate::api::script_int("task", handle.to_bits())?,),
                )?;
            }
        }

        if self.call_wants_stop() {
            return Ok(CallResult::Continue);
        }
        if !self.has_on_update {
            return Ok(CallResult::Finish);
        }

        let ret = call_callback(
            &self.engine,
            &mut self.scope,
            &self.ast,
            &mut self.state,
            "on_update",
            (dt,),
        )?;
        if ret.as_bool().unwrap_or(false) {
            return Ok(CallResult::Finish);
        }
        Ok(CallResult::Continue)
    }

    /// Pull spawned handles and requests out of the call context
    fn collect_call_outputs(&mut self) -> (Option<(TaskHandle, i32)>, bool) {
        let mut c = lock_context(&self.ctx);
        self.spawned.append(&mut c.spawned);
        let wait = c.wait_request.take();
        let finish = std::mem::take(&mut c.finish_requested);
        (wait, finish)
    }

    fn prune_spawned(&mut self) {
        let registry = lock_registry(&self.registry);
        self.spawned
            .retain(|&h| matches!(registry.is_finished(h), Ok(false)));
    }

    fn cascade_kill(&mut self) {
        let mut registry = lock_registry(&self.registry);
        let targets = self.awaited().into_iter().chain(self.spawned.drain(..));
        for handle in targets {
            // Already reaped children have nothing left to kill
            let _ = registry.request_kill(handle);
        }
        self.waiting = None;
    }

    fn fail(&mut self, message: String) {
        tracing::error!(script = %self.name, error = %message, "script failed");
        self.outcome = TaskOutcome::Failed(message);
        self.cascade_kill();
    }
}

impl Task for ScriptTask {
    fn update(&mut self, step: &TimeStep, world: &mut NodeWorld) {
        if !self.is_running() {
            return;
        }

        let mut resumed = None;
        if let Some((awaited, _)) = self.waiting {
            let finished = lock_registry(&self.registry).is_finished(awaited);
            match finished {
                Ok(false) => return,
                Ok(true) => {
                    self.waiting = None;
                    resumed = Some(awaited);
                }
                Err(err) => {
                    self.fail(err.to_string());
                    return;
                }
            }
        }

        std::mem::swap(world, &mut lock_context(&self.ctx).world);
        let result = self.run_callbacks(resumed, step.scaled() as f64);
        std::mem::swap(world, &mut lock_context(&self.ctx).world);

        let (wait, finish) = self.collect_call_outputs();
        match result {
            Err(err) => self.fail(err.to_string()),
            Ok(_) if finish => self.outcome = TaskOutcome::Completed,
            Ok(CallResult::Finish) => self.outcome = TaskOutcome::Completed,
            Ok(CallResult::Continue) => {
                if let Some((handle, priority)) = wait {
                    tracing::trace!(script = %self.name, task = handle.to_bits(), "suspended");
                    self.waiting = Some((handle, priority));
                }
            }
        }
        self.prune_spawned();
    }

    fn outcome(&self) -> TaskOutcome {
        self.outcome.clone()
    }

    fn kill(&mut self) {
        if self.is_running() {
            self.outcome = TaskOutcome::Killed;
            self.cascade_kill();
        }
    }

    fn priority(&self) -> i32 {
        match self.waiting {
            Some((_, awaited)) => awaited.saturating_add(WAIT_PRIORITY_OFFSET),
            None => self.base_priority,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
