//! ScriptHost - Rhai engine setup and scripted task construction
//!
//! The host owns one engine shared by every script task. Each compiled script
//! becomes a `ScriptTask` registered with the scheduler's registry, so it
//! joins the scheduler at the start of the next pass.

use crate::api;
use crate::context::{lock_context, ScriptCallContext, SharedContext};
use crate::task::{ScriptTask, DEFAULT_SCRIPT_PRIORITY};
use rhai::{Engine, AST};
use std::path::Path;
use std::sync::{Arc, Mutex};
use warp_core::{Result, WarpError};
use warp_runtime::TimeContext;
use warp_tasks::{lock_registry, SharedRegistry, TaskHandle};
use warp_world::NodeHandle;

/// Where a script runs and how it is ordered
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScriptContext {
    /// Returned by `self_node()` inside the script
    pub node: Option<NodeHandle>,
    pub priority: i32,
}

impl Default for ScriptContext {
    fn default() -> Self {
        Self {
            node: None,
            priority: DEFAULT_SCRIPT_PRIORITY,
        }
    }
}

impl ScriptContext {
    pub fn for_node(node: NodeHandle) -> Self {
        Self {
            node: Some(node),
            ..Self::default()
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

pub struct ScriptHost {
    engine: Arc<Engine>,
    ctx: SharedContext,
    registry: SharedRegistry,
}

impl ScriptHost {
    pub fn new(registry: SharedRegistry) -> Self {
        let ctx = Arc::new(Mutex::new(ScriptCallContext::new(registry.clone())));
        let mut engine = Engine::new();

        api::register_all(&mut engine, ctx.clone());
        engine.on_print(|text| tracing::info!(target: "warp_script::print", "{}", text));
        engine.on_debug(|text, source, pos| {
            tracing::debug!(
                target: "warp_script::print",
                source = source.unwrap_or("script"),
                %pos,
                "{}",
                text
            );
        });

        Self {
            engine: Arc::new(engine),
            ctx,
            registry,
        }
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    /// Compile Rhai source into an AST
    pub fn compile(&self, source: &str) -> Result<AST> {
        self.engine
            .compile(source)
            .map_err(|e| WarpError::Script(e.to_string()))
    }

    pub fn compile_file(&self, path: &Path) -> Result<AST> {
        let source = std::fs::read_to_string(path)?;
        self.compile(&source)
            .map_err(|e| WarpError::Script(format!("{}: {}", path.display(), e)))
    }

    /// Publish this frame's dilation to scripts
    pub fn set_frame(&self, time: &TimeContext) {
        lock_context(&self.ctx).dilation = time.dilation() as f64;
    }

    /// Register an already compiled script as a task
    pub fn spawn_ast(&self, name: &str, ast: AST, context: ScriptContext) -> TaskHandle {
        let task = ScriptTask::new(
            self.engine.clone(),
            self.ctx.clone(),
            self.registry.clone(),
            ast,
            name,
            context.node,
            context.priority,
        );
        let handle = lock_registry(&self.registry).register(Box::new(task));
        tracing::debug!(script = name, task = handle.to_bits(), "script registered");
        handle
    }

    pub fn run_inline(&self, name: &str, source: &str, context: ScriptContext) -> Result<TaskHandle> {
        let ast = self.compile(source)?;
        Ok(self.spawn_ast(name, ast, context))
    }

    pub fn run_file(&self, path: &Path, context: ScriptContext) -> Result<TaskHandle> {
        let ast = self.compile_file(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "script".to_string());
        Ok(self.spawn_ast(&name, ast, context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::WAIT_PRIORITY_OFFSET;
    use warp_core::Vec3;
    use warp_tasks::{TaskOutcome, TaskRegistry, TaskScheduler};
    use warp_world::NodeWorld;

    struct Harness {
        host: ScriptHost,
        scheduler: TaskScheduler,
        world: NodeWorld,
    }

    impl Harness {
        fn new() -> Self {
            let registry = TaskRegistry::shared();
            Self {
                host: ScriptHost::new(registry.clone()),
                scheduler: TaskScheduler::with_registry(registry),
                world: NodeWorld::new(),
            }
        }

        fn pass(&mut self, dt: f32, dilation: f32) {
            let time = TimeContext::with(dt, dilation).unwrap();
            self.host.set_frame(&time);
            self.scheduler.run_pass(&mut self.world, &time).unwrap();
        }
    }

    #[test]
    fn test_compile_valid_and_invalid() {
        let h = Harness::new();
        assert!(h.host.compile("fn on_update(dt) { let x = 1 + 2; }").is_ok());
        assert!(matches!(
            h.host.compile("fn on_update( { }"),
            Err(WarpError::Script(_))
        ));
    }

    #[test]
    fn test_script_without_update_completes_after_start() {
        let mut h = Harness::new();
        let node = h.world.spawn("door", Vec3::ZERO).unwrap();
        let handle = h
            .host
            .run_inline(
                "opener",
                r#"
                    add_tag(self_node(), "open");
                    fn on_start() { set_position(self_node(), 1.0, 2.0, 3.0); }
                "#,
                ScriptContext::for_node(node),
            )
            .unwrap();

        h.pass(0.1, 1.0);
        assert!(h.world.has_tag(node, "open"));
        assert_eq!(h.world.position(node), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(h.scheduler.status(handle).unwrap(), TaskOutcome::Completed);
        assert_eq!(h.scheduler.active_count(), 0);
    }

    #[test]
    fn test_on_update_returning_true_finishes() {
        let mut h = Harness::new();
        let handle = h
            .host
            .run_inline(
                "counter",
                r#"
                    fn on_start() { this.frames = 0; }
                    fn on_update(dt) {
                        this.frames += 1;
                        this.frames >= 3
                    }
                "#,
                ScriptContext::default(),
            )
            .unwrap();

        h.pass(0.1, 1.0);
        h.pass(0.1, 1.0);
        assert!(!h.scheduler.is_finished(handle).unwrap());
        h.pass(0.1, 1.0);
        assert_eq!(h.scheduler.status(handle).unwrap(), TaskOutcome::Completed);
    }

    #[test]
    fn test_finish_call_completes() {
        let mut h = Harness::new();
        let handle = h
            .host
            .run_inline(
                "quitter",
                "fn on_update(dt) { finish(); }",
                ScriptContext::default(),
            )
            .unwrap();
        h.pass(0.1, 1.0);
        assert_eq!(h.scheduler.status(handle).unwrap(), TaskOutcome::Completed);
    }

    #[test]
    fn test_update_receives_dilated_dt() {
        let mut h = Harness::new();
        let node = h.world.spawn("meter", Vec3::ZERO).unwrap();
        h.host
            .run_inline(
                "meter",
                r#"
                    fn on_start() { this.total = 0.0; }
                    fn on_update(dt) {
                        this.total += dt;
                        set_position(self_node(), this.total, time_dilation(), delta_time());
                    }
                "#,
                ScriptContext::for_node(node),
            )
            .unwrap();

        h.pass(0.1, 2.0);
        h.pass(0.1, 2.0);
        let p = h.world.position(node).unwrap();
        assert!((p.x - 0.4).abs() < 1e-5);
        assert!((p.y - 2.0).abs() < 1e-6);
        assert!((p.z - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_wait_suspends_until_task_finishes_then_resumes() {
        let mut h = Harness::new();
        let node = h.world.spawn("gate", Vec3::ZERO).unwrap();
        let handle = h
            .host
            .run_inline(
                "gatekeeper",
                r#"
                    fn on_start() {
                        this.timer = task_wait(0.5);
                        wait(this.timer);
                    }
                    fn on_resume(h) {
                        if h == this.timer { add_tag(self_node(), "opened"); }
                    }
                "#,
                ScriptContext::for_node(node).with_priority(5),
            )
            .unwrap();

        // Start: the wait task is registered, the script suspends behind it
        h.pass(0.25, 1.0);
        assert!(!h.world.has_tag(node, "opened"));
        {
            let registry = h.scheduler.registry();
            let registry = lock_registry(&registry);
            assert_eq!(registry.priority(handle).unwrap(), WAIT_PRIORITY_OFFSET);
        }

        h.pass(0.25, 1.0);
        assert!(!h.world.has_tag(node, "opened"));

        // Wait task finishes and the script resumes in the same pass
        h.pass(0.25, 1.0);
        assert!(h.world.has_tag(node, "opened"));
        assert_eq!(h.scheduler.status(handle).unwrap(), TaskOutcome::Completed);
        assert_eq!(h.scheduler.active_count(), 0);
    }

    #[test]
    fn test_suspended_script_skips_on_update() {
        let mut h = Harness::new();
        let node = h.world.spawn("n", Vec3::ZERO).unwrap();
        h.host
            .run_inline(
                "sleeper",
                r#"
                    fn on_start() { this.calls = 0; wait(task_wait(10.0)); }
                    fn on_update(dt) {
                        this.calls += 1;
                        set_position(self_node(), this.calls.to_float(), 0.0, 0.0);
                    }
                "#,
                ScriptContext::for_node(node),
            )
            .unwrap();

        for _ in 0..5 {
            h.pass(0.1, 1.0);
        }
        assert_eq!(h.world.position(node), Some(Vec3::ZERO));
    }

    #[test]
    fn test_kill_cascades_to_awaited_and_spawned() {
        let mut h = Harness::new();
        let handle = h
            .host
            .run_inline(
                "parent",
                r#"
                    fn on_start() {
                        this.side = task_wait(10.0);
                        wait(task_wait(10.0));
                    }
                "#,
                ScriptContext::default(),
            )
            .unwrap();

        h.pass(0.1, 1.0);
        h.pass(0.1, 1.0);
        assert_eq!(h.scheduler.active_count(), 3);

        h.scheduler.kill(handle).unwrap();
        h.pass(0.1, 1.0);
        assert_eq!(h.scheduler.status(handle).unwrap(), TaskOutcome::Killed);

        h.pass(0.1, 1.0);
        assert_eq!(h.scheduler.active_count(), 0);
        let registry = h.scheduler.registry();
        assert_eq!(lock_registry(&registry).live_count(), 0);
    }

    #[test]
    fn test_bridge_violation_fails_script() {
        let mut h = Harness::new();
        let handle = h
            .host
            .run_inline(
                "broken",
                "fn on_start() { task_kill(999); }",
                ScriptContext::default(),
            )
            .unwrap();
        h.pass(0.1, 1.0);
        match h.scheduler.status(handle).unwrap() {
            TaskOutcome::Failed(msg) => assert!(msg.contains("unknown task handle 999")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_script_ramps_emitter_and_node_time() {
        let mut h = Harness::new();
        let node = h.world.spawn("torch", Vec3::ZERO).unwrap();
        h.world.set_emitter_controls(
            node,
            warp_world::EmitterControls {
                emission_rate: 10.0,
                speed_min: 1.0,
                speed_max: 2.0,
                radius: Some(0.5),
            },
        );
        h.host
            .run_inline(
                "dimmer",
                r#"
                    fn on_start() {
                        task_emitter_rate(self_node(), 40.0, 0.0, "ease_in");
                        task_emitter_radius(self_node(), 2.0, 0.0);
                        task_time_warp(self_node(), 1.0, 0.5, 0.0);
                        task_translate_speed(self_node(), 1.0, 0.0, 0.0, 10.0);
                    }
                "#,
                ScriptContext::for_node(node),
            )
            .unwrap();

        h.pass(0.1, 1.0);
        h.pass(0.1, 1.0);
        let controls = h.world.emitter_controls(node).unwrap();
        assert_eq!(controls.emission_rate, 40.0);
        assert_eq!(controls.radius, Some(2.0));
        assert_eq!(h.world.time_multiplier(node), Some(0.5));
        assert_eq!(h.world.position(node), Some(Vec3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_unknown_easing_fails_script() {
        let mut h = Harness::new();
        let node = h.world.spawn("torch", Vec3::ZERO).unwrap();
        let handle = h
            .host
            .run_inline(
                "bad",
                r#"fn on_start() { task_emitter_rate(self_node(), 1.0, 1.0, "bounce"); }"#,
                ScriptContext::for_node(node),
            )
            .unwrap();
        h.pass(0.1, 1.0);
        match h.scheduler.status(handle).unwrap() {
            TaskOutcome::Failed(msg) => assert!(msg.contains("unknown easing 'bounce'")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_oversized_node_handle_is_a_script_error() {
        let mut h = Harness::new();
        let far = NodeHandle::from_bits((1 << 63) | 5).unwrap();
        let handle = h
            .host
            .run_inline(
                "far",
                "fn on_start() { let n = self_node(); }",
                ScriptContext::for_node(far),
            )
            .unwrap();
        h.pass(0.1, 1.0);
        match h.scheduler.status(handle).unwrap() {
            TaskOutcome::Failed(msg) => assert!(msg.contains("does not fit in a script integer")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_reaped_handle_reads_finished_but_cannot_be_killed() {
        let mut h = Harness::new();
        let node = h.world.spawn("n", Vec3::ZERO).unwrap();
        let handle = h
            .host
            .run_inline(
                "late",
                r#"
                    fn on_start() { this.t = task_wait(0.0); this.frame = 0; }
                    fn on_update(dt) {
                        this.frame += 1;
                        if this.frame == 3 {
                            if task_finished(this.t) { add_tag(self_node(), "seen"); }
                            task_kill(this.t);
                        }
                    }
                "#,
                ScriptContext::for_node(node),
            )
            .unwrap();

        h.pass(0.1, 1.0);
        h.pass(0.1, 1.0);
        h.pass(0.1, 1.0);
        assert!(h.world.has_tag(node, "seen"));
        assert!(matches!(
            h.scheduler.status(handle).unwrap(),
            TaskOutcome::Failed(msg) if msg.contains("already reaped")
        ));
    }

    #[test]
    fn test_translate_from_script_moves_node() {
        let mut h = Harness::new();
        let node = h.world.spawn("crate", Vec3::ZERO).unwrap();
        h.host
            .run_inline(
                "pusher",
                r#"
                    fn on_start() {
                        let n = find_node("crate");
                        wait(task_translate(n, 4.0, 0.0, 0.0, 1.0));
                    }
                "#,
                ScriptContext::default(),
            )
            .unwrap();

        for _ in 0..6 {
            h.pass(0.25, 1.0);
        }
        let p = h.world.position(node).unwrap();
        assert!((p.x - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_node_queries() {
        let mut h = Harness::new();
        let a = h.world.spawn("a", Vec3::new(1.0, 0.0, 0.0)).unwrap();
        h.world.add_tag(a, "enemy");
        let watcher = h.world.spawn("watcher", Vec3::ZERO).unwrap();
        h.host
            .run_inline(
                "queries",
                r#"
                    let e = first_node_with_tag("enemy");
                    let p = get_position(e);
                    if node_valid(e) && p.x == 1.0 && find_node("missing") == -1 {
                        add_tag(self_node(), "ok");
                    }
                    remove_tag(e, "enemy");
                "#,
                ScriptContext::for_node(watcher),
            )
            .unwrap();
        h.pass(0.1, 1.0);
        assert!(h.world.has_tag(watcher, "ok"));
        assert!(!h.world.has_tag(a, "enemy"));
    }

    #[test]
    fn test_world_is_returned_after_failed_call() {
        let mut h = Harness::new();
        let node = h.world.spawn("keep", Vec3::ZERO).unwrap();
        h.host
            .run_inline("oops", "fn on_start() { throw \"boom\"; }", ScriptContext::default())
            .unwrap();
        h.pass(0.1, 1.0);
        assert!(h.world.is_valid(node));
        assert_eq!(h.world.len(), 1);
    }
}
