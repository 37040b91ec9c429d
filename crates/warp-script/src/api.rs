//! Rhai API function registration
//!
//! All functions accessible from scripts are registered here. They reach the
//! node world and the task registry through the shared ScriptCallContext.

use crate::context::{lock_context, ScriptCallContext, SharedContext};
use rhai::{Array, Dynamic, Engine, EvalAltResult, Map};
use warp_core::{Vec3, WarpError};
use warp_tasks::{
    lock_registry, BridgeError, Easing, EmitterRamp, EmitterTarget, NodeTimeWarp, TagPredicate,
    Task, TaskHandle, Translate, Wait, WaitTag,
};
use warp_world::NodeHandle;

type FnResult<T> = Result<T, Box<EvalAltResult>>;

/// Register all API functions on the Rhai engine
pub fn register_all(engine: &mut Engine, ctx: SharedContext) {
    register_bridge_api(engine, ctx.clone());
    register_task_api(engine, ctx.clone());
    register_node_api(engine, ctx.clone());
    register_time_api(engine, ctx.clone());
    register_log_api(engine, ctx);
}

fn bridge_error(err: BridgeError) -> Box<EvalAltResult> {
    WarpError::from(err).to_string().into()
}

fn task_handle(h: i64) -> FnResult<TaskHandle> {
    u64::try_from(h)
        .map(TaskHandle::from_bits)
        .map_err(|_| bridge_error(BridgeError::UnknownHandle(h as u64)))
}

fn node_handle(n: i64) -> FnResult<NodeHandle> {
    u64::try_from(n)
        .ok()
        .and_then(NodeHandle::from_bits)
        .ok_or_else(|| format!("invalid node handle {}", n).into())
}

/// Handle bits as a script integer. Rhai integers are signed, so bits with
/// the high bit set are refused rather than wrapped.
pub(crate) fn script_int(kind: &str, bits: u64) -> FnResult<i64> {
    i64::try_from(bits)
        .map_err(|_| format!("{} handle {} does not fit in a script integer", kind, bits).into())
}

fn node_bits(node: Option<NodeHandle>) -> FnResult<i64> {
    match node {
        Some(n) => script_int("node", n.to_bits()),
        None => Ok(-1),
    }
}

/// Register a task built by the running script and remember it as its child
fn spawn_child(c: &mut ScriptCallContext, task: Box<dyn Task>) -> FnResult<i64> {
    let handle = lock_registry(&c.registry).register(task);
    c.spawned.push(handle);
    script_int("task", handle.to_bits())
}

fn easing_named(name: &str) -> FnResult<Easing> {
    Easing::from_name(name).ok_or_else(|| format!("unknown easing '{}'", name).into())
}

fn spawn_ramp(
    ctx: &SharedContext,
    node: i64,
    target: EmitterTarget,
    duration: f64,
    easing: Easing,
) -> FnResult<i64> {
    let node = node_handle(node)?;
    let task = EmitterRamp::new(node, target, duration as f32).with_easing(easing);
    let mut c = lock_context(ctx);
    spawn_child(&mut c, Box::new(task))
}

fn tag_list(tags: Array) -> FnResult<Vec<String>> {
    tags.into_iter()
        .map(|t| {
            t.into_immutable_string()
                .map(|s| s.to_string())
                .map_err(|ty| format!("tag lists must hold strings, found {}", ty).into())
        })
        .collect()
}

// ─── Bridge API ──────────────────────────────────────────

fn register_bridge_api(engine: &mut Engine, ctx: SharedContext) {
    // task_finished(h: i64) -> bool
    {
        let ctx = ctx.clone();
        engine.register_fn("task_finished", move |h: i64| -> FnResult<bool> {
            let handle = task_handle(h)?;
            let c = lock_context(&ctx);
            let finished = lock_registry(&c.registry).is_finished(handle);
            finished.map_err(bridge_error)
        });
    }

    // task_kill(h: i64)
    {
        let ctx = ctx.clone();
        engine.register_fn("task_kill", move |h: i64| -> FnResult<()> {
            let handle = task_handle(h)?;
            let c = lock_context(&ctx);
            let killed = lock_registry(&c.registry).request_kill(handle);
            killed.map_err(bridge_error)
        });
    }

    // wait(h: i64) - suspend the script once the current callback returns
    {
        let ctx = ctx.clone();
        engine.register_fn("wait", move |h: i64| -> FnResult<()> {
            let handle = task_handle(h)?;
            let mut c = lock_context(&ctx);
            let priority = {
                let registry = lock_registry(&c.registry);
                if registry.is_released(handle) {
                    // Already reaped: it finished long ago, resume right away
                    registry.is_finished(handle).map_err(bridge_error)?;
                    0
                } else {
                    registry.priority(handle).map_err(bridge_error)?
                }
            };
            c.wait_request = Some((handle, priority));
            Ok(())
        });
    }

    // finish()
    {
        let ctx = ctx.clone();
        engine.register_fn("finish", move || {
            lock_context(&ctx).finish_requested = true;
        });
    }
}

// ─── Task construction API ───────────────────────────────

fn register_task_api(engine: &mut Engine, ctx: SharedContext) {
    // task_wait(duration: f64) -> i64
    {
        let ctx = ctx.clone();
        engine.register_fn("task_wait", move |duration: f64| -> FnResult<i64> {
            let mut c = lock_context(&ctx);
            spawn_child(&mut c, Box::new(Wait::new(duration as f32)))
        });
    }

    // task_wait_tag(node: i64, tag: &str) -> i64
    {
        let ctx = ctx.clone();
        engine.register_fn("task_wait_tag", move |node: i64, tag: &str| -> FnResult<i64> {
            let node = node_handle(node)?;
            let mut c = lock_context(&ctx);
            let task = WaitTag::new(node, TagPredicate::present(tag));
            spawn_child(&mut c, Box::new(task))
        });
    }

    // task_wait_tag(node: i64, tag: &str, present: bool) -> i64
    {
        let ctx = ctx.clone();
        engine.register_fn(
            "task_wait_tag",
            move |node: i64, tag: &str, present: bool| -> FnResult<i64> {
                let node = node_handle(node)?;
                let mut c = lock_context(&ctx);
                let predicate = TagPredicate::Has {
                    tag: tag.to_string(),
                    present,
                };
                spawn_child(&mut c, Box::new(WaitTag::new(node, predicate)))
            },
        );
    }

    // task_wait_tags_and(node: i64, tags: Array) -> i64
    {
        let ctx = ctx.clone();
        engine.register_fn(
            "task_wait_tags_and",
            move |node: i64, tags: Array| -> FnResult<i64> {
                let node = node_handle(node)?;
                let predicate = TagPredicate::All(tag_list(tags)?);
                let mut c = lock_context(&ctx);
                spawn_child(&mut c, Box::new(WaitTag::new(node, predicate)))
            },
        );
    }

    // task_wait_tags_or(node: i64, tags: Array) -> i64
    {
        let ctx = ctx.clone();
        engine.register_fn(
            "task_wait_tags_or",
            move |node: i64, tags: Array| -> FnResult<i64> {
                let node = node_handle(node)?;
                let predicate = TagPredicate::Any(tag_list(tags)?);
                let mut c = lock_context(&ctx);
                spawn_child(&mut c, Box::new(WaitTag::new(node, predicate)))
            },
        );
    }

    // task_translate(node: i64, x: f64, y: f64, z: f64, duration: f64) -> i64
    {
        let ctx = ctx.clone();
        engine.register_fn(
            "task_translate",
            move |node: i64, x: f64, y: f64, z: f64, duration: f64| -> FnResult<i64> {
                let node = node_handle(node)?;
                let direction = Vec3::new(x as f32, y as f32, z as f32);
                let task = Translate::new(node, direction, duration as f32);
                let mut c = lock_context(&ctx);
                spawn_child(&mut c, Box::new(task))
            },
        );
    }

    // task_translate_speed(node: i64, x: f64, y: f64, z: f64, speed: f64) -> i64
    {
        let ctx = ctx.clone();
        engine.register_fn(
            "task_translate_speed",
            move |node: i64, x: f64, y: f64, z: f64, speed: f64| -> FnResult<i64> {
                let node = node_handle(node)?;
                let direction = Vec3::new(x as f32, y as f32, z as f32);
                let task = Translate::at_speed(node, direction, speed as f32);
                let mut c = lock_context(&ctx);
                spawn_child(&mut c, Box::new(task))
            },
        );
    }

    // task_time_warp(node: i64, from: f64, to: f64, duration: f64) -> i64
    {
        let ctx = ctx.clone();
        engine.register_fn(
            "task_time_warp",
            move |node: i64, from: f64, to: f64, duration: f64| -> FnResult<i64> {
                let node = node_handle(node)?;
                let task = NodeTimeWarp::new(node, from as f32, to as f32, duration as f32);
                let mut c = lock_context(&ctx);
                spawn_child(&mut c, Box::new(task))
            },
        );
    }

    // task_emitter_rate(node: i64, rate: f64, duration: f64 [, easing: &str]) -> i64
    {
        let c1 = ctx.clone();
        engine.register_fn(
            "task_emitter_rate",
            move |node: i64, rate: f64, duration: f64| -> FnResult<i64> {
                let target = EmitterTarget::Rate(rate as f32);
                spawn_ramp(&c1, node, target, duration, Easing::Linear)
            },
        );
        let c2 = ctx.clone();
        engine.register_fn(
            "task_emitter_rate",
            move |node: i64, rate: f64, duration: f64, easing: &str| -> FnResult<i64> {
                let target = EmitterTarget::Rate(rate as f32);
                spawn_ramp(&c2, node, target, duration, easing_named(easing)?)
            },
        );
    }

    // task_emitter_speed(node: i64, min: f64, max: f64, duration: f64 [, easing: &str]) -> i64
    {
        let c1 = ctx.clone();
        engine.register_fn(
            "task_emitter_speed",
            move |node: i64, min: f64, max: f64, duration: f64| -> FnResult<i64> {
                let target = EmitterTarget::Speed {
                    min: min as f32,
                    max: max as f32,
                };
                spawn_ramp(&c1, node, target, duration, Easing::Linear)
            },
        );
        let c2 = ctx.clone();
        engine.register_fn(
            "task_emitter_speed",
            move |node: i64, min: f64, max: f64, duration: f64, easing: &str| -> FnResult<i64> {
                let target = EmitterTarget::Speed {
                    min: min as f32,
                    max: max as f32,
                };
                spawn_ramp(&c2, node, target, duration, easing_named(easing)?)
            },
        );
    }

    // task_emitter_radius(node: i64, radius: f64, duration: f64 [, easing: &str]) -> i64
    {
        let c1 = ctx.clone();
        engine.register_fn(
            "task_emitter_radius",
            move |node: i64, radius: f64, duration: f64| -> FnResult<i64> {
                let target = EmitterTarget::Radius(radius as f32);
                spawn_ramp(&c1, node, target, duration, Easing::Linear)
            },
        );
        let c2 = ctx;
        engine.register_fn(
            "task_emitter_radius",
            move |node: i64, radius: f64, duration: f64, easing: &str| -> FnResult<i64> {
                let target = EmitterTarget::Radius(radius as f32);
                spawn_ramp(&c2, node, target, duration, easing_named(easing)?)
            },
        );
    }
}

// ─── Node API ────────────────────────────────────────────

fn register_node_api(engine: &mut Engine, ctx: SharedContext) {
    // self_node() -> i64, -1 when the script has no node
    {
        let ctx = ctx.clone();
        engine.register_fn("self_node", move || -> FnResult<i64> {
            node_bits(lock_context(&ctx).self_node)
        });
    }

    // find_node(name: &str) -> i64
    {
        let ctx = ctx.clone();
        engine.register_fn("find_node", move |name: &str| -> FnResult<i64> {
            node_bits(lock_context(&ctx).world.find(name))
        });
    }

    // first_node_with_tag(tag: &str) -> i64
    {
        let ctx = ctx.clone();
        engine.register_fn("first_node_with_tag", move |tag: &str| -> FnResult<i64> {
            node_bits(lock_context(&ctx).world.first_with_tag(tag))
        });
    }

    // node_valid(n: i64) -> bool
    {
        let ctx = ctx.clone();
        engine.register_fn("node_valid", move |n: i64| -> bool {
            match node_handle(n) {
                Ok(node) => lock_context(&ctx).world.is_valid(node),
                Err(_) => false,
            }
        });
    }

    // get_position(n: i64) -> Map #{x, y, z}, empty when the node is gone
    {
        let ctx = ctx.clone();
        engine.register_fn("get_position", move |n: i64| -> FnResult<Map> {
            let node = node_handle(n)?;
            let mut map = Map::new();
            if let Some(p) = lock_context(&ctx).world.position(node) {
                map.insert("x".into(), Dynamic::from(p.x as f64));
                map.insert("y".into(), Dynamic::from(p.y as f64));
                map.insert("z".into(), Dynamic::from(p.z as f64));
            }
            Ok(map)
        });
    }

    // set_position(n: i64, x: f64, y: f64, z: f64) -> bool
    {
        let ctx = ctx.clone();
        engine.register_fn(
            "set_position",
            move |n: i64, x: f64, y: f64, z: f64| -> FnResult<bool> {
                let node = node_handle(n)?;
                let position = Vec3::new(x as f32, y as f32, z as f32);
                Ok(lock_context(&ctx).world.set_position(node, position))
            },
        );
    }

    // has_tag(n: i64, tag: &str) -> bool
    {
        let ctx = ctx.clone();
        engine.register_fn("has_tag", move |n: i64, tag: &str| -> FnResult<bool> {
            let node = node_handle(n)?;
            Ok(lock_context(&ctx).world.has_tag(node, tag))
        });
    }

    // add_tag(n: i64, tag: &str) -> bool
    {
        let ctx = ctx.clone();
        engine.register_fn("add_tag", move |n: i64, tag: &str| -> FnResult<bool> {
            let node = node_handle(n)?;
            Ok(lock_context(&ctx).world.add_tag(node, tag))
        });
    }

    // remove_tag(n: i64, tag: &str) -> bool
    {
        let ctx = ctx.clone();
        engine.register_fn("remove_tag", move |n: i64, tag: &str| -> FnResult<bool> {
            let node = node_handle(n)?;
            Ok(lock_context(&ctx).world.remove_tag(node, tag))
        });
    }

    // despawn_node(n: i64) -> bool
    {
        let ctx = ctx.clone();
        engine.register_fn("despawn_node", move |n: i64| -> FnResult<bool> {
            let node = node_handle(n)?;
            Ok(lock_context(&ctx).world.despawn(node).is_ok())
        });
    }
}

// ─── Time API ────────────────────────────────────────────

fn register_time_api(engine: &mut Engine, ctx: SharedContext) {
    {
        let ctx = ctx.clone();
        engine.register_fn("delta_time", move || -> f64 { lock_context(&ctx).delta_time });
    }
    {
        let ctx = ctx.clone();
        engine.register_fn("time_dilation", move || -> f64 { lock_context(&ctx).dilation });
    }
}

// ─── Log API ─────────────────────────────────────────────

fn register_log_api(engine: &mut Engine, ctx: SharedContext) {
    {
        let ctx = ctx.clone();
        engine.register_fn("log", move |msg: &str| {
            let c = lock_context(&ctx);
            tracing::info!(script = %c.script_name, "{}", msg);
        });
    }
    {
        let ctx = ctx.clone();
        engine.register_fn("log_warn", move |msg: &str| {
            let c = lock_context(&ctx);
            tracing::warn!(script = %c.script_name, "{}", msg);
        });
    }
    {
        let ctx = ctx.clone();
        engine.register_fn("log_error", move |msg: &str| {
            let c = lock_context(&ctx);
            tracing::error!(script = %c.script_name, "{}", msg);
        });
    }
}
