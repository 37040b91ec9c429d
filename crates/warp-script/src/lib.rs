//! Warp Script - Rhai scripts running as scheduler tasks
//!
//! A script becomes a `ScriptTask` that the scheduler updates like any other
//! task. Scripts can spawn tasks, query and kill them through their handles,
//! and suspend until a task finishes with `wait(handle)`.
//!
//! Callbacks a script may define:
//! - `on_start()` - first frame, after the top-level statements ran
//! - `on_update(dt)` - every frame the script is not suspended; return `true`
//!   to finish
//! - `on_resume(handle)` - the awaited task finished
//!
//! Callbacks run with `this` bound to an object map that persists for the
//! life of the task.

mod api;
mod context;
mod engine;
mod task;

pub use context::{lock_context, ScriptCallContext, SharedContext};
pub use engine::{ScriptContext, ScriptHost};
pub use task::{ScriptTask, DEFAULT_SCRIPT_PRIORITY, WAIT_PRIORITY_OFFSET};
