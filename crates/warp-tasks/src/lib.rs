//! Warp Tasks - Timed behaviors attached to world nodes
//!
//! - `Task` - the contract every timed behavior implements
//! - `Wait`, `WaitTag`, `Translate` - built-in behaviors
//! - `NodeTimeWarp`, `EmitterRamp` - ramps over a node's time scale and emitter
//! - `TaskRegistry` - owner of opaque task handles, shared with script hosts
//! - `TaskScheduler` - updates live tasks in priority order and reaps finished ones

mod easing;
mod emitter_ramp;
mod registry;
mod scheduler;
mod task;
mod time_warp;
mod translate;
mod wait;
mod wait_tag;

pub use easing::Easing;
pub use emitter_ramp::{EmitterRamp, EmitterTarget};
pub use registry::{lock_registry, BridgeError, SharedRegistry, TaskHandle, TaskRegistry};
pub use scheduler::TaskScheduler;
pub use task::{Task, TaskOutcome};
pub use time_warp::NodeTimeWarp;
pub use translate::Translate;
pub use wait::Wait;
pub use wait_tag::{TagPredicate, WaitTag};
