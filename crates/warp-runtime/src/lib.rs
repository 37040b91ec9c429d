//! Warp Runtime - Frame time infrastructure
//!
//! Provides the per-frame building blocks:
//! - `TimeContext` / `TimeStep` - dilated time, handed out per dependency kind
//! - `GameClock` - wall-clock frame timer with a clamped delta
//! - `TimeWarp` - turns a "warp active" intent into a dilation factor
//! - `RuntimeSystem` - trait for systems ticked once per frame

mod clock;
mod system;
mod time;
mod warp;

pub use clock::GameClock;
pub use system::RuntimeSystem;
pub use time::{TimeContext, TimeDependency, TimeStep};
pub use warp::TimeWarp;
