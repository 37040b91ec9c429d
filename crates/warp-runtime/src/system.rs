//! Runtime system trait

use crate::time::TimeContext;
use warp_core::Result;
use warp_world::NodeWorld;

/// A system ticked once per frame
///
/// Systems are updated in a fixed order. They only ever see the frame's
/// `TimeContext` by shared reference, so dilation cannot change mid-frame.
pub trait RuntimeSystem {
    /// Called once before the first frame
    fn initialize(&mut self, world: &mut NodeWorld) -> Result<()>;

    /// Called once per frame
    fn update(&mut self, world: &mut NodeWorld, time: &TimeContext) -> Result<()>;

    /// Called when the world is torn down
    fn shutdown(&mut self) -> Result<()>;

    /// Human-readable name for this system
    fn name(&self) -> &str;
}
