//! Warp World - Nodes that tasks and emitters act on
//!
//! Nodes live in a `hecs` world. Tasks and emitters hold a `NodeHandle`, a
//! generation-checked reference that stays detectably invalid once the node
//! is gone, even if its slot is reused.

mod world;

pub use world::{EmitterControls, NodeHandle, NodeWorld};
