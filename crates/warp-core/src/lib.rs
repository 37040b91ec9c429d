//! Warp Core - Foundational types for the Warp simulation core
//!
//! This crate provides the core types that all other Warp crates depend on:
//! - `Vec3`, `Color` - Spatial and visual value types
//! - `fields` - Typed readers for persisted TOML tables
//! - Error types and Result alias

mod error;
pub mod fields;
mod types;

pub use error::{Result, WarpError};
pub use types::{Color, Vec3};
