//! Warp Particles - Emission, shaping, and affecting of transient particles
//!
//! Provides pooled per-emitter particle simulation with:
//! - Pluggable emission shapes (`EmitterShape`) and affector chains (`Affector`)
//! - Fractional emission accumulation under time dilation
//! - Stable compaction so survivors keep spawn order
//! - Packed instance data for the renderer

pub mod affector;
pub mod emitter;
pub mod particle;
pub mod rand;
pub mod shape;
mod system;

pub use affector::Affector;
pub use emitter::{Emitter, EmitterConfig};
pub use particle::{Particle, ParticleInstance, ParticlePool};
pub use shape::{EmitterShape, ShapeSample};
pub use system::{EmitterId, ParticleDrawData, ParticleSystem};
