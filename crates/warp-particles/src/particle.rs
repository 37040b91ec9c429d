//! Particle types: simulation state and renderer instance data

use bytemuck::{Pod, Zeroable};
use warp_core::{Color, Vec3};

/// Simulation state for one particle
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Dilated seconds since spawn, never above `lifetime`
    pub age: f32,
    pub lifetime: f32,
    pub color: Color,
    pub size: f32,
    pub rotation: f32,
    /// Spawn sequence within the owning emitter
    pub id: u64,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            age: 0.0,
            lifetime: 0.0,
            color: Color::WHITE,
            size: 0.0,
            rotation: 0.0,
            id: 0,
        }
    }
}

impl Particle {
    pub fn is_expired(&self) -> bool {
        self.age >= self.lifetime
    }

    /// Mark for removal at the next compaction
    pub fn expire(&mut self) {
        self.age = self.lifetime;
    }

    /// Normalized age in [0, 1]
    pub fn age_ratio(&self) -> f32 {
        if self.lifetime <= 0.0 {
            1.0
        } else {
            (self.age / self.lifetime).min(1.0)
        }
    }
}

/// Renderer instance data.
/// 48 bytes, 3 rows of vec4.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ParticleInstance {
    /// xyz = position, w = size
    pub pos_size: [f32; 4],
    /// rgba
    pub color: [f32; 4],
    /// x = rotation, y = age ratio
    pub rotation_age: [f32; 4],
}

impl ParticleInstance {
    pub fn from_particle(p: &Particle) -> Self {
        Self {
            pos_size: [p.position.x, p.position.y, p.position.z, p.size],
            color: p.color.to_array(),
            rotation_age: [p.rotation, p.age_ratio(), 0.0, 0.0],
        }
    }
}

/// Capacity-bounded particle storage.
///
/// Survivors keep their spawn order across compaction, so draw order matches
/// spawn order.
pub struct ParticlePool {
    particles: Vec<Particle>,
    capacity: usize,
}

impl ParticlePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            particles: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn alive_count(&self) -> usize {
        self.particles.len()
    }

    pub fn is_full(&self) -> bool {
        self.particles.len() >= self.capacity
    }

    /// Spawn one particle, returning a mutable ref to initialize it.
    /// Returns None if pool is full.
    pub fn spawn(&mut self) -> Option<&mut Particle> {
        if self.is_full() {
            return None;
        }
        self.particles.push(Particle::default());
        self.particles.last_mut()
    }

    /// Remove expired particles, preserving the order of survivors
    pub fn compact(&mut self) -> usize {
        let before = self.particles.len();
        self.particles.retain(|p| !p.is_expired());
        before - self.particles.len()
    }

    pub fn alive_slice(&self) -> &[Particle] {
        &self.particles
    }

    pub fn alive_slice_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }
}
