//! ParticleSystem - emitters attached to nodes

use crate::emitter::{Emitter, EmitterConfig};
use crate::particle::{Particle, ParticleInstance};
use crate::rand::ParticleRng;
use warp_core::Result;
use warp_runtime::{RuntimeSystem, TimeContext};
use warp_world::{NodeHandle, NodeWorld};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EmitterId(u64);

impl EmitterId {
    pub fn to_bits(self) -> u64 {
        self.0
    }
}

/// Draw data for one emitter, consumed by the renderer
pub struct ParticleDrawData<'a> {
    pub emitter: EmitterId,
    pub node: NodeHandle,
    pub instances: &'a [ParticleInstance],
}

struct AttachedEmitter {
    id: EmitterId,
    node: NodeHandle,
    emitter: Emitter,
}

/// Runs every emitter once per frame, in attachment order.
///
/// Emitters follow their node. When the node goes away the emitter is
/// dropped along with its particles.
pub struct ParticleSystem {
    emitters: Vec<AttachedEmitter>,
    rng: ParticleRng,
    next_id: u64,
    /// Packed alive particles for all emitters
    instance_buffer: Vec<ParticleInstance>,
    /// Per-emitter (index into `emitters`, start, count)
    instance_ranges: Vec<(usize, usize, usize)>,
}

impl Default for ParticleSystem {
    fn default() -> Self {
        Self::new(0xDEAD_BEEF)
    }
}

impl ParticleSystem {
    pub fn new(seed: u32) -> Self {
        Self {
            emitters: Vec::new(),
            rng: ParticleRng::new(seed),
            next_id: 0,
            instance_buffer: Vec::new(),
            instance_ranges: Vec::new(),
        }
    }

    pub fn attach(&mut self, node: NodeHandle, config: EmitterConfig) -> EmitterId {
        self.next_id += 1;
        let id = EmitterId(self.next_id);
        tracing::debug!(
            emitter = id.0,
            affectors = config.affectors.len(),
            shape = config.shape.type_name(),
            "attached emitter"
        );
        self.emitters.push(AttachedEmitter {
            id,
            node,
            emitter: Emitter::new(config),
        });
        id
    }

    fn find(&self, id: EmitterId) -> Option<&AttachedEmitter> {
        self.emitters.iter().find(|e| e.id == id)
    }

    fn find_mut(&mut self, id: EmitterId) -> Option<&mut AttachedEmitter> {
        self.emitters.iter_mut().find(|e| e.id == id)
    }

    /// Remove an emitter and its particles
    pub fn kill(&mut self, id: EmitterId) -> bool {
        let before = self.emitters.len();
        self.emitters.retain(|e| e.id != id);
        self.emitters.len() != before
    }

    pub fn queue_burst(&mut self, id: EmitterId, count: u32) -> bool {
        match self.find_mut(id) {
            Some(e) => {
                e.emitter.queue_burst(count);
                true
            }
            None => false,
        }
    }

    pub fn set_playing(&mut self, id: EmitterId, playing: bool) -> bool {
        match self.find_mut(id) {
            Some(e) => {
                e.emitter.playing = playing;
                true
            }
            None => false,
        }
    }

    pub fn emitter(&self, id: EmitterId) -> Option<&Emitter> {
        self.find(id).map(|e| &e.emitter)
    }

    pub fn particles(&self, id: EmitterId) -> Option<&[Particle]> {
        self.find(id).map(|e| e.emitter.particles())
    }

    pub fn emitter_ids(&self) -> Vec<EmitterId> {
        self.emitters.iter().map(|e| e.id).collect()
    }

    pub fn emitter_count(&self) -> usize {
        self.emitters.len()
    }

    pub fn total_alive(&self) -> usize {
        self.emitters
            .iter()
            .map(|e| e.emitter.pool.alive_count())
            .sum()
    }

    pub fn clear(&mut self) {
        self.emitters.clear();
        self.instance_buffer.clear();
        self.instance_ranges.clear();
    }

    /// Run emission and simulation for every emitter.
    ///
    /// Each emitter first takes over its node's `EmitterControls` (seeding
    /// them when the node has none) and runs in the node's local time.
    pub fn simulate(&mut self, world: &mut NodeWorld, time: &TimeContext) {
        self.emitters.retain(|e| {
            let alive = world.is_valid(e.node);
            if !alive {
                tracing::debug!(emitter = e.id.0, "emitter node lost, dropping particles");
            }
            alive
        });

        for attached in &mut self.emitters {
            let node = attached.node;
            match world.emitter_controls(node) {
                Some(controls) => attached.emitter.config.apply_controls(&controls),
                None => {
                    world.set_emitter_controls(node, attached.emitter.config.controls());
                }
            }
            let origin = world.position(node).unwrap_or_default();
            let local = time.with_local_multiplier(world.time_multiplier(node).unwrap_or(1.0));
            attached.emitter.update(origin, &local, &mut self.rng);
        }
    }

    /// Pack alive particles into the instance buffer.
    /// Call this after `simulate()`.
    pub fn pack_instances(&mut self) {
        self.instance_buffer.clear();
        self.instance_ranges.clear();

        for (index, attached) in self.emitters.iter().enumerate() {
            let particles = attached.emitter.particles();
            if particles.is_empty() {
                continue;
            }
            let start = self.instance_buffer.len();
            self.instance_buffer
                .extend(particles.iter().map(ParticleInstance::from_particle));
            self.instance_ranges.push((index, start, particles.len()));
        }
    }

    /// Get the packed instance data
    pub fn instances(&self) -> &[ParticleInstance] {
        &self.instance_buffer
    }

    /// Draw data for each emitter that has alive particles
    pub fn draw_data(&self) -> Vec<ParticleDrawData<'_>> {
        self.instance_ranges
            .iter()
            .filter_map(|&(index, start, count)| {
                let attached = self.emitters.get(index)?;
                Some(ParticleDrawData {
                    emitter: attached.id,
                    node: attached.node,
                    instances: &self.instance_buffer[start..start + count],
                })
            })
            .collect()
    }
}

impl RuntimeSystem for ParticleSystem {
    fn initialize(&mut self, _world: &mut NodeWorld) -> Result<()> {
        let count = self.emitter_count();
        if count > 0 {
            tracing::info!(count, "particle emitters ready");
        }
        Ok(())
    }

    fn update(&mut self, world: &mut NodeWorld, time: &TimeContext) -> Result<()> {
        self.simulate(world, time);
        self.pack_instances();
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "particles"
    }
}
