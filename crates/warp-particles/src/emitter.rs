//! Emitter configuration (parsed from TOML) and runtime state

use crate::affector::{ordered_chain, Affector};
use crate::particle::{Particle, ParticlePool};
use crate::rand::ParticleRng;
use crate::shape::EmitterShape;
use toml::value::{Table, Value};
use warp_core::fields::{self, color_value, f32_value, vec3_value};
use warp_core::{Color, Result, Vec3, WarpError};
use warp_runtime::{TimeContext, TimeDependency};
use warp_world::EmitterControls;

/// Hard ceiling on a single emitter's pool
pub const MAX_PARTICLES: usize = 10_000;

const CONTEXT: &str = "emitter";

/// Configuration parsed from an `emitter` TOML table
#[derive(Debug, Clone, PartialEq)]
pub struct EmitterConfig {
    /// Particles per dilated second
    pub emission_rate: f32,
    /// Particles spawned once when the emitter starts
    pub burst_count: u32,
    pub max_particles: usize,
    pub lifetime_min: f32,
    pub lifetime_max: f32,
    pub speed_min: f32,
    pub speed_max: f32,
    /// Used when the shape gives no direction
    pub direction: Vec3,
    /// Cone half-angle around `direction`, degrees
    pub spread: f32,
    pub color: Color,
    pub size: f32,
    pub shape: EmitterShape,
    pub affectors: Vec<Affector>,
    /// Emitter-local time at which emission starts
    pub start_time: f32,
    /// Emitter-local time at which emission stops
    pub end_time: Option<f32>,
    /// Per-emitter speed-up on top of the global dilation
    pub time_multiplier: f32,
    pub playing: bool,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            emission_rate: 10.0,
            burst_count: 0,
            max_particles: 256,
            lifetime_min: 1.0,
            lifetime_max: 2.0,
            speed_min: 1.0,
            speed_max: 3.0,
            direction: Vec3::UP,
            spread: 15.0,
            color: Color::WHITE,
            size: 0.1,
            shape: EmitterShape::default(),
            affectors: Vec::new(),
            start_time: 0.0,
            end_time: None,
            time_multiplier: 1.0,
            playing: true,
        }
    }
}

impl EmitterConfig {
    /// Parse an EmitterConfig from a TOML table.
    ///
    /// Absent scalar settings keep their defaults. Ill-typed values and
    /// malformed `shape` / `affectors` tables are errors.
    pub fn from_toml(table: &Table) -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = fields::optional_f32(table, CONTEXT, "emission_rate")? {
            config.emission_rate = v;
        }
        if let Some(v) = fields::optional_u32(table, CONTEXT, "burst_count")? {
            config.burst_count = v;
        }
        if let Some(v) = fields::optional_u32(table, CONTEXT, "max_particles")? {
            config.max_particles = (v as usize).min(MAX_PARTICLES);
        }
        if let Some(v) = fields::optional_f32(table, CONTEXT, "lifetime_min")? {
            config.lifetime_min = v;
        }
        if let Some(v) = fields::optional_f32(table, CONTEXT, "lifetime_max")? {
            config.lifetime_max = v;
        }
        if let Some(v) = fields::optional_f32(table, CONTEXT, "speed_min")? {
            config.speed_min = v;
        }
        if let Some(v) = fields::optional_f32(table, CONTEXT, "speed_max")? {
            config.speed_max = v;
        }
        if let Some(v) = fields::optional_vec3(table, CONTEXT, "direction")? {
            config.direction = v;
        }
        if let Some(v) = fields::optional_f32(table, CONTEXT, "spread")? {
            config.spread = v;
        }
        if let Some(v) = fields::optional_color(table, CONTEXT, "color")? {
            config.color = v;
        }
        if let Some(v) = fields::optional_f32(table, CONTEXT, "size")? {
            config.size = v;
        }
        if let Some(v) = fields::optional_f32(table, CONTEXT, "start_time")? {
            config.start_time = v;
        }
        config.end_time = fields::optional_f32(table, CONTEXT, "end_time")?;
        if let Some(v) = fields::optional_f32(table, CONTEXT, "time_multiplier")? {
            config.time_multiplier = v;
        }
        if let Some(v) = fields::optional_bool(table, CONTEXT, "playing")? {
            config.playing = v;
        }

        if let Some(v) = table.get("shape") {
            let shape = v
                .as_table()
                .ok_or_else(|| WarpError::invalid(CONTEXT, "shape", "a table"))?;
            config.shape = EmitterShape::from_toml(shape)?;
        }

        if let Some(v) = table.get("affectors") {
            let list = v
                .as_array()
                .ok_or_else(|| WarpError::invalid(CONTEXT, "affectors", "an array of tables"))?;
            for item in list {
                let t = item
                    .as_table()
                    .ok_or_else(|| WarpError::invalid(CONTEXT, "affectors", "an array of tables"))?;
                config.affectors.push(Affector::from_toml(t)?);
            }
        }

        Ok(config)
    }

    /// The parameters tasks can ramp through the emitter's node
    pub fn controls(&self) -> EmitterControls {
        EmitterControls {
            emission_rate: self.emission_rate,
            speed_min: self.speed_min,
            speed_max: self.speed_max,
            radius: match self.shape {
                EmitterShape::Sphere { radius, .. } => Some(radius),
                _ => None,
            },
        }
    }

    /// Take over ramped parameters. A radius only affects sphere shapes.
    pub fn apply_controls(&mut self, controls: &EmitterControls) {
        self.emission_rate = controls.emission_rate;
        self.speed_min = controls.speed_min;
        self.speed_max = controls.speed_max;
        if let (Some(r), EmitterShape::Sphere { radius, .. }) = (controls.radius, &mut self.shape) {
            *radius = r.abs();
        }
    }

    /// Export every field, including defaults
    pub fn to_toml(&self) -> Table {
        let mut t = Table::new();
        t.insert("emission_rate".into(), f32_value(self.emission_rate));
        t.insert(
            "burst_count".into(),
            Value::Integer(i64::from(self.burst_count)),
        );
        t.insert(
            "max_particles".into(),
            Value::Integer(self.max_particles as i64),
        );
        t.insert("lifetime_min".into(), f32_value(self.lifetime_min));
        t.insert("lifetime_max".into(), f32_value(self.lifetime_max));
        t.insert("speed_min".into(), f32_value(self.speed_min));
        t.insert("speed_max".into(), f32_value(self.speed_max));
        t.insert("direction".into(), vec3_value(self.direction));
        t.insert("spread".into(), f32_value(self.spread));
        t.insert("color".into(), color_value(self.color));
        t.insert("size".into(), f32_value(self.size));
        t.insert("start_time".into(), f32_value(self.start_time));
        if let Some(end) = self.end_time {
            t.insert("end_time".into(), f32_value(end));
        }
        t.insert("time_multiplier".into(), f32_value(self.time_multiplier));
        t.insert("playing".into(), Value::Boolean(self.playing));
        t.insert("shape".into(), Value::Table(self.shape.to_toml()));
        t.insert(
            "affectors".into(),
            Value::Array(
                self.affectors
                    .iter()
                    .map(|a| Value::Table(a.to_toml()))
                    .collect(),
            ),
        );
        t
    }
}

/// Runtime state for one emitter
pub struct Emitter {
    pub config: EmitterConfig,
    pub pool: ParticlePool,
    /// Fractional particle accumulator for sub-frame emission
    pub accumulator: f64,
    /// Dilated time since the emitter started
    pub emitter_time: f64,
    /// Burst particles queued for the next update
    pub pending_burst: u32,
    pub playing: bool,
    /// Particles created over the emitter's life
    pub spawned_total: u64,
    /// Particles that did not fit in the pool
    pub dropped_total: u64,
}

impl Emitter {
    pub fn new(config: EmitterConfig) -> Self {
        let pool = ParticlePool::new(config.max_particles.min(MAX_PARTICLES));
        Self {
            pending_burst: config.burst_count,
            playing: config.playing,
            pool,
            config,
            accumulator: 0.0,
            emitter_time: 0.0,
            spawned_total: 0,
            dropped_total: 0,
        }
    }

    pub fn particles(&self) -> &[Particle] {
        self.pool.alive_slice()
    }

    pub fn queue_burst(&mut self, count: u32) {
        self.pending_burst = self.pending_burst.saturating_add(count);
    }

    /// One frame: emit, run affectors, integrate, compact
    pub fn update(&mut self, origin: Vec3, time: &TimeContext, rng: &mut ParticleRng) {
        let local = time.with_local_multiplier(self.config.time_multiplier);
        let duration = local.step(TimeDependency::Duration);
        let speed = local.step(TimeDependency::Speed);

        if self.playing {
            let elapsed = f64::from(duration.elapsed);
            let previous = self.emitter_time;
            self.emitter_time += elapsed;
            let rate = f64::from(self.config.emission_rate);
            if rate.is_finite() && rate > 0.0 {
                let active = self.active_span(previous, elapsed);
                self.accumulator += rate * active;
                let count = self.accumulator.floor();
                self.accumulator -= count;
                // float to int casts saturate
                self.spawn_many(count as u64, origin, rng);
            }
        }

        let burst = std::mem::take(&mut self.pending_burst);
        self.spawn_many(u64::from(burst), origin, rng);

        let particles = self.pool.alive_slice_mut();
        for affector in ordered_chain(&self.config.affectors) {
            affector.apply(particles, &local.step(affector.dependency()));
        }

        for p in particles.iter_mut() {
            p.age = (p.age + duration.elapsed).min(p.lifetime);
            p.position += speed.distance(p.velocity);
        }

        self.pool.compact();
    }

    /// Portion of the frame `[from, from + elapsed]` inside the generation
    /// window. A frame wholly inside the window contributes `elapsed` as is,
    /// so long-running emitters never lose precision to `to - from`.
    fn active_span(&self, from: f64, elapsed: f64) -> f64 {
        let to = from + elapsed;
        let start = f64::from(self.config.start_time);
        let end = self.config.end_time.map(f64::from);
        let opened = from >= start;
        let open_through = end.map_or(true, |end| to <= end);
        if opened && open_through {
            return elapsed;
        }
        let lo = from.max(start);
        let hi = end.map_or(to, |end| to.min(end));
        (hi - lo).max(0.0)
    }

    /// Spawn up to `count` particles; whatever does not fit is only counted
    fn spawn_many(&mut self, count: u64, origin: Vec3, rng: &mut ParticleRng) {
        let room = self.pool.capacity().saturating_sub(self.pool.alive_count()) as u64;
        let spawn = count.min(room);
        for _ in 0..spawn {
            if !self.spawn_particle(origin, rng) {
                self.dropped_total = self.dropped_total.saturating_add(1);
            }
        }
        self.dropped_total = self.dropped_total.saturating_add(count - spawn);
    }

    fn spawn_particle(&mut self, origin: Vec3, rng: &mut ParticleRng) -> bool {
        if self.pool.is_full() {
            return false;
        }
        let config = &self.config;
        let sample = config.shape.sample(rng);
        let direction = if sample.direction.length_squared() > 1e-12 {
            sample.direction
        } else {
            rng.cone_direction(config.direction, config.spread)
        };
        let speed = rng.range(config.speed_min, config.speed_max);
        let lifetime = rng.range(config.lifetime_min, config.lifetime_max).max(0.0);
        let id = self.spawned_total;

        let Some(p) = self.pool.spawn() else {
            return false;
        };
        *p = Particle {
            position: origin + sample.position,
            velocity: direction * speed,
            age: 0.0,
            lifetime,
            color: config.color,
            size: config.size,
            rotation: 0.0,
            id,
        };
        self.spawned_total += 1;
        true
    }
}
