//! Per-frame particle affectors

use crate::particle::Particle;
use toml::value::{Table, Value};
use warp_core::fields::{self, color_value, f32_value, tagged_table, vec3_value};
use warp_core::{Color, Result, Vec3, WarpError};
use warp_runtime::{TimeDependency, TimeStep};

#[derive(Clone, Debug, PartialEq)]
pub enum Affector {
    /// Clamp speed to `limit`
    SpeedLimiter { limit: f32 },
    /// Constant acceleration
    Force { acceleration: Vec3 },
    /// Linear drag, `factor` per second
    Resistance { factor: f32 },
    /// Constant drift added on top of each particle's own velocity
    Translate { velocity: Vec3 },
    /// Color over age
    Fade {
        from: Color,
        to: Color,
        duration: f32,
        kill_at_end: bool,
        only_alpha: bool,
    },
    /// Size over age
    Size {
        from: f32,
        to: f32,
        duration: f32,
        kill_at_end: bool,
    },
}

impl Affector {
    pub fn type_name(&self) -> &'static str {
        match self {
            Affector::SpeedLimiter { .. } => "speed_limiter",
            Affector::Force { .. } => "force",
            Affector::Resistance { .. } => "resistance",
            Affector::Translate { .. } => "translate",
            Affector::Fade { .. } => "fade",
            Affector::Size { .. } => "size",
        }
    }

    pub fn dependency(&self) -> TimeDependency {
        match self {
            Affector::SpeedLimiter { .. } | Affector::Translate { .. } => TimeDependency::Speed,
            _ => TimeDependency::Duration,
        }
    }

    pub fn is_speed_limiter(&self) -> bool {
        matches!(self, Affector::SpeedLimiter { .. })
    }

    /// Apply to every particle still aging. `step` must be built for
    /// `self.dependency()`.
    pub fn apply(&self, particles: &mut [Particle], step: &TimeStep) {
        let live = particles.iter_mut().filter(|p| !p.is_expired());
        match *self {
            Affector::SpeedLimiter { limit } => {
                let limit = limit.max(0.0);
                for p in live {
                    let speed = p.velocity.length();
                    if speed > limit {
                        p.velocity = p.velocity * (limit / speed);
                    }
                }
            }
            Affector::Force { acceleration } => {
                let dv = acceleration * step.elapsed;
                for p in live {
                    p.velocity += dv;
                }
            }
            Affector::Resistance { factor } => {
                let keep = (1.0 - factor * step.elapsed).max(0.0);
                for p in live {
                    p.velocity = p.velocity * keep;
                }
            }
            Affector::Translate { velocity } => {
                let offset = step.distance(velocity);
                for p in live {
                    p.position += offset;
                }
            }
            Affector::Fade {
                from,
                to,
                duration,
                kill_at_end,
                only_alpha,
            } => {
                for p in live {
                    let Some(t) = age_progress(p, duration, kill_at_end) else {
                        continue;
                    };
                    if only_alpha {
                        p.color.a = from.a + (to.a - from.a) * t;
                    } else {
                        p.color = from.lerp(to, t);
                    }
                }
            }
            Affector::Size {
                from,
                to,
                duration,
                kill_at_end,
            } => {
                for p in live {
                    if let Some(t) = age_progress(p, duration, kill_at_end) {
                        p.size = from + (to - from) * t;
                    }
                }
            }
        }
    }

    /// Export as a tagged table
    pub fn to_toml(&self) -> Table {
        let mut t = tagged_table(self.type_name());
        match self {
            Affector::SpeedLimiter { limit } => {
                t.insert("limit".into(), f32_value(*limit));
            }
            Affector::Force { acceleration } => {
                t.insert("acceleration".into(), vec3_value(*acceleration));
            }
            Affector::Resistance { factor } => {
                t.insert("factor".into(), f32_value(*factor));
            }
            Affector::Translate { velocity } => {
                t.insert("velocity".into(), vec3_value(*velocity));
            }
            Affector::Fade {
                from,
                to,
                duration,
                kill_at_end,
                only_alpha,
            } => {
                t.insert("from".into(), color_value(*from));
                t.insert("to".into(), color_value(*to));
                t.insert("duration".into(), f32_value(*duration));
                t.insert("kill_at_end".into(), Value::Boolean(*kill_at_end));
                t.insert("only_alpha".into(), Value::Boolean(*only_alpha));
            }
            Affector::Size {
                from,
                to,
                duration,
                kill_at_end,
            } => {
                t.insert("from".into(), f32_value(*from));
                t.insert("to".into(), f32_value(*to));
                t.insert("duration".into(), f32_value(*duration));
                t.insert("kill_at_end".into(), Value::Boolean(*kill_at_end));
            }
        }
        t
    }

    /// Import from a tagged table
    pub fn from_toml(table: &Table) -> Result<Self> {
        let tag = fields::variant_tag(table, "affector")?;
        let affector = match tag {
            "speed_limiter" => Affector::SpeedLimiter {
                limit: fields::require_f32(table, "speed_limiter affector", "limit")?,
            },
            "force" => Affector::Force {
                acceleration: fields::require_vec3(table, "force affector", "acceleration")?,
            },
            "resistance" => Affector::Resistance {
                factor: fields::require_f32(table, "resistance affector", "factor")?,
            },
            "translate" => Affector::Translate {
                velocity: fields::require_vec3(table, "translate affector", "velocity")?,
            },
            "fade" => {
                let ctx = "fade affector";
                Affector::Fade {
                    from: fields::require_color(table, ctx, "from")?,
                    to: fields::require_color(table, ctx, "to")?,
                    duration: fields::require_f32(table, ctx, "duration")?,
                    kill_at_end: fields::require_bool(table, ctx, "kill_at_end")?,
                    only_alpha: fields::optional_bool(table, ctx, "only_alpha")?.unwrap_or(false),
                }
            }
            "size" => {
                let ctx = "size affector";
                Affector::Size {
                    from: fields::require_f32(table, ctx, "from")?,
                    to: fields::require_f32(table, ctx, "to")?,
                    duration: fields::require_f32(table, ctx, "duration")?,
                    kill_at_end: fields::require_bool(table, ctx, "kill_at_end")?,
                }
            }
            other => {
                return Err(WarpError::UnknownVariant {
                    context: "affector".into(),
                    value: other.into(),
                })
            }
        };
        Ok(affector)
    }
}

/// Interpolation parameter for an age-driven effect, or `None` if the
/// particle was expired by it
fn age_progress(p: &mut Particle, duration: f32, kill_at_end: bool) -> Option<f32> {
    if p.age >= duration {
        if kill_at_end {
            p.expire();
            return None;
        }
        return Some(1.0);
    }
    // duration > age >= 0 here
    Some(p.age / duration)
}

/// Registration order, with speed limiters moved to the end
pub fn ordered_chain(affectors: &[Affector]) -> impl Iterator<Item = &Affector> {
    affectors
        .iter()
        .filter(|a| !a.is_speed_limiter())
        .chain(affectors.iter().filter(|a| a.is_speed_limiter()))
}
