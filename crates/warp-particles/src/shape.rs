//! Emission shapes
//!
//! A shape turns one RNG draw into a spawn position and an advisory direction.
//! Shapes hold configuration only, so sampling never mutates them.

use crate::rand::ParticleRng;
use toml::value::{Table, Value};
use warp_core::fields::{self, f32_value, tagged_table, vec3_value};
use warp_core::{Result, Vec3, WarpError};

/// One sampled spawn point
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapeSample {
    pub position: Vec3,
    /// Unit length, or zero when the shape has no inherent direction
    pub direction: Vec3,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EmitterShape {
    Point {
        position: Vec3,
    },
    Box {
        min: Vec3,
        max: Vec3,
    },
    Sphere {
        center: Vec3,
        radius: f32,
        /// Sample on the surface instead of inside the ball
        border: bool,
    },
    Cone {
        position: Vec3,
        axis: Vec3,
        /// Half-angle in degrees
        angle: f32,
    },
}

impl Default for EmitterShape {
    fn default() -> Self {
        EmitterShape::Point {
            position: Vec3::ZERO,
        }
    }
}

impl EmitterShape {
    pub fn point(position: Vec3) -> Self {
        EmitterShape::Point { position }
    }

    /// Axis-aligned box. Corners may be given in any order.
    pub fn aabb(a: Vec3, b: Vec3) -> Self {
        EmitterShape::Box {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn sphere(center: Vec3, radius: f32, border: bool) -> Self {
        EmitterShape::Sphere {
            center,
            radius: radius.abs(),
            border,
        }
    }

    pub fn cone(position: Vec3, axis: Vec3, angle: f32) -> Self {
        EmitterShape::Cone {
            position,
            axis,
            angle: if angle.is_nan() { 0.0 } else { angle.clamp(0.0, 180.0) },
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            EmitterShape::Point { .. } => "point",
            EmitterShape::Box { .. } => "box",
            EmitterShape::Sphere { .. } => "sphere",
            EmitterShape::Cone { .. } => "cone",
        }
    }

    pub fn sample(&self, rng: &mut ParticleRng) -> ShapeSample {
        match *self {
            EmitterShape::Point { position } => ShapeSample {
                position,
                direction: Vec3::ZERO,
            },
            EmitterShape::Box { min, max } => {
                let p = Vec3::new(
                    rng.range(min.x, max.x),
                    rng.range(min.y, max.y),
                    rng.range(min.z, max.z),
                );
                ShapeSample {
                    // Rounding at u = 1 can land a hair past `max`
                    position: p.max(min).min(max),
                    direction: rng.random_direction(),
                }
            }
            EmitterShape::Sphere {
                center,
                radius,
                border,
            } => {
                if !radius.is_finite() || radius <= 0.0 {
                    return ShapeSample {
                        position: center,
                        direction: rng.random_direction(),
                    };
                }
                let radial = rng.random_direction();
                if border {
                    ShapeSample {
                        position: center + radial * radius,
                        direction: radial,
                    }
                } else {
                    let r = radius * rng.next_f32().cbrt();
                    ShapeSample {
                        position: center + radial * r,
                        direction: rng.random_direction(),
                    }
                }
            }
            EmitterShape::Cone {
                position,
                axis,
                angle,
            } => ShapeSample {
                position,
                direction: rng.cone_direction(axis, angle),
            },
        }
    }

    /// Export as a tagged table
    pub fn to_toml(&self) -> Table {
        let mut t = tagged_table(self.type_name());
        match self {
            EmitterShape::Point { position } => {
                t.insert("position".into(), vec3_value(*position));
            }
            EmitterShape::Box { min, max } => {
                t.insert("min".into(), vec3_value(*min));
                t.insert("max".into(), vec3_value(*max));
            }
            EmitterShape::Sphere {
                center,
                radius,
                border,
            } => {
                t.insert("center".into(), vec3_value(*center));
                t.insert("radius".into(), f32_value(*radius));
                t.insert("border".into(), Value::Boolean(*border));
            }
            EmitterShape::Cone {
                position,
                axis,
                angle,
            } => {
                t.insert("position".into(), vec3_value(*position));
                t.insert("axis".into(), vec3_value(*axis));
                t.insert("angle".into(), f32_value(*angle));
            }
        }
        t
    }

    /// Import from a tagged table
    pub fn from_toml(table: &Table) -> Result<Self> {
        let tag = fields::variant_tag(table, "emitter shape")?;
        match tag {
            "point" => Ok(Self::point(fields::require_vec3(
                table,
                "point shape",
                "position",
            )?)),
            "box" => Ok(Self::aabb(
                fields::require_vec3(table, "box shape", "min")?,
                fields::require_vec3(table, "box shape", "max")?,
            )),
            "sphere" => Ok(Self::sphere(
                fields::require_vec3(table, "sphere shape", "center")?,
                fields::require_f32(table, "sphere shape", "radius")?,
                fields::require_bool(table, "sphere shape", "border")?,
            )),
            "cone" => Ok(Self::cone(
                fields::require_vec3(table, "cone shape", "position")?,
                fields::require_vec3(table, "cone shape", "axis")?,
                fields::require_f32(table, "cone shape", "angle")?,
            )),
            other => Err(WarpError::UnknownVariant {
                context: "emitter shape".into(),
                value: other.into(),
            }),
        }
    }
}
