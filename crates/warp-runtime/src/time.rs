//! Dilated frame time

use warp_core::{Result, Vec3, WarpError};

/// Smallest dilation a local multiplier can produce
const MIN_DILATION: f32 = 1e-6;

/// How a time-consuming entity responds to dilation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TimeDependency {
    /// Scales elapsed time (timers, ages, accelerations)
    #[default]
    Duration,
    /// Scales velocities and rates, integrating over real time
    Speed,
}

/// The time slice a single consumer sees for one frame
///
/// Built by [`TimeContext::step`] for the consumer's declared dependency.
/// Consumers never read the context itself.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeStep {
    pub elapsed: f32,
    pub speed_factor: f32,
}

impl TimeStep {
    pub const ZERO: Self = Self {
        elapsed: 0.0,
        speed_factor: 1.0,
    };

    /// Displacement produced by `velocity` over this step
    pub fn distance(&self, velocity: Vec3) -> Vec3 {
        velocity * (self.speed_factor * self.elapsed)
    }

    /// Dilated seconds covered by this step, whatever its kind
    pub fn scaled(&self) -> f32 {
        self.elapsed * self.speed_factor
    }
}

/// Real frame delta plus the gameplay-controlled dilation factor
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeContext {
    real_elapsed: f32,
    dilation: f32,
}

impl Default for TimeContext {
    fn default() -> Self {
        Self {
            real_elapsed: 0.0,
            dilation: 1.0,
        }
    }
}

impl TimeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for a single frame, used by tests and headless drivers
    pub fn with(real_elapsed: f32, dilation: f32) -> Result<Self> {
        let mut ctx = Self::default();
        ctx.set_dilation(dilation)?;
        ctx.begin_frame(real_elapsed);
        Ok(ctx)
    }

    /// Record this frame's wall delta. Negative or non-finite deltas become 0.
    pub fn begin_frame(&mut self, real_elapsed: f32) {
        self.real_elapsed = if real_elapsed.is_finite() && real_elapsed > 0.0 {
            real_elapsed
        } else {
            0.0
        };
    }

    /// Change the dilation between frames
    pub fn set_dilation(&mut self, dilation: f32) -> Result<()> {
        if !dilation.is_finite() || dilation <= 0.0 {
            return Err(WarpError::InvalidDilation(dilation));
        }
        self.dilation = dilation;
        Ok(())
    }

    pub fn real_elapsed(&self) -> f32 {
        self.real_elapsed
    }

    pub fn dilation(&self) -> f32 {
        self.dilation
    }

    pub fn scaled_elapsed(&self) -> f32 {
        self.real_elapsed * self.dilation
    }

    pub fn scaled_speed_factor(&self) -> f32 {
        self.dilation
    }

    pub fn step(&self, kind: TimeDependency) -> TimeStep {
        match kind {
            TimeDependency::Duration => TimeStep {
                elapsed: self.scaled_elapsed(),
                speed_factor: 1.0,
            },
            TimeDependency::Speed => TimeStep {
                elapsed: self.real_elapsed,
                speed_factor: self.scaled_speed_factor(),
            },
        }
    }

    /// Derive a context running `multiplier` times faster than this one
    pub fn with_local_multiplier(&self, multiplier: f32) -> Self {
        let m = if multiplier.is_finite() {
            multiplier.max(MIN_DILATION)
        } else {
            1.0
        };
        Self {
            real_elapsed: self.real_elapsed,
            dilation: (self.dilation * m).max(MIN_DILATION),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ctx = TimeContext::new();
        assert_eq!(ctx.dilation(), 1.0);
        assert_eq!(ctx.real_elapsed(), 0.0);
    }

    #[test]
    fn test_rejects_bad_dilation() {
        let mut ctx = TimeContext::new();
        assert!(ctx.set_dilation(0.0).is_err());
        assert!(ctx.set_dilation(-2.0).is_err());
        assert!(ctx.set_dilation(f32::NAN).is_err());
        assert!(ctx.set_dilation(f32::INFINITY).is_err());
        assert_eq!(ctx.dilation(), 1.0);
    }

    #[test]
    fn test_negative_delta_clamped() {
        let mut ctx = TimeContext::new();
        ctx.begin_frame(-0.5);
        assert_eq!(ctx.real_elapsed(), 0.0);
        ctx.begin_frame(f32::NAN);
        assert_eq!(ctx.real_elapsed(), 0.0);
    }

    #[test]
    fn test_duration_and_speed_steps_agree_on_distance() {
        let velocity = Vec3::new(2.0, -1.0, 0.5);
        for &d in &[0.25_f32, 1.0, 3.0] {
            let ctx = TimeContext::with(0.1, d).unwrap();
            let a = ctx.step(TimeDependency::Duration).distance(velocity);
            let b = ctx.step(TimeDependency::Speed).distance(velocity);
            assert!((a - b).length() < 1e-6);
            assert!((a - velocity * (0.1 * d)).length() < 1e-6);
        }
    }

    #[test]
    fn test_step_fields() {
        let ctx = TimeContext::with(0.2, 0.5).unwrap();
        let dur = ctx.step(TimeDependency::Duration);
        assert!((dur.elapsed - 0.1).abs() < 1e-6);
        assert_eq!(dur.speed_factor, 1.0);

        let spd = ctx.step(TimeDependency::Speed);
        assert!((spd.elapsed - 0.2).abs() < 1e-6);
        assert_eq!(spd.speed_factor, 0.5);
        assert!((spd.scaled() - dur.scaled()).abs() < 1e-6);
    }

    #[test]
    fn test_local_multiplier() {
        let ctx = TimeContext::with(0.1, 2.0).unwrap();
        let local = ctx.with_local_multiplier(0.5);
        assert!((local.scaled_elapsed() - 0.1).abs() < 1e-6);
        let frozen = ctx.with_local_multiplier(0.0);
        assert!(frozen.dilation() > 0.0);
    }
}
