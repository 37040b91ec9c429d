//! Gameplay time warp control

use warp_core::{Result, WarpError};

/// Converts a per-frame "warp active" intent into a dilation factor
///
/// With a `ramp_time` of zero the factor switches instantly. Otherwise the
/// dilation blends between 1.0 and `warp_factor` over `ramp_time` real seconds.
#[derive(Clone, Debug)]
pub struct TimeWarp {
    warp_factor: f32,
    ramp_time: f32,
    blend: f32,
}

impl TimeWarp {
    pub fn new(warp_factor: f32, ramp_time: f32) -> Result<Self> {
        if !warp_factor.is_finite() || warp_factor <= 0.0 {
            return Err(WarpError::InvalidDilation(warp_factor));
        }
        Ok(Self {
            warp_factor,
            ramp_time: if ramp_time.is_finite() {
                ramp_time.max(0.0)
            } else {
                0.0
            },
            blend: 0.0,
        })
    }

    pub fn warp_factor(&self) -> f32 {
        self.warp_factor
    }

    /// Feed this frame's intent and real delta, returning the dilation to use
    pub fn update(&mut self, active: bool, real_elapsed: f32) -> f32 {
        let target = if active { 1.0 } else { 0.0 };
        if self.ramp_time <= 0.0 {
            self.blend = target;
        } else {
            let step = real_elapsed.max(0.0) / self.ramp_time;
            if self.blend < target {
                self.blend = (self.blend + step).min(target);
            } else {
                self.blend = (self.blend - step).max(target);
            }
        }
        self.dilation()
    }

    pub fn dilation(&self) -> f32 {
        1.0 + (self.warp_factor - 1.0) * self.blend
    }

    pub fn is_engaged(&self) -> bool {
        self.blend > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instant_switch() {
        let mut warp = TimeWarp::new(0.25, 0.0).unwrap();
        assert_eq!(warp.update(true, 0.016), 0.25);
        assert_eq!(warp.update(false, 0.016), 1.0);
    }

    #[test]
    fn test_ramp() {
        let mut warp = TimeWarp::new(3.0, 1.0).unwrap();
        let d = warp.update(true, 0.5);
        assert!((d - 2.0).abs() < 1e-6);
        let d = warp.update(true, 1.0);
        assert!((d - 3.0).abs() < 1e-6);
        let d = warp.update(false, 0.25);
        assert!((d - 2.5).abs() < 1e-6);
        assert!(warp.is_engaged());
    }

    #[test]
    fn test_invalid_factor() {
        assert!(TimeWarp::new(0.0, 1.0).is_err());
        assert!(TimeWarp::new(f32::NAN, 1.0).is_err());
    }
}
