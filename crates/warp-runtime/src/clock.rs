//! Wall-clock frame timer

use std::time::Instant;

/// Default clamp on a single frame delta, in seconds
pub const DEFAULT_MAX_FRAME_TIME: f64 = 0.25;

/// Tracks real time between frames
pub struct GameClock {
    /// Total real time in seconds
    pub total_time: f64,
    /// Real time since last frame in seconds
    pub delta_time: f64,
    /// Upper bound on `delta_time`
    pub max_frame_time: f64,
    /// Frames ticked or advanced so far
    pub frame: u64,
    last_instant: Instant,
    first_tick: bool,
}

impl Default for GameClock {
    fn default() -> Self {
        Self {
            total_time: 0.0,
            delta_time: 0.0,
            max_frame_time: DEFAULT_MAX_FRAME_TIME,
            frame: 0,
            last_instant: Instant::now(),
            first_tick: true,
        }
    }
}

impl GameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_frame_time(max_frame_time: f64) -> Self {
        Self {
            max_frame_time: max_frame_time.max(0.0),
            ..Self::default()
        }
    }

    /// Advance the clock from the wall clock. Call once per frame.
    pub fn tick(&mut self) -> f64 {
        let now = Instant::now();

        if self.first_tick {
            self.first_tick = false;
            self.last_instant = now;
            self.delta_time = 0.0;
            self.frame += 1;
            return 0.0;
        }

        let elapsed = now.duration_since(self.last_instant).as_secs_f64();
        self.last_instant = now;
        self.advance(elapsed)
    }

    /// Advance by an explicit delta (headless runs)
    pub fn advance(&mut self, dt: f64) -> f64 {
        // Clamp to avoid spiral of death
        self.delta_time = dt.max(0.0).min(self.max_frame_time);
        self.total_time += self.delta_time;
        self.frame += 1;
        self.first_tick = false;
        self.delta_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_defaults() {
        let clock = GameClock::new();
        assert!((clock.max_frame_time - 0.25).abs() < 1e-10);
        assert_eq!(clock.total_time, 0.0);
        assert_eq!(clock.delta_time, 0.0);
    }

    #[test]
    fn test_first_tick_zero_delta() {
        let mut clock = GameClock::new();
        assert_eq!(clock.tick(), 0.0);
        assert_eq!(clock.frame, 1);
    }

    #[test]
    fn test_advance_clamps() {
        let mut clock = GameClock::new();
        assert_eq!(clock.advance(1.0), 0.25);
        assert_eq!(clock.advance(-1.0), 0.0);
        assert!((clock.advance(0.1) - 0.1).abs() < 1e-12);
        assert!((clock.total_time - 0.35).abs() < 1e-9);
        assert_eq!(clock.frame, 3);
    }
}
