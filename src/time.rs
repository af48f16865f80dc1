use std::time::{Duration, Instant};

/// Longest step fed to camera movement after a stall.
const MAX_FRAME_DELTA: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug)]
pub struct FrameClock {
    last: Instant,
}

impl FrameClock {
    pub fn new() -> Self {
        Self { last: Instant::now() }
    }

    /// Seconds since the previous tick.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let delta = clamp_delta(now.duration_since(self.last));
        self.last = now;
        delta.as_secs_f32()
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_delta(delta: Duration) -> Duration {
    delta.min(MAX_FRAME_DELTA)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_stalls_are_clamped() {
        assert_eq!(clamp_delta(Duration::from_secs(3)), MAX_FRAME_DELTA);
        assert_eq!(clamp_delta(Duration::from_millis(16)), Duration::from_millis(16));
    }

    #[test]
    fn ticks_are_non_negative() {
        let mut clock = FrameClock::new();
        assert!(clock.tick() >= 0.0);
        assert!(clock.tick() <= MAX_FRAME_DELTA.as_secs_f32());
    }
}
