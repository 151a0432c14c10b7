//! Time management utilities

use std::time::{Duration, Instant};

/// High-precision timer for frame timing
pub struct Timer {
    last_frame: Instant,
    delta_time: f32,
    total_time: f32,
    frame_count: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Create a new timer
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta_time: 0.0,
            total_time: 0.0,
            frame_count: 0,
        }
    }

    /// Update the timer (should be called once per frame)
    pub fn update(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_frame);
        self.last_frame = now;
        self.advance(elapsed);
    }

    /// Account for one frame that took `elapsed`
    pub fn advance(&mut self, elapsed: Duration) {
        self.delta_time = elapsed.as_secs_f32();
        self.total_time += self.delta_time;
        self.frame_count += 1;
    }

    /// Get the time since the last frame in seconds
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Get the total elapsed time since timer creation
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Get the current frame count
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Get the average FPS since timer creation
    #[allow(clippy::cast_precision_loss)]
    pub fn average_fps(&self) -> f32 {
        if self.total_time > 0.0 {
            self.frame_count as f32 / self.total_time
        } else {
            0.0
        }
    }

    /// Get the average frame time in milliseconds
    #[allow(clippy::cast_precision_loss)]
    pub fn average_frame_time_ms(&self) -> f32 {
        if self.frame_count > 0 {
            self.total_time * 1000.0 / self.frame_count as f32
        } else {
            0.0
        }
    }

    /// Get the current FPS (based on last frame time)
    pub fn current_fps(&self) -> f32 {
        if self.delta_time > 0.0 {
            1.0 / self.delta_time
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_timer_starts_empty() {
        let timer = Timer::new();
        assert_eq!(timer.frame_count(), 0);
        assert_relative_eq!(timer.average_fps(), 0.0);
        assert_relative_eq!(timer.average_frame_time_ms(), 0.0);
    }

    #[test]
    fn test_timer_averages() {
        let mut timer = Timer::new();
        for _ in 0..4 {
            timer.advance(Duration::from_millis(25));
        }

        assert_eq!(timer.frame_count(), 4);
        assert_relative_eq!(timer.total_time(), 0.1, epsilon = 1e-5);
        assert_relative_eq!(timer.average_fps(), 40.0, epsilon = 1e-3);
        assert_relative_eq!(timer.average_frame_time_ms(), 25.0, epsilon = 1e-3);
        assert_relative_eq!(timer.current_fps(), 40.0, epsilon = 1e-3);
    }
}
