// UI components for the cabinet front end
pub mod menu;

/// Frames averaged for the FPS readout
const FRAME_MEMORY: usize = 20;

/// Rolling average over the last few frame times
pub struct FpsCounter {
    frame_times: [f32; FRAME_MEMORY],
    next: usize,
}

impl FpsCounter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            frame_times: [1.0 / 200.0; FRAME_MEMORY],
            next: 0,
        }
    }

    /// Record the duration of the frame that just finished, in seconds
    pub fn record(&mut self, frame_time: f32) {
        self.frame_times[self.next] = frame_time.max(f32::EPSILON);
        self.next = (self.next + 1) % FRAME_MEMORY;
    }

    #[must_use]
    pub fn fps(&self) -> f32 {
        let total: f32 = self.frame_times.iter().sum();
        FRAME_MEMORY as f32 / total
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_averages_recorded_frames() {
        let mut counter = FpsCounter::new();
        for _ in 0..FRAME_MEMORY {
            counter.record(1.0 / 60.0);
        }
        assert!((counter.fps() - 60.0).abs() < 0.5);

        for _ in 0..FRAME_MEMORY {
            counter.record(1.0 / 30.0);
        }
        assert!((counter.fps() - 30.0).abs() < 0.5);
    }

    #[test]
    fn test_zero_frame_time_does_not_divide_by_zero() {
        let mut counter = FpsCounter::new();
        for _ in 0..FRAME_MEMORY {
            counter.record(0.0);
        }
        assert!(counter.fps().is_finite());
    }
}
