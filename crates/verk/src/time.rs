//! Frame timing.
//!
//! The [`FrameTime`] resource is advanced by the scheduler at the start of
//! every [`run`](crate::Scheduler::run), before any stage executes. Systems
//! declare it like any other resource: `fn step(time: Res<FrameTime>)`.

use std::time::{Duration, Instant};

/// Frame timing resource.
#[derive(Clone, Copy, Debug)]
pub struct FrameTime {
    /// When the scheduler first advanced the clock.
    startup: Instant,
    /// When the current frame started.
    frame_start: Instant,
    /// Duration of the previous frame.
    delta: Duration,
    /// Total time since startup.
    elapsed: Duration,
    /// Frames started so far, including the current one.
    frame_count: u64,
}

impl Default for FrameTime {
    fn default() -> Self {
        let now = Instant::now();
        Self {
            startup: now,
            frame_start: now,
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
        }
    }
}

impl FrameTime {
    /// Called by the scheduler at the start of each frame.
    pub(crate) fn advance(&mut self) {
        let now = Instant::now();
        if self.frame_count > 0 {
            self.delta = now - self.frame_start;
        }
        self.frame_start = now;
        self.elapsed = now - self.startup;
        self.frame_count += 1;
    }

    /// Duration of the previous frame. Zero on the first frame.
    pub fn delta(&self) -> Duration {
        self.delta
    }

    pub fn delta_secs(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }

    /// 1-based index of the current frame.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Estimated rate based on the last frame's delta.
    pub fn fps(&self) -> f32 {
        if self.delta.as_secs_f32() > 0.0 {
            1.0 / self.delta.as_secs_f32()
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_has_zero_delta() {
        let mut time = FrameTime::default();
        time.advance();
        assert_eq!(time.frame_count(), 1);
        assert_eq!(time.delta(), Duration::ZERO);
        assert_eq!(time.fps(), 0.0);
    }

    #[test]
    fn later_frames_measure_delta() {
        let mut time = FrameTime::default();
        time.advance();
        std::thread::sleep(Duration::from_millis(2));
        time.advance();
        assert_eq!(time.frame_count(), 2);
        assert!(time.delta() >= Duration::from_millis(2));
        assert!(time.elapsed() >= time.delta());
    }
}
