use std::time::{Duration, Instant};

/// Radius of the camera orbit around the origin.
pub const ORBIT_RADIUS: f32 = 8.0;
/// Fixed camera height above the ground plane.
pub const ORBIT_HEIGHT: f32 = 4.0;

/// Abstraction over where frame timestamps originate from.
pub trait TimeSource {
    /// Current time relative to an arbitrary, fixed origin.
    fn now(&mut self) -> Duration;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl TimeSource for MonotonicClock {
    fn now(&mut self) -> Duration {
        self.origin.elapsed()
    }
}

/// Camera position on its orbit after `seconds`; one revolution every 2π s.
pub fn camera_position(seconds: f32) -> [f32; 3] {
    [
        -seconds.sin() * ORBIT_RADIUS,
        ORBIT_HEIGHT,
        seconds.cos() * ORBIT_RADIUS,
    ]
}

/// Per-frame values derived from the loop's start timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameState {
    /// Seconds since the first frame.
    pub elapsed: f32,
    pub camera: [f32; 3],
}

impl FrameState {
    pub fn new(start: Duration, now: Duration) -> Self {
        let elapsed = now.saturating_sub(start).as_secs_f32();
        Self {
            elapsed,
            camera: camera_position(elapsed),
        }
    }
}
