// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::time::{Duration, Instant};

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let installed = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
    if installed.is_err() {
        tracing::debug!("global subscriber already installed, keeping it");
    }
}

/// Per-tick delta time plus a once-per-second frame counter.
#[derive(Debug)]
pub struct FrameClock {
    last_tick: Instant,
    window_start: Instant,
    frames: u32,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_tick: now,
            window_start: now,
            frames: 0,
        }
    }

    /// Seconds since the previous call (or since construction).
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> f32 {
        let dt = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        dt.as_secs_f32()
    }

    /// Count a frame that actually reached the screen.
    pub fn frame_presented(&mut self) {
        self.frames = self.frames.saturating_add(1);
    }

    /// Drop the running count, e.g. while paused.
    pub fn reset_count(&mut self) {
        self.frames = 0;
        self.window_start = Instant::now();
    }

    /// Returns the frame count once a full second has elapsed, then restarts the window.
    pub fn take_fps(&mut self) -> Option<u32> {
        self.take_fps_at(Instant::now())
    }

    fn take_fps_at(&mut self, now: Instant) -> Option<u32> {
        if now.saturating_duration_since(self.window_start) < Duration::from_secs(1) {
            return None;
        }
        let fps = self.frames;
        self.frames = 0;
        self.window_start = now;
        Some(fps)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
