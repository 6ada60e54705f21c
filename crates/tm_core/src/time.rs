//! Session clock: fixed-step accumulator plus the millisecond timeline that
//! sprite-sheet animators and spell schedules are driven from.
//!
//! The timeline only moves in whole fixed steps (`now_ms()` is derived from
//! `fixed_step_count`), so every animation and delayed cue is reproducible
//! for the same step sequence regardless of display frame rate.

use std::time::Instant;

const FPS_SAMPLE_COUNT: usize = 60;

pub struct FrameClock {
    pub fixed_dt: f64,
    pub max_accumulator: f64,
    accumulator: f64,
    pub total_time: f64,
    pub fixed_step_count: u64,
    pub frame_count: u64,
    pub steps_this_frame: u32,
    pub real_dt: f64,
    last_instant: Instant,

    fps_samples: [f64; FPS_SAMPLE_COUNT],
    fps_sample_index: usize,
    pub smoothed_fps: f64,
    pub smoothed_frame_time_ms: f64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            max_accumulator: 0.25,
            accumulator: 0.0,
            total_time: 0.0,
            fixed_step_count: 0,
            frame_count: 0,
            steps_this_frame: 0,
            real_dt: 0.0,
            last_instant: Instant::now(),
            fps_samples: [1.0 / 60.0; FPS_SAMPLE_COUNT],
            fps_sample_index: 0,
            smoothed_fps: 60.0,
            smoothed_frame_time_ms: 16.667,
        }
    }

    /// Milliseconds of simulated time since the session started.
    pub fn now_ms(&self) -> u64 {
        (self.total_time * 1000.0).round() as u64
    }

    pub fn begin_frame(&mut self) {
        let now = Instant::now();
        let real_dt = now.duration_since(self.last_instant).as_secs_f64();
        self.last_instant = now;
        self.begin_frame_with(real_dt);
    }

    /// Feed an explicit wall-clock delta. `begin_frame` measures it; tests
    /// drive this directly.
    pub fn begin_frame_with(&mut self, real_dt: f64) {
        self.real_dt = real_dt.max(0.0);

        // Spiral-of-death cap
        if self.real_dt > self.max_accumulator {
            log::warn!(
                "Frame took {:.1}ms, capping accumulator to {}ms",
                self.real_dt * 1000.0,
                self.max_accumulator * 1000.0
            );
            self.real_dt = self.max_accumulator;
        }

        self.accumulator += self.real_dt;
        self.steps_this_frame = 0;
        self.frame_count += 1;

        self.fps_samples[self.fps_sample_index] = self.real_dt;
        self.fps_sample_index = (self.fps_sample_index + 1) % FPS_SAMPLE_COUNT;
        let avg_dt: f64 = self.fps_samples.iter().sum::<f64>() / FPS_SAMPLE_COUNT as f64;
        self.smoothed_frame_time_ms = avg_dt * 1000.0;
        self.smoothed_fps = if avg_dt > 0.0 { 1.0 / avg_dt } else { 0.0 };
    }

    pub fn should_step(&mut self) -> bool {
        if self.accumulator >= self.fixed_dt {
            self.accumulator -= self.fixed_dt;
            self.fixed_step_count += 1;
            self.total_time = self.fixed_step_count as f64 * self.fixed_dt;
            self.steps_this_frame += 1;
            true
        } else {
            false
        }
    }

    /// Discard accumulated wall time so exactly `steps` fixed steps remain
    /// this frame. Call after `begin_frame` while the simulation is paused.
    pub fn hold(&mut self, steps: u32) {
        self.accumulator = self.fixed_dt * steps as f64;
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
