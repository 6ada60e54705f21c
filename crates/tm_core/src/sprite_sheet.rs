//! Sprite-sheet animation: a grid of frames in one texture atlas, advanced on
//! a millisecond timeline.
//!
//! The animator owns no texture. It answers two questions for its owner:
//! "is a new frame due at `now`?" ([`SpriteSheetAnimator::advance`]) and
//! "which sub-rectangle of the atlas shows frame `n`?" ([`frame_rect`]).
//!
//! Frame `n` lives at column `n % columns` and row `(n / columns) % rows`.
//! Row 0 is the visually top row of the image.

use crate::error::SpellError;

/// Inward UV inset applied to every frame rectangle so linear or mip
/// sampling never picks up texels from the neighbouring frame.
pub const FRAME_BLEED_EPSILON: f32 = 0.0005;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Playback {
    /// Play once, then deactivate and report [`FrameEvent::Finished`].
    #[default]
    OneShot,
    /// Wrap forever, reporting [`FrameEvent::CycleComplete`] at each wrap.
    Looping,
}

/// Frame layout of an atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetGrid {
    pub columns: u32,
    pub rows: u32,
    pub total_frames: u32,
}

impl SheetGrid {
    pub fn new(columns: u32, rows: u32, total_frames: u32) -> Result<Self, SpellError> {
        if columns == 0 || rows == 0 || total_frames == 0 {
            return Err(SpellError::InvalidConfig(format!(
                "sprite sheet grid {columns}x{rows} with {total_frames} frames: \
                 columns, rows and frame count must all be positive"
            )));
        }
        let capacity = columns as u64 * rows as u64;
        if total_frames as u64 > capacity {
            return Err(SpellError::InvalidConfig(format!(
                "sprite sheet grid {columns}x{rows} holds {capacity} frames, \
                 {total_frames} requested"
            )));
        }
        Ok(Self {
            columns,
            rows,
            total_frames,
        })
    }

    /// A one-cell grid, used for frame sequences made of separate images.
    pub fn single() -> Self {
        Self {
            columns: 1,
            rows: 1,
            total_frames: 1,
        }
    }
}

/// Validated animator parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteSheetConfig {
    pub grid: SheetGrid,
    /// Minimum time between frame changes. Zero advances every tick.
    pub frame_interval_ms: u64,
    pub playback: Playback,
}

impl SpriteSheetConfig {
    pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 50;

    pub fn configure(
        columns: u32,
        rows: u32,
        total_frames: u32,
        frame_interval_ms: u64,
    ) -> Result<Self, SpellError> {
        Ok(Self {
            grid: SheetGrid::new(columns, rows, total_frames)?,
            frame_interval_ms,
            playback: Playback::OneShot,
        })
    }

    pub fn looping(mut self) -> Self {
        self.playback = Playback::Looping;
        self
    }
}

/// What a successful [`SpriteSheetAnimator::advance`] call showed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEvent {
    /// A new frame is on screen.
    Shown(u32),
    /// A looping animator showed its last frame and wrapped to the start.
    CycleComplete(u32),
    /// A one-shot animator showed its last frame and deactivated.
    Finished(u32),
}

impl FrameEvent {
    pub fn frame(self) -> u32 {
        match self {
            Self::Shown(frame) | Self::CycleComplete(frame) | Self::Finished(frame) => frame,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpriteSheetAnimator {
    config: SpriteSheetConfig,
    /// Frame currently on screen.
    current_frame: u32,
    /// Frame the next due advance will show.
    cursor: u32,
    /// `None` right after `start()`: the first advance shows frame 0 at once.
    last_advance_ms: Option<u64>,
    active: bool,
}

impl SpriteSheetAnimator {
    pub fn new(config: SpriteSheetConfig) -> Self {
        Self {
            config,
            current_frame: 0,
            cursor: 0,
            last_advance_ms: None,
            active: false,
        }
    }

    pub fn config(&self) -> &SpriteSheetConfig {
        &self.config
    }

    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Rewind to frame 0 and begin playing.
    pub fn start(&mut self) {
        self.active = true;
        self.current_frame = 0;
        self.cursor = 0;
        self.last_advance_ms = None;
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    /// Continue from the current frame without rewinding.
    pub fn resume(&mut self) {
        self.active = true;
    }

    /// Show the next frame if one is due at `now_ms`.
    ///
    /// Returns `None` when inactive or when less than `frame_interval_ms` has
    /// passed since the previous frame change. A clock that runs backwards is
    /// treated as no time having passed.
    pub fn advance(&mut self, now_ms: u64) -> Option<FrameEvent> {
        if !self.active {
            return None;
        }
        if let Some(last) = self.last_advance_ms {
            if now_ms.saturating_sub(last) < self.config.frame_interval_ms {
                return None;
            }
        }
        self.last_advance_ms = Some(now_ms);

        let shown = self.cursor;
        self.current_frame = shown;
        self.cursor += 1;
        if self.cursor < self.config.grid.total_frames {
            return Some(FrameEvent::Shown(shown));
        }

        self.cursor = 0;
        match self.config.playback {
            Playback::Looping => Some(FrameEvent::CycleComplete(shown)),
            Playback::OneShot => {
                self.active = false;
                self.current_frame = 0;
                Some(FrameEvent::Finished(shown))
            }
        }
    }

    /// Atlas rectangle of the frame currently on screen.
    pub fn frame_rect(&self) -> FrameRect {
        let grid = &self.config.grid;
        frame_rect(grid.columns, grid.rows, self.current_frame)
    }
}

/// Sub-rectangle of an atlas in bottom-left-origin UV space: the texture
/// is sampled at `offset + uv * repeat`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRect {
    pub offset_u: f32,
    pub offset_v: f32,
    pub repeat_u: f32,
    pub repeat_v: f32,
}

impl FrameRect {
    /// The whole texture.
    pub const FULL: FrameRect = FrameRect {
        offset_u: 0.0,
        offset_v: 0.0,
        repeat_u: 1.0,
        repeat_v: 1.0,
    };

    /// `[u0, v0, u1, v1]` in top-left-origin texture coordinates, where
    /// `(u0, v0)` is the top-left corner of the frame.
    pub fn uv_bounds(&self) -> [f32; 4] {
        let u0 = self.offset_u;
        let u1 = self.offset_u + self.repeat_u;
        let v0 = 1.0 - (self.offset_v + self.repeat_v);
        let v1 = 1.0 - self.offset_v;
        [u0, v0, u1, v1]
    }
}

pub fn frame_rect(columns: u32, rows: u32, frame: u32) -> FrameRect {
    let columns = columns.max(1);
    let rows = rows.max(1);
    let col = frame % columns;
    let row = (frame / columns) % rows;
    let cell_w = 1.0 / columns as f32;
    let cell_h = 1.0 / rows as f32;
    FrameRect {
        offset_u: col as f32 * cell_w + FRAME_BLEED_EPSILON,
        offset_v: 1.0 - (row + 1) as f32 * cell_h + FRAME_BLEED_EPSILON,
        repeat_u: cell_w - 2.0 * FRAME_BLEED_EPSILON,
        repeat_v: cell_h - 2.0 * FRAME_BLEED_EPSILON,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    fn animator(columns: u32, rows: u32, total: u32, interval: u64) -> SpriteSheetAnimator {
        SpriteSheetAnimator::new(
            SpriteSheetConfig::configure(columns, rows, total, interval).expect("valid config"),
        )
    }

    #[test]
    fn configure_rejects_zero_dimensions() {
        for (c, r, t) in [(0, 5, 1), (6, 0, 1), (6, 5, 0)] {
            let err = SpriteSheetConfig::configure(c, r, t, 50).expect_err("should fail");
            assert!(matches!(err, SpellError::InvalidConfig(_)));
        }
    }

    #[test]
    fn configure_rejects_more_frames_than_cells() {
        let err = SpriteSheetConfig::configure(3, 3, 10, 50).expect_err("should fail");
        assert!(err.to_string().contains("holds 9 frames"));
    }

    #[test]
    fn configure_accepts_partially_filled_grid() {
        let config = SpriteSheetConfig::configure(4, 4, 13, 50).expect("valid");
        assert_eq!(config.grid.total_frames, 13);
        assert_eq!(config.playback, Playback::OneShot);
        assert_eq!(config.looping().playback, Playback::Looping);
    }

    #[test]
    fn frame_rect_stays_in_unit_square_with_bleed_guard() {
        let (columns, rows, total) = (6u32, 5u32, 30u32);
        for frame in 0..total {
            let rect = frame_rect(columns, rows, frame);
            assert!((0.0..1.0).contains(&rect.offset_u), "frame {frame}");
            assert!((0.0..1.0).contains(&rect.offset_v), "frame {frame}");
            assert!((rect.repeat_u - (1.0 / 6.0 - 2.0 * FRAME_BLEED_EPSILON)).abs() < EPS);
            assert!((rect.repeat_v - (1.0 / 5.0 - 2.0 * FRAME_BLEED_EPSILON)).abs() < EPS);
        }
    }

    #[test]
    fn frame_rect_row_zero_is_top_of_image() {
        let top_left = frame_rect(4, 4, 0);
        assert!((top_left.offset_u - FRAME_BLEED_EPSILON).abs() < EPS);
        assert!((top_left.offset_v - (0.75 + FRAME_BLEED_EPSILON)).abs() < EPS);

        let bottom_right = frame_rect(4, 4, 15);
        assert!((bottom_right.offset_u - (0.75 + FRAME_BLEED_EPSILON)).abs() < EPS);
        assert!((bottom_right.offset_v - FRAME_BLEED_EPSILON).abs() < EPS);
    }

    #[test]
    fn uv_bounds_convert_to_top_left_origin() {
        let [u0, v0, u1, v1] = frame_rect(2, 2, 0).uv_bounds();
        assert!((u0 - FRAME_BLEED_EPSILON).abs() < EPS);
        assert!((v0 - FRAME_BLEED_EPSILON).abs() < EPS);
        assert!((u1 - (0.5 - FRAME_BLEED_EPSILON)).abs() < EPS);
        assert!((v1 - (0.5 - FRAME_BLEED_EPSILON)).abs() < EPS);

        assert_eq!(FrameRect::FULL.uv_bounds(), [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn advance_respects_frame_interval() {
        let mut anim = animator(3, 3, 9, 50);
        anim.start();
        assert_eq!(anim.advance(1000), Some(FrameEvent::Shown(0)));
        assert_eq!(anim.advance(1049), None);
        assert_eq!(anim.current_frame(), 0);
        assert_eq!(anim.advance(1050), Some(FrameEvent::Shown(1)));
        // Interval is measured from the last change, not from start.
        assert_eq!(anim.advance(1099), None);
        assert_eq!(anim.advance(1130), Some(FrameEvent::Shown(2)));
    }

    #[test]
    fn advance_is_inert_until_started() {
        let mut anim = animator(3, 3, 9, 0);
        assert_eq!(anim.advance(0), None);
        assert_eq!(anim.advance(10_000), None);
        assert_eq!(anim.current_frame(), 0);
    }

    #[test]
    fn backwards_clock_does_not_advance() {
        let mut anim = animator(3, 3, 9, 50);
        anim.start();
        anim.advance(500);
        assert_eq!(anim.advance(100), None);
        assert_eq!(anim.current_frame(), 0);
    }

    #[test]
    fn zero_interval_advances_every_tick() {
        let mut anim = animator(2, 2, 4, 0);
        anim.start();
        assert_eq!(anim.advance(7), Some(FrameEvent::Shown(0)));
        assert_eq!(anim.advance(7), Some(FrameEvent::Shown(1)));
        assert_eq!(anim.advance(7), Some(FrameEvent::Shown(2)));
    }

    #[test]
    fn six_by_five_sheet_plays_thirty_frames_then_finishes() {
        let mut anim = animator(6, 5, 30, 50);
        anim.start();

        let mut shown = Vec::new();
        let mut finished_at = None;
        for call in 0..30u64 {
            let event = anim.advance(call * 50).expect("every call is due");
            shown.push(event.frame());
            if let FrameEvent::Finished(_) = event {
                finished_at = Some(call + 1);
            }
        }

        assert_eq!(shown, (0..30).collect::<Vec<_>>());
        assert_eq!(finished_at, Some(30));
        assert!(!anim.is_active());
        assert_eq!(anim.current_frame(), 0);
        assert_eq!(anim.advance(10_000), None);
    }

    #[test]
    fn one_shot_reports_finished_exactly_once() {
        let mut anim = animator(2, 2, 4, 10);
        anim.start();
        let events: Vec<_> = (0..20u64).filter_map(|i| anim.advance(i * 10)).collect();
        assert_eq!(events.len(), 4);
        let finished = events
            .iter()
            .filter(|e| matches!(e, FrameEvent::Finished(_)))
            .count();
        assert_eq!(finished, 1);
        assert_eq!(events.last(), Some(&FrameEvent::Finished(3)));
    }

    #[test]
    fn looping_wraps_indefinitely() {
        let config = SpriteSheetConfig::configure(2, 2, 3, 10)
            .expect("valid")
            .looping();
        let mut anim = SpriteSheetAnimator::new(config);
        anim.start();

        for i in 0..30u64 {
            let event = anim.advance(i * 10).expect("due");
            assert_eq!(event.frame(), (i % 3) as u32);
            assert!(!matches!(event, FrameEvent::Finished(_)));
            if i % 3 == 2 {
                assert_eq!(event, FrameEvent::CycleComplete(2));
            }
        }
        assert!(anim.is_active());
    }

    #[test]
    fn start_rewinds_mid_cycle() {
        let mut anim = animator(3, 3, 9, 0);
        anim.start();
        for _ in 0..5 {
            anim.advance(0);
        }
        assert_eq!(anim.current_frame(), 4);
        anim.start();
        assert_eq!(anim.current_frame(), 0);
        assert_eq!(anim.advance(1), Some(FrameEvent::Shown(0)));
    }

    #[test]
    fn stop_is_idempotent_and_resume_continues() {
        let mut anim = animator(3, 3, 9, 0);
        anim.start();
        anim.advance(0);
        anim.advance(0);
        anim.stop();
        anim.stop();
        assert!(!anim.is_active());
        assert_eq!(anim.advance(5), None);
        assert_eq!(anim.current_frame(), 1);

        anim.resume();
        assert_eq!(anim.advance(5), Some(FrameEvent::Shown(2)));
    }

    #[test]
    fn animator_frame_rect_tracks_current_frame() {
        let mut anim = animator(3, 3, 9, 0);
        anim.start();
        anim.advance(0);
        anim.advance(0);
        assert_eq!(anim.frame_rect(), frame_rect(3, 3, 1));
    }
}
