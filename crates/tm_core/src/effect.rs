//! Animated, positionable quads driven by a [`SpriteSheetAnimator`].
//!
//! An [`Effect`] never touches the renderer. Each tick the host calls
//! [`Effect::update`] with an [`EffectContext`] (timeline, camera pose and a
//! read-only view of actor positions) and afterwards asks for
//! [`Effect::quad`] when rebuilding its mesh.
//!
//! Textures load asynchronously. Until every image an effect needs has
//! arrived, `start()`/`toggle()` are ignored; after any image fails the
//! effect stays inert for the rest of the session.

use std::collections::HashMap;

use glam::{Mat3, Quat, Vec2, Vec3};

use crate::character::ActorId;
use crate::error::SpellError;
use crate::sprite_sheet::{
    FrameEvent, FrameRect, Playback, SpriteSheetAnimator, SpriteSheetConfig,
};

/// Read-only position lookup for follow targets.
pub trait TargetPositions {
    fn position_of(&self, actor: &ActorId) -> Option<Vec3>;
}

impl TargetPositions for HashMap<ActorId, Vec3> {
    fn position_of(&self, actor: &ActorId) -> Option<Vec3> {
        self.get(actor).copied()
    }
}

/// Camera pose as the effect subsystem sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewPose {
    pub position: Vec3,
    pub rotation: Quat,
    /// Height of the visible world region (orthographic frustum height after zoom).
    pub view_height: f32,
}

impl ViewPose {
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }
}

impl Default for ViewPose {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 10.0),
            rotation: Quat::IDENTITY,
            view_height: 2.0,
        }
    }
}

pub struct EffectContext<'a> {
    pub now_ms: u64,
    pub view: &'a ViewPose,
    pub targets: &'a dyn TargetPositions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Facing {
    /// Copy the camera orientation at setup and on viewport change.
    #[default]
    Static,
    /// Turn toward the camera position every tick.
    FaceCamera,
    /// Keep the identity orientation (quad in the world XY plane).
    None,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenAnchor {
    /// World-space Y of the quad's top edge.
    pub top: f32,
    /// Quad height as a fraction of the view height.
    pub height_fraction: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Anchor {
    /// Fixed authored size.
    #[default]
    World,
    /// Size follows the viewport so a single frame keeps its aspect ratio.
    Screen(ScreenAnchor),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameSource {
    /// One atlas laid out as the animator's grid.
    Sheet(String),
    /// One image per frame, shown whole.
    Sequence(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Follow {
    pub target: ActorId,
    pub offset: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectConfig {
    pub source: FrameSource,
    pub animation: SpriteSheetConfig,
    pub size: Vec2,
    pub position: Vec3,
    pub facing: Facing,
    pub anchor: Anchor,
    pub follow: Option<Follow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Pending,
    Ready { width: u32, height: u32 },
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Pending,
    Ready,
    Failed,
}

/// Everything the renderer needs to draw a visible effect.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectQuad<'a> {
    pub texture: &'a str,
    pub center: Vec3,
    pub size: Vec2,
    pub orientation: Quat,
    pub uv: [f32; 4],
}

#[derive(Debug, Clone)]
pub struct Effect {
    source: FrameSource,
    slots: Vec<Slot>,
    animator: SpriteSheetAnimator,
    size: Vec2,
    position: Vec3,
    orientation: Quat,
    facing: Facing,
    anchor: Anchor,
    follow: Option<Follow>,
    visible: bool,
    layout_dirty: bool,
}

impl Effect {
    pub fn new(config: EffectConfig) -> Result<Self, SpellError> {
        let paths = match &config.source {
            FrameSource::Sheet(path) => vec![path.clone()],
            FrameSource::Sequence(paths) => paths.clone(),
        };
        if paths.is_empty() || paths.iter().any(|p| p.is_empty()) {
            return Err(SpellError::InvalidConfig(
                "effect needs at least one non-empty texture path".to_string(),
            ));
        }
        if let FrameSource::Sequence(frames) = &config.source {
            if frames.len() != config.animation.grid.total_frames as usize {
                return Err(SpellError::InvalidConfig(format!(
                    "frame sequence has {} images but the animation declares {} frames",
                    frames.len(),
                    config.animation.grid.total_frames
                )));
            }
        }
        if matches!(config.anchor, Anchor::World)
            && !(config.size.x > 0.0 && config.size.y > 0.0 && config.size.is_finite())
        {
            return Err(SpellError::InvalidConfig(format!(
                "effect size {}x{} must be positive",
                config.size.x, config.size.y
            )));
        }
        if let Anchor::Screen(anchor) = config.anchor {
            if !(anchor.height_fraction > 0.0 && anchor.height_fraction.is_finite()) {
                return Err(SpellError::InvalidConfig(format!(
                    "screen anchor height fraction {} must be positive",
                    anchor.height_fraction
                )));
            }
        }

        Ok(Self {
            slots: vec![Slot::Pending; paths.len()],
            source: config.source,
            animator: SpriteSheetAnimator::new(config.animation),
            size: config.size,
            position: config.position,
            orientation: Quat::IDENTITY,
            facing: config.facing,
            anchor: config.anchor,
            follow: config.follow,
            visible: false,
            layout_dirty: true,
        })
    }

    pub fn texture_paths(&self) -> Vec<&str> {
        match &self.source {
            FrameSource::Sheet(path) => vec![path.as_str()],
            FrameSource::Sequence(paths) => paths.iter().map(String::as_str).collect(),
        }
    }

    /// Paths still waiting on the loader.
    pub fn pending_textures(&self) -> Vec<&str> {
        self.texture_paths()
            .into_iter()
            .zip(&self.slots)
            .filter(|(_, slot)| **slot == Slot::Pending)
            .map(|(path, _)| path)
            .collect()
    }

    pub fn readiness(&self) -> Readiness {
        if self.slots.contains(&Slot::Failed) {
            Readiness::Failed
        } else if self.slots.contains(&Slot::Pending) {
            Readiness::Pending
        } else {
            Readiness::Ready
        }
    }

    /// Record a finished load. Returns true if this effect uses `path`.
    pub fn texture_loaded(&mut self, path: &str, width: u32, height: u32) -> bool {
        self.resolve_slot(path, Slot::Ready { width, height })
    }

    /// Record a failed load. Returns true if this effect uses `path`.
    pub fn texture_failed(&mut self, path: &str) -> bool {
        let matched = self.resolve_slot(path, Slot::Failed);
        if matched {
            self.visible = false;
            self.animator.stop();
        }
        matched
    }

    fn resolve_slot(&mut self, path: &str, resolved: Slot) -> bool {
        let mut matched = false;
        let paths: Vec<String> = self.texture_paths().into_iter().map(str::to_string).collect();
        for (slot_path, slot) in paths.iter().zip(self.slots.iter_mut()) {
            if slot_path == path && *slot != Slot::Failed {
                *slot = resolved;
                matched = true;
            }
        }
        if matched {
            self.layout_dirty = true;
        }
        matched
    }

    /// Show the effect and replay its animation from frame 0.
    /// Returns false (and changes nothing) when textures are not usable.
    pub fn start(&mut self) -> bool {
        match self.readiness() {
            Readiness::Ready => {
                self.visible = true;
                self.animator.start();
                true
            }
            Readiness::Pending => {
                log::debug!(
                    "Effect start ignored: textures {:?} still loading",
                    self.pending_textures()
                );
                false
            }
            Readiness::Failed => false,
        }
    }

    /// Hide the effect. Frame state is kept until the next `start()`.
    pub fn stop(&mut self) {
        self.visible = false;
        self.animator.stop();
    }

    /// Flip visibility, resuming the animation where it was. Returns the new
    /// visibility; unusable effects stay hidden.
    pub fn toggle(&mut self) -> bool {
        if self.readiness() != Readiness::Ready {
            log::debug!("Effect toggle ignored: textures not ready");
            return self.visible;
        }
        self.visible = !self.visible;
        if self.visible {
            self.animator.resume();
        } else {
            self.animator.stop();
        }
        self.visible
    }

    /// Viewport or projection changed: recompute layout on the next update.
    pub fn viewport_changed(&mut self) {
        self.layout_dirty = true;
    }

    /// Per-tick update. Returns the frame event if the animation advanced.
    pub fn update(&mut self, ctx: &EffectContext<'_>) -> Option<FrameEvent> {
        if self.layout_dirty && self.readiness() == Readiness::Ready {
            self.relayout(ctx.view);
            self.layout_dirty = false;
        }

        if let Some(follow) = &self.follow {
            if let Some(target) = ctx.targets.position_of(&follow.target) {
                self.position = target + follow.offset;
            }
        }

        if self.facing == Facing::FaceCamera {
            if let Some(orientation) = face_towards(self.position, ctx.view.position) {
                self.orientation = orientation;
            }
        }

        if !self.visible {
            return None;
        }
        let event = self.animator.advance(ctx.now_ms)?;
        if let FrameEvent::Finished(_) = event {
            self.visible = false;
        }
        Some(event)
    }

    fn relayout(&mut self, view: &ViewPose) {
        if self.facing == Facing::Static {
            self.orientation = view.rotation;
        }
        let Anchor::Screen(anchor) = self.anchor else {
            return;
        };
        let Some(Slot::Ready { width, height }) = self.slots.first().copied() else {
            return;
        };
        if width == 0 || height == 0 {
            return;
        }
        let grid = self.animator.config().grid;
        let (columns, rows) = match self.source {
            FrameSource::Sheet(_) => (grid.columns, grid.rows),
            FrameSource::Sequence(_) => (1, 1),
        };
        let frame_aspect =
            (width as f32 / columns as f32) / (height as f32 / rows as f32);
        let plane_height = anchor.height_fraction * view.view_height;
        self.size = Vec2::new(plane_height * frame_aspect, plane_height);
        self.position.y = anchor.top - plane_height / 2.0;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn follow_target(&self) -> Option<&ActorId> {
        self.follow.as_ref().map(|follow| &follow.target)
    }

    pub fn is_looping(&self) -> bool {
        self.animator.config().playback == Playback::Looping
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn current_frame(&self) -> u32 {
        self.animator.current_frame()
    }

    pub fn frame_rect(&self) -> FrameRect {
        match self.source {
            FrameSource::Sheet(_) => self.animator.frame_rect(),
            FrameSource::Sequence(_) => FrameRect::FULL,
        }
    }

    pub fn quad(&self) -> Option<EffectQuad<'_>> {
        if !self.visible || self.readiness() != Readiness::Ready {
            return None;
        }
        let texture = match &self.source {
            FrameSource::Sheet(path) => path.as_str(),
            FrameSource::Sequence(paths) => paths.get(self.current_frame() as usize)?.as_str(),
        };
        Some(EffectQuad {
            texture,
            center: self.position,
            size: self.size,
            orientation: self.orientation,
            uv: self.frame_rect().uv_bounds(),
        })
    }
}

/// Rotation whose +Z axis points from `from` toward `to`, keeping world +Y
/// as up where possible. `None` when the points coincide.
pub fn face_towards(from: Vec3, to: Vec3) -> Option<Quat> {
    let z = (to - from).try_normalize()?;
    let right = Vec3::Y.cross(z).try_normalize().unwrap_or(Vec3::X);
    let up = z.cross(right);
    Some(Quat::from_mat3(&Mat3::from_cols(right, up, z)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = "assets/fx/bolt.png";

    fn sheet_config(columns: u32, rows: u32, total: u32) -> EffectConfig {
        EffectConfig {
            source: FrameSource::Sheet(SHEET.to_string()),
            animation: SpriteSheetConfig::configure(columns, rows, total, 50).expect("valid"),
            size: Vec2::new(15.0, 30.0),
            position: Vec3::ZERO,
            facing: Facing::Static,
            anchor: Anchor::World,
            follow: None,
        }
    }

    fn ready_effect(config: EffectConfig) -> Effect {
        let mut effect = Effect::new(config).expect("valid effect");
        effect.texture_loaded(SHEET, 512, 512);
        effect
    }

    fn tick(
        effect: &mut Effect,
        now_ms: u64,
        targets: &HashMap<ActorId, Vec3>,
    ) -> Option<FrameEvent> {
        let view = ViewPose::default();
        effect.update(&EffectContext {
            now_ms,
            view: &view,
            targets,
        })
    }

    #[test]
    fn rejects_sequence_length_mismatch() {
        let mut config = sheet_config(2, 1, 2);
        config.source = FrameSource::Sequence(vec!["a.png".into(), "b.png".into(), "c.png".into()]);
        assert!(matches!(Effect::new(config), Err(SpellError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_non_positive_world_size() {
        let mut config = sheet_config(2, 2, 4);
        config.size = Vec2::new(0.0, 10.0);
        assert!(matches!(Effect::new(config), Err(SpellError::InvalidConfig(_))));
    }

    #[test]
    fn start_is_ignored_until_texture_loads() {
        let mut effect = Effect::new(sheet_config(3, 3, 9)).expect("valid");
        assert_eq!(effect.readiness(), Readiness::Pending);
        assert!(!effect.start());
        assert!(!effect.is_visible());
        assert!(effect.quad().is_none());

        assert!(effect.texture_loaded(SHEET, 300, 300));
        assert!(effect.start());
        assert!(effect.is_visible());
    }

    #[test]
    fn failed_texture_makes_effect_inert() {
        let mut effect = Effect::new(sheet_config(3, 3, 9)).expect("valid");
        assert!(effect.texture_failed(SHEET));
        assert_eq!(effect.readiness(), Readiness::Failed);
        assert!(!effect.start());
        assert!(!effect.toggle());
        // A late success for the same path does not revive it.
        effect.texture_loaded(SHEET, 10, 10);
        assert_eq!(effect.readiness(), Readiness::Failed);
    }

    #[test]
    fn unrelated_paths_are_not_claimed() {
        let mut effect = Effect::new(sheet_config(3, 3, 9)).expect("valid");
        assert!(!effect.texture_loaded("other.png", 1, 1));
        assert!(!effect.texture_failed("other.png"));
        assert_eq!(effect.pending_textures(), vec![SHEET]);
    }

    #[test]
    fn start_then_stop_leaves_frame_zero_and_hidden() {
        let mut effect = ready_effect(sheet_config(6, 5, 30));
        effect.start();
        effect.stop();
        assert_eq!(effect.current_frame(), 0);
        assert!(!effect.is_visible());
        assert_eq!(tick(&mut effect, 100, &HashMap::new()), None);
    }

    #[test]
    fn one_shot_hides_after_final_frame() {
        let mut effect = ready_effect(sheet_config(6, 5, 30));
        let targets = HashMap::new();
        effect.start();
        for call in 0..29u64 {
            let event = tick(&mut effect, call * 50, &targets).expect("due");
            assert_eq!(event, FrameEvent::Shown(call as u32));
            assert!(effect.is_visible());
        }
        assert_eq!(tick(&mut effect, 29 * 50, &targets), Some(FrameEvent::Finished(29)));
        assert!(!effect.is_visible());
        assert!(effect.quad().is_none());
    }

    #[test]
    fn restart_while_playing_rewinds_instead_of_stacking() {
        let mut effect = ready_effect(sheet_config(3, 3, 9));
        let targets = HashMap::new();
        effect.start();
        tick(&mut effect, 0, &targets);
        tick(&mut effect, 50, &targets);
        tick(&mut effect, 100, &targets);
        assert_eq!(effect.current_frame(), 2);

        effect.start();
        assert_eq!(effect.current_frame(), 0);
        assert_eq!(tick(&mut effect, 110, &targets), Some(FrameEvent::Shown(0)));
    }

    #[test]
    fn toggle_keeps_looping_effect_running_and_resumes() {
        let mut config = sheet_config(2, 2, 4);
        config.animation = config.animation.looping();
        let mut effect = ready_effect(config);
        let targets = HashMap::new();

        assert!(effect.toggle());
        for i in 0..6u64 {
            let event = tick(&mut effect, i * 50, &targets).expect("due");
            assert!(!matches!(event, FrameEvent::Finished(_)));
        }
        assert!(effect.is_visible());
        assert_eq!(effect.current_frame(), 1);

        assert!(!effect.toggle());
        assert_eq!(tick(&mut effect, 1_000, &targets), None);
        assert!(effect.toggle());
        assert_eq!(tick(&mut effect, 1_050, &targets), Some(FrameEvent::Shown(2)));
        assert_eq!(tick(&mut effect, 1_100, &targets), Some(FrameEvent::CycleComplete(3)));
    }

    #[test]
    fn follow_target_tracks_latest_position() {
        let hero = ActorId::new("hero");
        let mut config = sheet_config(3, 3, 9);
        config.follow = Some(Follow {
            target: hero.clone(),
            offset: Vec3::new(0.0, 2.0, 0.0),
        });
        let mut effect = ready_effect(config);
        let mut targets = HashMap::new();
        targets.insert(hero.clone(), Vec3::new(1.0, 0.0, 1.0));

        effect.start();
        tick(&mut effect, 0, &targets);
        assert_eq!(effect.position(), Vec3::new(1.0, 2.0, 1.0));

        targets.insert(hero.clone(), Vec3::new(5.0, 0.0, -3.0));
        tick(&mut effect, 10, &targets);
        assert_eq!(effect.position(), Vec3::new(5.0, 2.0, -3.0));
        let quad = effect.quad().expect("visible");
        assert_eq!(quad.center, Vec3::new(5.0, 2.0, -3.0));
    }

    #[test]
    fn missing_follow_target_keeps_last_position() {
        let mut config = sheet_config(3, 3, 9);
        config.position = Vec3::new(4.0, 0.0, 4.0);
        config.follow = Some(Follow {
            target: ActorId::new("ghost"),
            offset: Vec3::ZERO,
        });
        let mut effect = ready_effect(config);
        tick(&mut effect, 0, &HashMap::new());
        assert_eq!(effect.position(), Vec3::new(4.0, 0.0, 4.0));
    }

    #[test]
    fn face_camera_reorients_every_tick() {
        let mut config = sheet_config(3, 3, 9);
        config.facing = Facing::FaceCamera;
        let mut effect = ready_effect(config);
        let targets = HashMap::new();

        let mut view = ViewPose {
            position: Vec3::new(0.0, 0.0, 10.0),
            ..ViewPose::default()
        };
        effect.update(&EffectContext { now_ms: 0, view: &view, targets: &targets });
        let normal = effect.orientation() * Vec3::Z;
        assert!(normal.abs_diff_eq(Vec3::Z, 1e-5));

        view.position = Vec3::new(10.0, 0.0, 0.0);
        effect.update(&EffectContext { now_ms: 1, view: &view, targets: &targets });
        let normal = effect.orientation() * Vec3::Z;
        assert!(normal.abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn static_facing_copies_camera_rotation_on_layout() {
        let mut effect = ready_effect(sheet_config(3, 3, 9));
        let view = ViewPose {
            rotation: Quat::from_rotation_y(0.5),
            ..ViewPose::default()
        };
        effect.update(&EffectContext { now_ms: 0, view: &view, targets: &HashMap::new() });
        assert!(effect.orientation().abs_diff_eq(view.rotation, 1e-6));
    }

    #[test]
    fn screen_anchor_derives_size_from_frame_aspect_and_view() {
        let mut config = sheet_config(4, 2, 8);
        config.size = Vec2::ZERO;
        config.position = Vec3::new(7.0, 0.0, 0.0);
        config.anchor = Anchor::Screen(ScreenAnchor {
            top: 83.0,
            height_fraction: 2.0 / 3.0,
        });
        let mut effect = Effect::new(config).expect("screen-anchored size may be zero");
        // 1024x256 over a 4x2 grid: 256x128 frames, aspect 2.
        effect.texture_loaded(SHEET, 1024, 256);

        let mut view = ViewPose {
            view_height: 90.0,
            ..ViewPose::default()
        };
        effect.update(&EffectContext { now_ms: 0, view: &view, targets: &HashMap::new() });
        assert!((effect.size().y - 60.0).abs() < 1e-4);
        assert!((effect.size().x - 120.0).abs() < 1e-4);
        assert!((effect.position().y - 53.0).abs() < 1e-4);
        assert_eq!(effect.position().x, 7.0);

        view.view_height = 45.0;
        effect.viewport_changed();
        effect.update(&EffectContext { now_ms: 1, view: &view, targets: &HashMap::new() });
        assert!((effect.size().y - 30.0).abs() < 1e-4);
        assert!((effect.position().y - 68.0).abs() < 1e-4);
    }

    #[test]
    fn sequence_waits_for_every_frame_and_shows_whole_images() {
        let frames: Vec<String> = (1..=3).map(|i| format!("aura_{i}.png")).collect();
        let mut config = sheet_config(3, 1, 3);
        config.source = FrameSource::Sequence(frames.clone());
        config.animation = config.animation.looping();
        let mut effect = Effect::new(config).expect("valid");

        effect.texture_loaded(&frames[0], 64, 64);
        effect.texture_loaded(&frames[1], 64, 64);
        assert!(!effect.toggle(), "third frame still pending");
        effect.texture_loaded(&frames[2], 64, 64);
        assert!(effect.toggle());

        let targets = HashMap::new();
        tick(&mut effect, 0, &targets);
        tick(&mut effect, 50, &targets);
        let quad = effect.quad().expect("visible");
        assert_eq!(quad.texture, "aura_2.png");
        assert_eq!(quad.uv, [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn face_towards_handles_vertical_and_degenerate_directions() {
        assert!(face_towards(Vec3::ZERO, Vec3::ZERO).is_none());
        let up = face_towards(Vec3::ZERO, Vec3::new(0.0, 5.0, 0.0)).expect("direction");
        assert!((up * Vec3::Z).abs_diff_eq(Vec3::Y, 1e-5));
    }
}
