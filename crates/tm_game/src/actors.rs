//! Actors on the map: clip animation, act/react performances, white flash
//! and keyboard movement for the controllable one.

use std::path::PathBuf;

use glam::{Vec2, Vec3};
use tm_core::animation::{load_actor_animations, ActorAnimations, ClipPlayer};
use tm_core::character::{ActorId, ActorMachine, ActorState, ClipRequest};
use tm_core::effect::TargetPositions;
use tm_core::sprite_sheet::FrameRect;

use crate::config::ActorConfig;
use crate::map::TileMap;
use crate::watcher::FileWatcher;

const FALLBACK_IDLE_CLIP: &str = "idle";

pub struct Actor {
    pub id: ActorId,
    /// Feet position in world space.
    pub position: Vec3,
    pub size: Vec2,
    pub controllable: bool,
    machine: ActorMachine,
    player: ClipPlayer,
    animations: Option<ActorAnimations>,
    watcher: FileWatcher,
    cell: u32,
    flash_until_ms: u64,
}

impl Actor {
    fn new(config: &ActorConfig) -> Self {
        let path = PathBuf::from(&config.animations);
        let animations = match load_actor_animations(&path) {
            Ok(animations) => Some(animations),
            Err(err) => {
                log::warn!("Actor '{}' has no animations: {err}", config.id);
                None
            }
        };
        let idle = animations
            .as_ref()
            .map_or(FALLBACK_IDLE_CLIP, |a| a.idle_clip.as_str())
            .to_string();
        Self {
            id: ActorId::new(&config.id),
            position: Vec3::new(config.tile[0] as f32, 0.0, config.tile[1] as f32),
            size: Vec2::from_array(config.size),
            controllable: config.controllable,
            machine: ActorMachine::new(&idle),
            player: ClipPlayer::new(&idle),
            animations,
            watcher: FileWatcher::new(path),
            cell: 0,
            flash_until_ms: 0,
        }
    }

    pub fn state(&self) -> ActorState {
        self.machine.state()
    }

    pub fn clip_name(&self) -> &str {
        &self.player.clip_name
    }

    pub fn is_flashing(&self, now_ms: u64) -> bool {
        now_ms < self.flash_until_ms
    }

    pub fn tile(&self) -> (i32, i32) {
        (self.position.x.round() as i32, self.position.z.round() as i32)
    }

    /// Sheet texture and cell rect to draw, once animations are loaded.
    pub fn sprite(&self) -> Option<(&str, FrameRect)> {
        let animations = self.animations.as_ref()?;
        Some((
            animations.sheet.texture.as_str(),
            animations.sheet.cell_rect(self.cell),
        ))
    }

    pub fn sheet_texture(&self) -> Option<&str> {
        self.animations.as_ref().map(|a| a.sheet.texture.as_str())
    }

    fn has_clip(&self, clip: &str) -> bool {
        self.animations
            .as_ref()
            .is_some_and(|a| a.clip(clip).is_some())
    }

    fn play(&mut self, request: ClipRequest) {
        self.player.play(&request.clip, request.restart);
    }

    fn tick(&mut self, dt_us: u64) {
        let Some(animations) = self.animations.as_ref() else {
            return;
        };
        let Some(clip) = animations.clip(&self.player.clip_name) else {
            return;
        };
        let tick = self.player.tick(dt_us, clip);
        self.cell = tick.cell;
        if tick.just_finished {
            let finished = self.player.clip_name.clone();
            if let Some(request) = self.machine.clip_complete(&finished) {
                log::debug!("Actor '{}' back to '{}'", self.id, request.clip);
                self.play(request);
            }
        }
    }

    fn reload_animations(&mut self) {
        match load_actor_animations(self.watcher.path()) {
            Ok(animations) => {
                self.machine = ActorMachine::new(&animations.idle_clip);
                self.player = ClipPlayer::new(&animations.idle_clip);
                self.cell = 0;
                self.animations = Some(animations);
                log::info!(
                    "Animations reloaded for '{}' ({})",
                    self.id,
                    self.watcher.path().display()
                );
            }
            Err(err) => log::error!("Animation reload failed for '{}': {err}", self.id),
        }
    }
}

#[derive(Default)]
pub struct ActorRoster {
    actors: Vec<Actor>,
}

impl ActorRoster {
    /// Spawn every configured actor and clear props from their tiles.
    pub fn spawn(configs: &[ActorConfig], map: &mut TileMap) -> Self {
        let actors = configs
            .iter()
            .map(|config| {
                map.clear_prop(config.tile[0], config.tile[1]);
                Actor::new(config)
            })
            .collect();
        Self { actors }
    }

    pub fn ids(&self) -> Vec<ActorId> {
        self.actors.iter().map(|a| a.id.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Actor> {
        self.actors.iter()
    }

    pub fn get(&self, id: &ActorId) -> Option<&Actor> {
        self.actors.iter().find(|a| a.id == *id)
    }

    fn get_mut(&mut self, id: &ActorId) -> Option<&mut Actor> {
        self.actors.iter_mut().find(|a| a.id == *id)
    }

    pub fn controllable(&self) -> Option<&Actor> {
        self.actors.iter().find(|a| a.controllable)
    }

    pub fn sheet_textures(&self) -> Vec<&str> {
        self.actors.iter().filter_map(Actor::sheet_texture).collect()
    }

    /// Flash `id` white until `now_ms + duration_ms`. A later flash extends,
    /// never shortens, a running one.
    pub fn flash(&mut self, id: &ActorId, duration_ms: u64, now_ms: u64) {
        let Some(actor) = self.get_mut(id) else {
            log::warn!("Flash for unknown actor '{id}'");
            return;
        };
        actor.flash_until_ms = actor.flash_until_ms.max(now_ms.saturating_add(duration_ms));
    }

    pub fn act(&mut self, id: &ActorId, clip: &str) {
        self.perform(id, clip, ActorMachine::act);
    }

    pub fn react(&mut self, id: &ActorId, clip: &str) {
        self.perform(id, clip, ActorMachine::react);
    }

    fn perform(
        &mut self,
        id: &ActorId,
        clip: &str,
        transition: fn(&mut ActorMachine, &str) -> ClipRequest,
    ) {
        let Some(actor) = self.get_mut(id) else {
            log::warn!("Performance '{clip}' for unknown actor '{id}'");
            return;
        };
        if !actor.has_clip(clip) {
            log::warn!("Actor '{id}' has no clip '{clip}'");
            return;
        }
        let request = transition(&mut actor.machine, clip);
        actor.play(request);
    }

    pub fn tick(&mut self, dt_us: u64) {
        for actor in &mut self.actors {
            actor.tick(dt_us);
        }
    }

    /// Move the controllable actor by `direction` (map axes, unnormalized)
    /// at `speed` tiles per second. Blocked axes are dropped separately so
    /// the actor slides along obstacles.
    pub fn move_controllable(&mut self, direction: Vec2, speed: f32, dt: f32, map: &TileMap) {
        if direction == Vec2::ZERO {
            return;
        }
        let Some(actor) = self.actors.iter_mut().find(|a| a.controllable) else {
            return;
        };
        let step = direction.normalize_or_zero() * speed * dt;
        let walkable =
            |p: Vec3| map.is_walkable(p.x.round() as i32, p.z.round() as i32);

        let full = actor.position + Vec3::new(step.x, 0.0, step.y);
        if walkable(full) {
            actor.position = full;
            return;
        }
        let along_x = actor.position + Vec3::new(step.x, 0.0, 0.0);
        if step.x != 0.0 && walkable(along_x) {
            actor.position = along_x;
            return;
        }
        let along_z = actor.position + Vec3::new(0.0, 0.0, step.y);
        if step.y != 0.0 && walkable(along_z) {
            actor.position = along_z;
        }
    }

    /// Reload animation files whose mtime changed.
    pub fn poll_reload(&mut self) {
        for actor in &mut self.actors {
            if actor.watcher.should_reload() {
                actor.reload_animations();
            }
        }
    }
}

impl TargetPositions for ActorRoster {
    fn position_of(&self, actor: &ActorId) -> Option<Vec3> {
        self.get(actor).map(|a| a.position)
    }
}
