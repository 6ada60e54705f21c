//! Tilemancer -- isometric tile scene with sprite-sheet spell effects.
//!
//! winit drives the event loop via `ApplicationHandler`. Simulation runs
//! inside `RedrawRequested` on a fixed timestep (see `FrameClock`):
//!
//!   1. `begin_frame()` -- measure wall-clock delta, feed accumulator
//!   2. `while should_step()` -- cast triggered spells, advance schedules,
//!      effects and actor clips, apply the cues spells emit
//!   3. Rebuild the sprite mesh: tiles, then props and actors back-to-front,
//!      then effects on top
//!   4. Upload camera uniform, issue draw calls, composite egui overlay
//!
//! Textures decode on a worker thread and arrive between frames; effects
//! stay hidden until all of their images are in. The spellbook and actor
//! animation files are watched via mtime polling and reloaded at frame
//! boundaries.

mod actors;
mod assets;
mod audio;
mod camera_settings;
mod config;
mod map;
mod mesh;
mod spellbook;
mod watcher;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::{Quat, Vec2, Vec3};
use wgpu::util::DeviceExt;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use actors::ActorRoster;
use assets::{LoadResult, TextureLoader};
use audio::SoundBoard;
use camera_settings::{load_camera_settings, save_camera_settings, CameraSettings};
use config::{load_game_config, GameConfig};
use map::{Prop, Terrain, TileMap};
use mesh::{count_texture_binds, DrawCall, QuadSpec, SpriteMesh};
use spellbook::{build_registry, load_spellbook, parse_spellbook, DEFAULT_SPELLBOOK};
use tm_core::character::ActorId;
use tm_core::effect::EffectContext;
use tm_core::input::{InputState, Key, MouseBtn};
use tm_core::registry::SpellRegistry;
use tm_core::spell::{Cue, SpellCue};
use tm_core::sprite_sheet::FrameRect;
use tm_core::time::FrameClock;
use tm_devtools::{DebugOverlay, OverlayStats, SpellRow};
use tm_render::{GpuContext, IsoCamera, RenderError, SpritePipeline, SpriteVertex, Texture};

const CONFIG_PATH: &str = "assets/config/game.json";
const WHITE_TEXTURE: &str = "__white";
const WHEEL_PIXELS_PER_NOTCH: f64 = 40.0;
const TREE_SIZE: Vec2 = Vec2::new(1.5, 3.0);
const BUILDING_SIZE: Vec2 = Vec2::new(3.0, 3.0);

struct GpuSpriteTexture {
    texture: Texture,
    bind_group: wgpu::BindGroup,
}

/// A camera-facing quad anchored at its bottom edge.
struct Billboard<'a> {
    texture_key: &'a str,
    base: Vec3,
    size: Vec2,
    uv: [f32; 4],
    color: [f32; 4],
    flash: f32,
}

/// All mutable engine state. Constructed in `ApplicationHandler::resumed`
/// once the window and GPU surface exist.
struct EngineState {
    window: Arc<Window>,
    gpu: GpuContext,
    clock: FrameClock,
    input: InputState,
    camera: IsoCamera,
    sprite_pipeline: SpritePipeline,
    debug_overlay: DebugOverlay,

    // --- Scene -------------------------------------------------------------------
    config: GameConfig,
    map: TileMap,
    actors: ActorRoster,
    registry: SpellRegistry,
    spellbook_watcher: watcher::FileWatcher,
    sounds: SoundBoard,
    tint: [f32; 3],
    panning: bool,
    paused: bool,
    single_step_requested: bool,

    // --- Textures ----------------------------------------------------------------
    loader: TextureLoader,
    textures: HashMap<Arc<str>, GpuSpriteTexture>,
    failed_textures: HashSet<String>,

    // --- Per-frame GPU mesh state ------------------------------------------------
    // Rebuilt on the CPU when the simulation stepped or content arrived, then
    // streamed into buffers that grow (power-of-two) but never shrink.
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    mesh_vertex_capacity: usize,
    mesh_index_capacity: usize,
    draw_calls: Vec<DrawCall>,
    quad_count: usize,
    mesh_dirty: bool,
}

impl EngineState {
    fn new(window: Arc<Window>, config: GameConfig) -> Result<Self, RenderError> {
        let gpu = GpuContext::new(window.clone())?;
        let sprite_pipeline = SpritePipeline::new(&gpu.device, gpu.surface_format);
        let debug_overlay = DebugOverlay::new(&gpu.device, gpu.surface_format, &window);

        let tree_variants = config.textures.trees.len().min(u8::MAX as usize) as u8;
        let mut map = TileMap::generate(&config.map, tree_variants);
        let actors = ActorRoster::spawn(&config.actors, &mut map);

        let spellbook_path = PathBuf::from(&config.spellbook);
        let registry = match load_registry(&spellbook_path, &actors.ids()) {
            Ok(registry) => registry,
            Err(err) => {
                log::warn!("{err}. Using the built-in spellbook.");
                builtin_registry(&actors.ids())
            }
        };
        log::info!("{} spells registered", registry.len());

        let mut camera = IsoCamera::new(gpu.size.0, gpu.size.1, config.map.size as f32 / 2.0);
        camera.target = map_center(&config);
        let settings_path = Path::new(&config.camera_settings);
        if settings_path.exists() {
            match load_camera_settings(settings_path) {
                Ok(settings) => settings.apply(&mut camera),
                Err(err) => log::warn!("{err}"),
            }
        }

        let camera_uniform = camera.build_uniform();
        let camera_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Camera Uniform Buffer"),
                contents: bytemuck::cast_slice(&[camera_uniform]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let camera_bind_group =
            sprite_pipeline.create_camera_bind_group(&gpu.device, &camera_buffer);
        let vertex_buffer = create_vertex_buffer(&gpu.device, 1);
        let index_buffer = create_index_buffer(&gpu.device, 1);

        let mut state = Self {
            window,
            gpu,
            clock: FrameClock::new(),
            input: InputState::new(),
            camera,
            sprite_pipeline,
            debug_overlay,
            config,
            map,
            actors,
            registry,
            spellbook_watcher: watcher::FileWatcher::new(spellbook_path),
            sounds: SoundBoard::new(),
            tint: [1.0; 3],
            panning: false,
            paused: false,
            single_step_requested: false,
            loader: TextureLoader::spawn(),
            textures: HashMap::new(),
            failed_textures: HashSet::new(),
            vertex_buffer,
            index_buffer,
            camera_buffer,
            camera_bind_group,
            mesh_vertex_capacity: 0,
            mesh_index_capacity: 0,
            draw_calls: Vec::new(),
            quad_count: 0,
            mesh_dirty: true,
        };

        let white = Texture::solid(
            &state.gpu.device,
            &state.gpu.queue,
            [255, 255, 255, 255],
            "white",
        );
        state.insert_texture(WHITE_TEXTURE, white);
        state.request_scene_textures();
        state.sync_spell_textures();
        state.ensure_mesh_capacity(4, 6);
        Ok(state)
    }

    fn request_scene_textures(&mut self) {
        let textures = &self.config.textures;
        let mut paths: Vec<String> = vec![
            textures.grass.clone(),
            textures.water.clone(),
            textures.mountain.clone(),
            textures.building.clone(),
        ];
        paths.extend(textures.trees.iter().cloned());
        paths.extend(self.actors.sheet_textures().into_iter().map(str::to_string));
        for path in paths {
            self.loader.request(&path);
        }
    }

    /// Bring the registry up to date with textures already resolved and
    /// request the rest.
    fn sync_spell_textures(&mut self) {
        for path in self.registry.pending_textures() {
            if let Some(gpu_texture) = self.textures.get(path.as_str()) {
                let (width, height) = gpu_texture.texture.size;
                self.registry.texture_loaded(&path, width, height);
            } else if self.failed_textures.contains(&path) {
                self.registry.texture_failed(&path);
            } else {
                self.loader.request(&path);
            }
        }
    }

    /// Forget earlier decode failures so missing images dropped in since
    /// then get another chance.
    fn retry_failed_textures(&mut self) {
        if self.failed_textures.is_empty() {
            return;
        }
        log::info!("Retrying {} failed textures", self.failed_textures.len());
        for path in self.failed_textures.drain() {
            self.loader.invalidate(&path);
        }
        self.request_scene_textures();
    }

    fn insert_texture(&mut self, key: &str, texture: Texture) {
        let bind_group = self
            .sprite_pipeline
            .create_texture_bind_group(&self.gpu.device, &texture);
        self.textures.insert(
            Arc::from(key),
            GpuSpriteTexture {
                texture,
                bind_group,
            },
        );
    }

    fn receive_textures(&mut self) {
        for result in self.loader.drain() {
            match result {
                LoadResult::Loaded {
                    path,
                    width,
                    height,
                    rgba,
                } => {
                    let texture = Texture::from_rgba8(
                        &self.gpu.device,
                        &self.gpu.queue,
                        &rgba,
                        width,
                        height,
                        &path,
                    );
                    self.insert_texture(&path, texture);
                    let effects = self.registry.texture_loaded(&path, width, height);
                    log::info!("Texture ready: {path} ({width}x{height}, {effects} effects)");
                }
                LoadResult::Failed(failure) => {
                    log::warn!("{failure}");
                    self.registry.texture_failed(&failure.path);
                    self.failed_textures.insert(failure.path);
                }
            }
            self.mesh_dirty = true;
        }
    }

    fn reload_spellbook(&mut self, reason: &str) {
        match load_registry(self.spellbook_watcher.path(), &self.actors.ids()) {
            Ok(registry) => {
                self.registry = registry;
                self.tint = [1.0; 3];
                self.retry_failed_textures();
                self.sync_spell_textures();
                self.mesh_dirty = true;
                log::info!(
                    "Spellbook reloaded ({reason}): {} spells",
                    self.registry.len()
                );
            }
            Err(err) => log::error!("Spellbook reload failed ({reason}): {err}"),
        }
    }

    fn reset_camera(&mut self) {
        self.camera.target = map_center(&self.config);
        self.camera.set_zoom(1.0);
        self.view_changed();
        self.save_camera();
    }

    fn view_changed(&mut self) {
        self.registry.viewport_changed();
    }

    fn save_camera(&self) {
        let path = Path::new(&self.config.camera_settings);
        if let Err(err) = save_camera_settings(path, &CameraSettings::capture(&self.camera)) {
            log::warn!("{err}");
        }
    }

    /// Drag-to-pan and wheel zoom. Settings are saved when a drag ends and
    /// after every zoom.
    fn handle_camera_input(&mut self) {
        let (dx, dy) = self.input.take_mouse_delta();
        if self.input.is_mouse_held(MouseBtn::Left) {
            if dx != 0.0 || dy != 0.0 {
                self.camera.pan_pixels(dx as f32, dy as f32);
                self.panning = true;
            }
        } else if self.panning {
            self.panning = false;
            self.save_camera();
        }

        let notches = self.input.take_scroll();
        if notches != 0.0 {
            self.camera.zoom_by(notches);
            self.view_changed();
            self.save_camera();
        }
    }

    fn fixed_step(&mut self) {
        let now_ms = self.clock.now_ms();
        let dt = self.clock.fixed_dt as f32;
        let dt_us = (self.clock.fixed_dt * 1_000_000.0).round() as u64;
        let mut cues = Vec::new();

        for trigger in self.input.just_pressed_triggers() {
            self.registry.cast_by_trigger(trigger, now_ms, &mut cues);
        }

        let (right, up) = ground_axes();
        let mut direction = Vec2::ZERO;
        if self.input.is_held(Key::Right) {
            direction += right;
        }
        if self.input.is_held(Key::Left) {
            direction -= right;
        }
        if self.input.is_held(Key::Up) {
            direction += up;
        }
        if self.input.is_held(Key::Down) {
            direction -= up;
        }
        self.actors
            .move_controllable(direction, self.config.hero_speed, dt, &self.map);

        let pose = self.camera.pose();
        let ctx = EffectContext {
            now_ms,
            view: &pose,
            targets: &self.actors,
        };
        self.registry.update(&ctx, &mut cues);
        self.actors.tick(dt_us);
        self.sounds.update(now_ms);
        self.apply_cues(cues, now_ms);
    }

    fn apply_cues(&mut self, cues: Vec<SpellCue>, now_ms: u64) {
        for SpellCue { spell, cue } in cues {
            log::trace!("Cue from '{spell}': {cue:?}");
            match cue {
                Cue::Flash { actor, duration_ms } => self.actors.flash(&actor, duration_ms, now_ms),
                Cue::Act { actor, clip } => self.actors.act(&actor, &clip),
                Cue::React { actor, clip } => self.actors.react(&actor, &clip),
                Cue::Sound(sound) => {
                    self.sounds.play(sound, now_ms);
                }
                Cue::Tint { color } => self.tint = color,
            }
        }
    }

    fn estimate_memory_mb(&self) -> f32 {
        let mut bytes: usize = self.textures.values().map(|t| t.texture.byte_size()).sum();
        bytes += self.mesh_vertex_capacity * std::mem::size_of::<SpriteVertex>();
        bytes += self.mesh_index_capacity * std::mem::size_of::<u32>();
        bytes as f32 / (1024.0 * 1024.0)
    }

    fn overlay_stats(&self) -> OverlayStats {
        OverlayStats {
            draw_calls: self.draw_calls.len() as u32,
            texture_binds: count_texture_binds(&self.draw_calls) as u32,
            quad_count: self.quad_count as u32,
            memory_estimate_mb: self.estimate_memory_mb(),
            textures_loaded: self.textures.len().saturating_sub(1) as u32,
            textures_pending: self.loader.in_flight() as u32,
            textures_failed: self.failed_textures.len() as u32,
            camera_zoom: self.camera.zoom(),
            hero_tile: self.actors.controllable().map(|hero| hero.tile()),
            spells: self
                .registry
                .spells()
                .iter()
                .map(|spell| SpellRow {
                    name: spell.name().to_string(),
                    trigger: spell.trigger(),
                    status: spell.status().label(),
                    pending_steps: spell.pending_steps(),
                    cast_count: spell.cast_count(),
                    recast: spell.recast_policy().label(),
                    looping: spell.effect().is_some_and(|effect| effect.is_looping()),
                })
                .collect(),
            paused: self.paused,
        }
    }

    fn rebuild_mesh(&mut self) {
        let mesh = self.build_mesh();
        self.ensure_mesh_capacity(mesh.vertices.len(), mesh.indices.len());
        self.quad_count = mesh.quad_count();

        if !mesh.vertices.is_empty() {
            self.gpu
                .queue
                .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&mesh.vertices));
        }
        if !mesh.indices.is_empty() {
            self.gpu
                .queue
                .write_buffer(&self.index_buffer, 0, bytemuck::cast_slice(&mesh.indices));
        }
        self.draw_calls = mesh.draw_calls;
        self.mesh_dirty = false;
    }

    fn build_mesh(&self) -> SpriteMesh {
        let tile_count = (self.map.width() * self.map.height()) as usize;
        let mut mesh = SpriteMesh::with_capacity(tile_count + 128);
        let textures = &self.config.textures;

        // Ground tiles lie flat; drawn first since nothing sorts against them.
        let flat = Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2);
        for (x, y, tile) in self.map.iter() {
            let (path, fallback) = match tile.terrain {
                Terrain::Grass => (textures.grass.as_str(), [0.42, 0.66, 0.32, 1.0]),
                Terrain::Water => (textures.water.as_str(), [0.2, 0.45, 0.8, 1.0]),
                Terrain::Mountain => (textures.mountain.as_str(), [0.5, 0.48, 0.45, 1.0]),
            };
            let (texture_key, color) = self.surface(path, fallback);
            mesh.push_quad(QuadSpec {
                texture_key,
                center: Vec3::new(x as f32, 0.0, y as f32),
                size: Vec2::ONE,
                orientation: flat,
                uv: FrameRect::FULL.uv_bounds(),
                color,
                flash: 0.0,
            });
        }

        let mut billboards = Vec::new();
        for (x, y, tile) in self.map.iter() {
            let Some(prop) = tile.prop else {
                continue;
            };
            let (path, fallback, size) = match prop {
                Prop::Tree { variant } => (
                    textures
                        .trees
                        .get(variant as usize)
                        .map_or("", String::as_str),
                    [0.15, 0.4, 0.2, 1.0],
                    TREE_SIZE,
                ),
                Prop::Building => (textures.building.as_str(), [0.6, 0.4, 0.3, 1.0], BUILDING_SIZE),
            };
            let (texture_key, color) = self.surface(path, fallback);
            billboards.push(Billboard {
                texture_key,
                base: Vec3::new(x as f32, 0.0, y as f32),
                size,
                uv: FrameRect::FULL.uv_bounds(),
                color,
                flash: 0.0,
            });
        }

        let now_ms = self.clock.now_ms();
        for actor in self.actors.iter() {
            let (texture_key, uv, color) = match actor.sprite() {
                Some((path, rect)) if self.textures.contains_key(path) => {
                    (path, rect.uv_bounds(), [1.0; 4])
                }
                _ => (
                    WHITE_TEXTURE,
                    FrameRect::FULL.uv_bounds(),
                    if actor.controllable {
                        [0.25, 0.4, 0.9, 1.0]
                    } else {
                        [0.85, 0.25, 0.25, 1.0]
                    },
                ),
            };
            billboards.push(Billboard {
                texture_key,
                base: actor.position,
                size: actor.size,
                uv,
                color,
                flash: if actor.is_flashing(now_ms) { 1.0 } else { 0.0 },
            });
        }

        // No depth buffer: farther billboards first.
        billboards.sort_by(|a, b| {
            self.camera
                .view_depth(b.base)
                .total_cmp(&self.camera.view_depth(a.base))
        });
        let rotation = IsoCamera::rotation();
        let up = rotation * Vec3::Y;
        for billboard in billboards {
            mesh.push_quad(QuadSpec {
                texture_key: billboard.texture_key,
                center: billboard.base + up * (billboard.size.y * 0.5),
                size: billboard.size,
                orientation: rotation,
                uv: billboard.uv,
                color: billboard.color,
                flash: billboard.flash,
            });
        }

        // Effects always draw on top.
        for quad in self.registry.quads() {
            if !self.textures.contains_key(quad.texture) {
                continue;
            }
            mesh.push_quad(QuadSpec {
                texture_key: quad.texture,
                center: quad.center,
                size: quad.size,
                orientation: quad.orientation,
                uv: quad.uv,
                color: [1.0; 4],
                flash: 0.0,
            });
        }

        mesh
    }

    /// Texture key and vertex colour for `path`: the texture itself once
    /// loaded, otherwise white tinted with `fallback`.
    fn surface<'a>(&self, path: &'a str, fallback: [f32; 4]) -> (&'a str, [f32; 4]) {
        if self.textures.contains_key(path) {
            (path, [1.0; 4])
        } else {
            (WHITE_TEXTURE, fallback)
        }
    }

    fn ensure_mesh_capacity(&mut self, vertex_count: usize, index_count: usize) {
        let needed_vertices = vertex_count.max(1);
        if needed_vertices > self.mesh_vertex_capacity {
            self.mesh_vertex_capacity = needed_vertices.next_power_of_two();
            self.vertex_buffer = create_vertex_buffer(&self.gpu.device, self.mesh_vertex_capacity);
        }

        let needed_indices = index_count.max(1);
        if needed_indices > self.mesh_index_capacity {
            self.mesh_index_capacity = needed_indices.next_power_of_two();
            self.index_buffer = create_index_buffer(&self.gpu.device, self.mesh_index_capacity);
        }
    }

    fn clear_color(&self) -> wgpu::Color {
        let [r, g, b] = self.config.background;
        let [tr, tg, tb] = self.tint;
        wgpu::Color {
            r: (r * tr) as f64,
            g: (g * tg) as f64,
            b: (b * tb) as f64,
            a: 1.0,
        }
    }

    fn render(&mut self) {
        let camera_uniform = self.camera.build_uniform();
        self.gpu
            .queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[camera_uniform]));

        let Some((output, view)) = self.gpu.begin_frame() else {
            return;
        };

        let stats = self.overlay_stats();
        let (egui_primitives, egui_textures_delta, overlay_actions) =
            self.debug_overlay.prepare(&self.window, &self.clock, &stats);

        if let Some(trigger) = overlay_actions.cast {
            let now_ms = self.clock.now_ms();
            let mut cues = Vec::new();
            self.registry.cast_by_trigger(trigger, now_ms, &mut cues);
            self.apply_cues(cues, now_ms);
        }
        if overlay_actions.toggle_pause {
            self.paused = !self.paused;
            log::info!(
                "Simulation {}",
                if self.paused { "PAUSED" } else { "RESUMED" }
            );
        }
        if overlay_actions.single_step {
            self.single_step_requested = true;
        }
        if overlay_actions.reset_camera {
            self.reset_camera();
        }
        if overlay_actions.reload_spellbook {
            self.reload_spellbook("overlay");
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.gpu.size.0, self.gpu.size.1],
            pixels_per_point: self.window.scale_factor() as f32,
        };

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut last_bound_texture_key: Option<&Arc<str>> = None;
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color()),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                ..Default::default()
            });

            render_pass.set_pipeline(&self.sprite_pipeline.render_pipeline);
            render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);

            for draw in &self.draw_calls {
                let Some(texture) = self.textures.get(&draw.texture_key) else {
                    continue;
                };
                let need_rebind = match last_bound_texture_key {
                    Some(last) => **last != *draw.texture_key,
                    None => true,
                };
                if need_rebind {
                    render_pass.set_bind_group(1, &texture.bind_group, &[]);
                    last_bound_texture_key = Some(&draw.texture_key);
                }
                render_pass.draw_indexed(
                    draw.index_start..(draw.index_start + draw.index_count),
                    0,
                    0..1,
                );
            }
        }

        self.debug_overlay.upload(
            &self.gpu.device,
            &self.gpu.queue,
            &mut encoder,
            &egui_primitives,
            &egui_textures_delta,
            &screen_descriptor,
        );

        {
            let mut egui_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui Render Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();

            self.debug_overlay
                .paint(&mut egui_pass, &egui_primitives, &screen_descriptor);
        }

        self.debug_overlay.cleanup(&egui_textures_delta);

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
    }
}

struct App {
    config: GameConfig,
    state: Option<EngineState>,
}

impl App {
    fn new(config: GameConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let platform = self.config.platform();
        let window = match tm_platform::window::create_window(event_loop, &platform) {
            Ok(window) => window,
            Err(err) => {
                log::error!("Failed to create window: {err}");
                event_loop.exit();
                return;
            }
        };
        log::info!("Window created: {}x{}", platform.width, platform.height);
        match EngineState::new(window, self.config.clone()) {
            Ok(state) => {
                log::info!("GPU adapter: {}", state.gpu.adapter_name);
                self.state = Some(state);
            }
            Err(err) => {
                log::error!("Failed to initialise renderer: {err}");
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let state = match self.state.as_mut() {
            Some(s) => s,
            None => return,
        };

        let egui_consumed = state
            .debug_overlay
            .handle_window_event(&state.window, &event);

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting.");
                event_loop.exit();
            }

            WindowEvent::Resized(physical_size) => {
                let w = physical_size.width;
                let h = physical_size.height;
                if w > 0 && h > 0 {
                    state.gpu.resize(w, h);
                    state.camera.resize(w, h);
                    state.view_changed();
                    log::info!("Resized to {}x{}", w, h);
                }
            }

            WindowEvent::KeyboardInput { event, .. } if !egui_consumed => {
                if let PhysicalKey::Code(key_code) = event.physical_key {
                    if let Some(engine_key) = map_key(key_code) {
                        match event.state {
                            ElementState::Pressed => state.input.key_down(engine_key),
                            ElementState::Released => state.input.key_up(engine_key),
                        }
                    }
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                state.input.mouse_moved(position.x, position.y);
            }

            WindowEvent::MouseInput {
                state: button_state,
                button,
                ..
            } => {
                if let Some(btn) = map_mouse_button(button) {
                    match button_state {
                        ElementState::Pressed if !egui_consumed => state.input.mouse_down(btn),
                        ElementState::Released => state.input.mouse_up(btn),
                        _ => {}
                    }
                }
            }

            WindowEvent::MouseWheel { delta, .. } if !egui_consumed => {
                let notches = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(position) => {
                        (position.y / WHEEL_PIXELS_PER_NOTCH) as f32
                    }
                };
                state.input.scrolled(notches);
            }

            WindowEvent::RedrawRequested => {
                if state.gpu.size.0 == 0 || state.gpu.size.1 == 0 {
                    return;
                }

                state.clock.begin_frame();
                if state.paused {
                    state.clock.hold(u32::from(state.single_step_requested));
                    state.single_step_requested = false;
                }

                state.receive_textures();
                state.actors.poll_reload();
                if state.spellbook_watcher.should_reload() {
                    state.reload_spellbook("file watcher");
                }
                state.handle_camera_input();

                // Host keys work whether or not the simulation steps.
                let host = take_host_commands(&mut state.input);
                if host.quit {
                    event_loop.exit();
                    return;
                }
                if host.toggle_overlay {
                    state.debug_overlay.toggle();
                }
                if host.reset_camera {
                    state.reset_camera();
                }
                if host.reload_spellbook {
                    state.reload_spellbook("manual trigger (F5)");
                }

                while state.clock.should_step() {
                    state.fixed_step();
                    // Edge-triggered input is consumed by the first step.
                    state.input.end_frame();
                }
                settle_unstepped_input(
                    &mut state.input,
                    state.paused,
                    state.clock.steps_this_frame,
                );

                if state.mesh_dirty || state.clock.steps_this_frame > 0 {
                    state.rebuild_mesh();
                }

                state.render();
            }

            _ => {}
        }
    }
}

/// Host-level key commands for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct HostCommands {
    quit: bool,
    toggle_overlay: bool,
    reset_camera: bool,
    reload_spellbook: bool,
}

/// Consume host key presses so each is acted on exactly once, even on
/// frames that run no fixed step.
fn take_host_commands(input: &mut InputState) -> HostCommands {
    HostCommands {
        quit: input.take_just_pressed(Key::Escape),
        toggle_overlay: input.take_just_pressed(Key::F3),
        reset_camera: input.take_just_pressed(Key::Home),
        reload_spellbook: input.take_just_pressed(Key::F5),
    }
}

/// A paused frame with no step drops its edges; otherwise spell keys pressed
/// during the pause would all cast on the first step after resuming.
/// Unpaused zero-step frames keep them for the next frame's step.
fn settle_unstepped_input(input: &mut InputState, paused: bool, steps_this_frame: u32) {
    if paused && steps_this_frame == 0 {
        input.end_frame();
    }
}

fn load_registry(path: &Path, actors: &[ActorId]) -> Result<SpellRegistry, String> {
    let book = load_spellbook(path)?;
    build_registry(&book, actors)
}

fn builtin_registry(actors: &[ActorId]) -> SpellRegistry {
    parse_spellbook(DEFAULT_SPELLBOOK)
        .and_then(|book| build_registry(&book, actors))
        .unwrap_or_else(|err| {
            log::error!("Built-in spellbook unusable: {err}. No spells registered.");
            SpellRegistry::new()
        })
}

fn map_center(config: &GameConfig) -> Vec3 {
    let half = config.map.size as f32 / 2.0;
    Vec3::new(half, 0.0, half)
}

/// Screen-right and screen-up projected onto the ground plane as `(x, z)`.
fn ground_axes() -> (Vec2, Vec2) {
    let rotation = IsoCamera::rotation();
    let right = rotation * Vec3::X;
    let forward = rotation * Vec3::NEG_Z;
    (
        Vec2::new(right.x, right.z).normalize_or_zero(),
        Vec2::new(forward.x, forward.z).normalize_or_zero(),
    )
}

fn create_vertex_buffer(device: &wgpu::Device, vertex_capacity: usize) -> wgpu::Buffer {
    let byte_len = (vertex_capacity * std::mem::size_of::<SpriteVertex>()).max(1) as u64;
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Scene Vertex Buffer"),
        size: byte_len,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_index_buffer(device: &wgpu::Device, index_capacity: usize) -> wgpu::Buffer {
    let byte_len = (index_capacity * std::mem::size_of::<u32>()).max(1) as u64;
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Scene Index Buffer"),
        size: byte_len,
        usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn map_key(key_code: KeyCode) -> Option<Key> {
    match key_code {
        KeyCode::ArrowLeft => Some(Key::Left),
        KeyCode::ArrowRight => Some(Key::Right),
        KeyCode::ArrowUp => Some(Key::Up),
        KeyCode::ArrowDown => Some(Key::Down),
        KeyCode::Escape => Some(Key::Escape),
        KeyCode::Home => Some(Key::Home),
        KeyCode::F3 => Some(Key::F3),
        KeyCode::F5 => Some(Key::F5),
        KeyCode::KeyQ => Some(Key::Q),
        KeyCode::KeyW => Some(Key::W),
        KeyCode::KeyE => Some(Key::E),
        KeyCode::KeyR => Some(Key::R),
        KeyCode::KeyD => Some(Key::D),
        _ => None,
    }
}

fn map_mouse_button(button: MouseButton) -> Option<MouseBtn> {
    match button {
        MouseButton::Left => Some(MouseBtn::Left),
        MouseButton::Right => Some(MouseBtn::Right),
        MouseButton::Middle => Some(MouseBtn::Middle),
        _ => None,
    }
}

fn load_config() -> GameConfig {
    let path = Path::new(CONFIG_PATH);
    match load_game_config(path) {
        Ok(config) => config,
        Err(err) => {
            log::warn!("{err}. Using the default scene.");
            GameConfig::default()
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Tilemancer starting...");
    let config = load_config();

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            log::error!("Failed to create event loop: {err}");
            return;
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    if let Err(err) = event_loop.run_app(&mut app) {
        log::error!("Event loop error: {err}");
    }
}
