//! Debug overlay rendered via egui on top of the map.
//!
//! Integration pattern: egui requires a three-phase render split because
//! `egui_wgpu::Renderer::render()` needs a `RenderPass<'static>`, while
//! `begin_render_pass` borrows the encoder. The phases are:
//!
//!   1. `prepare()` -- run egui UI logic, produce tessellated primitives
//!   2. `upload()`  -- upload textures and update GPU buffers (borrows encoder mutably)
//!   3. `paint()`   -- render into a new render pass with `forget_lifetime()`
//!   4. `cleanup()` -- free textures egui no longer references
//!
//! UI logic only runs while `visible` (toggled by F3), but egui event
//! handling is always active so the overlay can intercept clicks when shown.

use tm_core::input::Trigger;
use tm_core::time::FrameClock;
use winit::window::Window;

/// One spell as the overlay lists it.
#[derive(Debug, Clone)]
pub struct SpellRow {
    pub name: String,
    pub trigger: Trigger,
    /// Short status label ("ready", "loading", "active"...)
    pub status: &'static str,
    pub pending_steps: usize,
    pub cast_count: u64,
    /// Re-cast policy label ("overlap", "cancel")
    pub recast: &'static str,
    pub looping: bool,
}

#[derive(Debug, Clone, Default)]
pub struct OverlayStats {
    pub draw_calls: u32,
    pub texture_binds: u32,
    pub quad_count: u32,
    /// Estimated GPU memory usage in megabytes
    pub memory_estimate_mb: f32,
    pub textures_loaded: u32,
    pub textures_pending: u32,
    pub textures_failed: u32,
    pub camera_zoom: f32,
    pub hero_tile: Option<(i32, i32)>,
    pub spells: Vec<SpellRow>,
    /// Whether simulation is paused
    pub paused: bool,
}

#[derive(Debug, Clone, Default)]
pub struct OverlayActions {
    /// Spell the user cast from its button
    pub cast: Option<Trigger>,
    /// User clicked the pause toggle
    pub toggle_pause: bool,
    /// User clicked the single-step button (advance one fixed step while paused)
    pub single_step: bool,
    pub reset_camera: bool,
    pub reload_spellbook: bool,
}

pub struct DebugOverlay {
    pub egui_ctx: egui::Context,
    pub egui_winit_state: egui_winit::State,
    pub egui_renderer: egui_wgpu::Renderer,
    pub visible: bool,
}

impl DebugOverlay {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        window: &Window,
    ) -> Self {
        let egui_ctx = egui::Context::default();
        let egui_winit_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            window,
            None,
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(device, surface_format, None, 1, false);

        Self {
            egui_ctx,
            egui_winit_state,
            egui_renderer,
            visible: false,
        }
    }

    pub fn handle_window_event(
        &mut self,
        window: &Window,
        event: &winit::event::WindowEvent,
    ) -> bool {
        let response = self.egui_winit_state.on_window_event(window, event);
        response.consumed
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
        log::info!("Debug overlay: {}", if self.visible { "ON" } else { "OFF" });
    }

    pub fn prepare(
        &mut self,
        window: &Window,
        clock: &FrameClock,
        stats: &OverlayStats,
    ) -> (
        Vec<egui::ClippedPrimitive>,
        egui::TexturesDelta,
        OverlayActions,
    ) {
        let mut actions = OverlayActions::default();
        let raw_input = self.egui_winit_state.take_egui_input(window);
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            if self.visible {
                egui::Window::new("Debug")
                    .default_pos([10.0, 10.0])
                    .show(ctx, |ui| {
                        show_timing(ui, clock);
                        ui.separator();
                        show_render_stats(ui, stats);
                        ui.separator();
                        show_spells(ui, stats, &mut actions);
                        ui.separator();
                        show_controls(ui, stats, &mut actions);
                    });
            }
        });

        self.egui_winit_state
            .handle_platform_output(window, full_output.platform_output);

        let primitives = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        (primitives, full_output.textures_delta, actions)
    }

    /// Upload textures and update buffers. Call before creating the egui render pass.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        primitives: &[egui::ClippedPrimitive],
        textures_delta: &egui::TexturesDelta,
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
    ) {
        for (id, image_delta) in &textures_delta.set {
            self.egui_renderer
                .update_texture(device, queue, *id, image_delta);
        }

        self.egui_renderer
            .update_buffers(device, queue, encoder, primitives, screen_descriptor);
    }

    /// Render into an existing render pass. Call after `upload()`.
    pub fn paint(
        &self,
        render_pass: &mut wgpu::RenderPass<'static>,
        primitives: &[egui::ClippedPrimitive],
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
    ) {
        self.egui_renderer
            .render(render_pass, primitives, screen_descriptor);
    }

    /// Free textures that egui no longer needs. Call after rendering.
    pub fn cleanup(&mut self, textures_delta: &egui::TexturesDelta) {
        for id in &textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}

fn show_timing(ui: &mut egui::Ui, clock: &FrameClock) {
    ui.label(format!("FPS: {:.1}", clock.smoothed_fps));
    ui.label(format!("Frame time: {:.2} ms", clock.smoothed_frame_time_ms));
    ui.label(format!("Steps this frame: {}", clock.steps_this_frame));
    ui.label(format!("Timeline: {} ms", clock.now_ms()));
}

fn show_render_stats(ui: &mut egui::Ui, stats: &OverlayStats) {
    ui.label(format!("Draw calls: {}", stats.draw_calls));
    ui.label(format!("Texture binds: {}", stats.texture_binds));
    ui.label(format!("Quads: {}", stats.quad_count));
    ui.label(format!("Memory: {:.1} MB", stats.memory_estimate_mb));
    ui.label(format!(
        "Textures: {} loaded, {} pending, {} failed",
        stats.textures_loaded, stats.textures_pending, stats.textures_failed
    ));
    ui.label(format!("Zoom: {:.2}", stats.camera_zoom));
    if let Some((x, y)) = stats.hero_tile {
        ui.label(format!("Hero tile: ({x}, {y})"));
    }
}

fn show_spells(ui: &mut egui::Ui, stats: &OverlayStats, actions: &mut OverlayActions) {
    ui.label("Spells");
    egui::Grid::new("spell_grid").striped(true).show(ui, |ui| {
        for row in &stats.spells {
            if ui
                .button(format!("[{}] {}", row.trigger, row.name))
                .clicked()
            {
                actions.cast = Some(row.trigger);
            }
            ui.label(row.status);
            ui.label(if row.looping { "loop" } else { "once" });
            ui.label(row.recast);
            ui.label(format!("{} queued", row.pending_steps));
            ui.label(format!("x{}", row.cast_count));
            ui.end_row();
        }
    });
    if ui.button("Reload spellbook").clicked() {
        actions.reload_spellbook = true;
    }
}

fn show_controls(ui: &mut egui::Ui, stats: &OverlayStats, actions: &mut OverlayActions) {
    ui.horizontal(|ui| {
        let pause_label = if stats.paused { "Resume" } else { "Pause" };
        if ui.button(pause_label).clicked() {
            actions.toggle_pause = true;
        }
        if stats.paused && ui.button("Step").clicked() {
            actions.single_step = true;
        }
        if ui.button("Reset camera").clicked() {
            actions.reset_camera = true;
        }
    });
    if stats.paused {
        ui.label("\u{23f8} PAUSED");
    }
}
