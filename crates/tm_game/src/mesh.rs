//! CPU-side sprite mesh: oriented world-space quads batched into draw calls
//! by texture.

use std::sync::Arc;

use glam::{Quat, Vec2, Vec3};
use tm_render::SpriteVertex;

/// A contiguous run of indices that share the same texture binding.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub texture_key: Arc<str>,
    pub index_start: u32,
    pub index_count: u32,
}

pub struct QuadSpec<'a> {
    pub texture_key: &'a str,
    pub center: Vec3,
    pub size: Vec2,
    /// Local +X is the quad's right edge, +Y its top.
    pub orientation: Quat,
    /// `[u0, v0, u1, v1]`, top-left origin.
    pub uv: [f32; 4],
    pub color: [f32; 4],
    pub flash: f32,
}

#[derive(Default)]
pub struct SpriteMesh {
    pub vertices: Vec<SpriteVertex>,
    pub indices: Vec<u32>,
    pub draw_calls: Vec<DrawCall>,
}

impl SpriteMesh {
    pub fn with_capacity(quads: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(quads * 4),
            indices: Vec::with_capacity(quads * 6),
            draw_calls: Vec::with_capacity(16),
        }
    }

    pub fn quad_count(&self) -> usize {
        self.vertices.len() / 4
    }

    pub fn push_quad(&mut self, spec: QuadSpec<'_>) {
        let right = spec.orientation * Vec3::X * (spec.size.x * 0.5);
        let up = spec.orientation * Vec3::Y * (spec.size.y * 0.5);
        let [u0, v0, u1, v1] = spec.uv;
        let base_index = self.vertices.len() as u32;

        let corners = [
            (spec.center - right - up, [u0, v1]),
            (spec.center + right - up, [u1, v1]),
            (spec.center + right + up, [u1, v0]),
            (spec.center - right + up, [u0, v0]),
        ];
        for (position, tex_coords) in corners {
            self.vertices.push(SpriteVertex {
                position: position.to_array(),
                tex_coords,
                color: spec.color,
                flash: spec.flash,
            });
        }

        let draw_start = self.indices.len() as u32;
        self.indices.extend_from_slice(&[
            base_index,
            base_index + 1,
            base_index + 2,
            base_index,
            base_index + 2,
            base_index + 3,
        ]);
        push_draw_call(
            &mut self.draw_calls,
            Arc::from(spec.texture_key),
            draw_start,
            6,
        );
    }
}

/// Append a draw call, merging with the previous one when the texture matches
/// and indices are contiguous.
pub fn push_draw_call(
    draw_calls: &mut Vec<DrawCall>,
    texture_key: Arc<str>,
    index_start: u32,
    index_count: u32,
) {
    if let Some(last) = draw_calls.last_mut() {
        let contiguous = last.index_start + last.index_count == index_start;
        if *last.texture_key == *texture_key && contiguous {
            last.index_count += index_count;
            return;
        }
    }
    draw_calls.push(DrawCall {
        texture_key,
        index_start,
        index_count,
    });
}

pub fn count_texture_binds(draw_calls: &[DrawCall]) -> usize {
    let mut binds = 0usize;
    let mut current: Option<&str> = None;
    for draw in draw_calls {
        let key: &str = &draw.texture_key;
        if current != Some(key) {
            current = Some(key);
            binds += 1;
        }
    }
    binds
}
