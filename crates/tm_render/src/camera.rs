//! Fixed-angle isometric orthographic camera.
//!
//! The camera looks at `target` from a fixed yaw/pitch. Panning moves the
//! target in the screen plane; zoom narrows the frustum. Nothing here ever
//! rotates the view.

use glam::{EulerRot, Mat4, Quat, Vec2, Vec3, Vec4};
use tm_core::effect::ViewPose;

pub const MIN_ZOOM: f32 = 0.5;
pub const MAX_ZOOM: f32 = 5.0;
pub const ZOOM_STEP: f32 = 1.1;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
}

pub struct IsoCamera {
    pub target: Vec3,
    zoom: f32,
    pub viewport: (u32, u32),
    /// Frustum half-height at zoom 1.
    half_height: f32,
    /// Eye distance from the target along the view direction.
    distance: f32,
}

impl IsoCamera {
    /// `half_height` is the world-space half-height of the view at zoom 1;
    /// a map of `n` tiles is fully visible with `n / 2`.
    pub fn new(viewport_width: u32, viewport_height: u32, half_height: f32) -> Self {
        let half_height = half_height.max(1.0);
        Self {
            target: Vec3::ZERO,
            zoom: 1.0,
            viewport: (viewport_width, viewport_height),
            half_height,
            distance: half_height * 4.0,
        }
    }

    /// Yaw -45° then pitch down by atan(√2).
    pub fn rotation() -> Quat {
        Quat::from_euler(
            EulerRot::YXZ,
            -std::f32::consts::FRAC_PI_4,
            -(2.0f32.sqrt()).atan(),
            0.0,
        )
    }

    pub fn forward() -> Vec3 {
        Self::rotation() * Vec3::NEG_Z
    }

    pub fn eye(&self) -> Vec3 {
        self.target - Self::forward() * self.distance
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = if zoom.is_finite() {
            zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            1.0
        };
    }

    /// Apply wheel notches; positive zooms in.
    pub fn zoom_by(&mut self, notches: f32) {
        if notches == 0.0 {
            return;
        }
        self.set_zoom(self.zoom * ZOOM_STEP.powf(notches));
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.viewport = (width, height);
        }
    }

    pub fn aspect(&self) -> f32 {
        self.viewport.0.max(1) as f32 / self.viewport.1.max(1) as f32
    }

    /// Visible world height after zoom.
    pub fn view_height(&self) -> f32 {
        2.0 * self.half_height / self.zoom
    }

    /// Drag the view by a pixel delta; content follows the cursor.
    pub fn pan_pixels(&mut self, dx: f32, dy: f32) {
        let units_per_pixel = self.view_height() / self.viewport.1.max(1) as f32;
        let rotation = Self::rotation();
        let right = rotation * Vec3::X;
        let up = rotation * Vec3::Y;
        self.target += right * (-dx * units_per_pixel) + up * (dy * units_per_pixel);
    }

    pub fn pose(&self) -> ViewPose {
        ViewPose {
            position: self.eye(),
            rotation: Self::rotation(),
            view_height: self.view_height(),
        }
    }

    pub fn view_proj(&self) -> Mat4 {
        let half_h = self.half_height / self.zoom;
        let half_w = half_h * self.aspect();
        let proj = Mat4::orthographic_rh(
            -half_w,
            half_w,
            -half_h,
            half_h,
            0.1,
            self.distance * 2.0,
        );
        let view = Mat4::from_rotation_translation(Self::rotation(), self.eye()).inverse();
        proj * view
    }

    pub fn build_uniform(&self) -> CameraUniform {
        CameraUniform {
            view_proj: self.view_proj().to_cols_array_2d(),
        }
    }

    /// Normalized device XY of a world point.
    pub fn project(&self, world: Vec3) -> Vec2 {
        let clip = self.view_proj() * Vec4::new(world.x, world.y, world.z, 1.0);
        Vec2::new(clip.x / clip.w, clip.y / clip.w)
    }

    /// Depth of a world point along the view direction; larger is farther.
    pub fn view_depth(&self, world: Vec3) -> f32 {
        (world - self.eye()).dot(Self::forward())
    }
}
