//! Persisted camera view (`target`, `zoom`), restored at startup.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use glam::Vec3;
use tm_render::IsoCamera;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    pub target: [f32; 3],
    pub zoom: f32,
}

impl CameraSettings {
    pub fn capture(camera: &IsoCamera) -> Self {
        Self {
            target: camera.target.to_array(),
            zoom: camera.zoom(),
        }
    }

    /// Zoom is re-clamped by the camera.
    pub fn apply(&self, camera: &mut IsoCamera) {
        camera.target = Vec3::from_array(self.target);
        camera.set_zoom(self.zoom);
    }
}

pub fn load_camera_settings(path: &Path) -> Result<CameraSettings, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read camera settings {}: {e}", path.display()))?;
    let settings: CameraSettings = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse camera settings {}: {e}", path.display()))?;
    if settings.target.iter().any(|c| !c.is_finite()) {
        return Err(format!(
            "Camera settings {}: target {:?} is not finite",
            path.display(),
            settings.target
        ));
    }
    Ok(settings)
}

pub fn save_camera_settings(path: &Path, settings: &CameraSettings) -> Result<(), String> {
    let raw = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to encode camera settings: {e}"))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write camera settings {}: {e}", path.display()))
}
