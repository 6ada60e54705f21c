use std::sync::Arc;
use winit::error::OsError;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowAttributes};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            title: "Tilemancer".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

impl PlatformConfig {
    /// Zero sizes fall back to the defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.width == 0 || self.height == 0 {
            log::warn!(
                "Window size {}x{} is invalid, using {}x{}",
                self.width,
                self.height,
                defaults.width,
                defaults.height
            );
            self.width = defaults.width;
            self.height = defaults.height;
        }
        if self.title.trim().is_empty() {
            self.title = defaults.title;
        }
        self
    }
}

pub fn create_window(
    event_loop: &ActiveEventLoop,
    config: &PlatformConfig,
) -> Result<Arc<Window>, OsError> {
    let attrs = WindowAttributes::default()
        .with_title(&config.title)
        .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));

    let window = event_loop.create_window(attrs)?;
    Ok(Arc::new(window))
}
