//! Background texture decoding.
//!
//! A single worker thread reads and decodes image files; the render thread
//! drains results once per frame and uploads them. Each path is requested at
//! most once per [`TextureLoader`].

use std::collections::HashSet;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tm_core::error::LoadFailure;

enum LoadCmd {
    Decode(String),
    Shutdown,
}

#[derive(Debug)]
pub enum LoadResult {
    Loaded {
        path: String,
        width: u32,
        height: u32,
        rgba: Vec<u8>,
    },
    Failed(LoadFailure),
}

pub struct TextureLoader {
    tx_cmd: Sender<LoadCmd>,
    rx_result: Receiver<LoadResult>,
    handle: Option<JoinHandle<()>>,
    requested: HashSet<String>,
    in_flight: usize,
}

impl TextureLoader {
    pub fn spawn() -> Self {
        let (tx_cmd, rx_cmd) = unbounded::<LoadCmd>();
        let (tx_result, rx_result) = unbounded::<LoadResult>();
        let handle = std::thread::Builder::new()
            .name("texture-loader".to_string())
            .spawn(move || loader_thread(rx_cmd, tx_result))
            .map_err(|err| log::error!("Failed to spawn texture loader thread: {err}"))
            .ok();
        Self {
            tx_cmd,
            rx_result,
            handle,
            requested: HashSet::new(),
            in_flight: 0,
        }
    }

    /// Queue `path` unless it was requested before. Returns true if queued.
    pub fn request(&mut self, path: &str) -> bool {
        if !self.requested.insert(path.to_string()) {
            return false;
        }
        if self.handle.is_none() || self.tx_cmd.send(LoadCmd::Decode(path.to_string())).is_err() {
            log::error!("Texture loader unavailable; '{path}' will never load");
            return false;
        }
        self.in_flight += 1;
        true
    }

    /// Forget a path so the next `request` decodes it again.
    pub fn invalidate(&mut self, path: &str) {
        self.requested.remove(path);
    }

    /// Results that arrived since the last call. Never blocks.
    pub fn drain(&mut self) -> Vec<LoadResult> {
        let results: Vec<LoadResult> = self.rx_result.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(results.len());
        results
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}

impl Drop for TextureLoader {
    fn drop(&mut self) {
        let _ = self.tx_cmd.send(LoadCmd::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn loader_thread(rx_cmd: Receiver<LoadCmd>, tx_result: Sender<LoadResult>) {
    log::debug!("Texture loader thread started");
    for cmd in rx_cmd.iter() {
        match cmd {
            LoadCmd::Decode(path) => {
                let result = decode_rgba(&path);
                if tx_result.send(result).is_err() {
                    break;
                }
            }
            LoadCmd::Shutdown => break,
        }
    }
    log::debug!("Texture loader thread stopped");
}

pub fn decode_rgba(path: &str) -> LoadResult {
    match image::open(path) {
        Ok(img) => {
            let rgba = img.to_rgba8();
            let (width, height) = rgba.dimensions();
            log::debug!("Decoded texture '{path}' ({width}x{height})");
            LoadResult::Loaded {
                path: path.to_string(),
                width,
                height,
                rgba: rgba.into_raw(),
            }
        }
        Err(err) => LoadResult::Failed(LoadFailure {
            path: path.to_string(),
            reason: err.to_string(),
        }),
    }
}
