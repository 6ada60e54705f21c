//! Game configuration (`assets/config/game.json`).
//!
//! Every field has a default, so a partial file only overrides what it
//! names and a missing file runs the stock scene.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use tm_platform::window::PlatformConfig;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    pub window: WindowConfig,
    pub map: MapConfig,
    /// Clear colour before tint, linear RGB.
    pub background: [f32; 3],
    pub spellbook: String,
    pub camera_settings: String,
    pub textures: TextureConfig,
    pub actors: Vec<ActorConfig>,
    /// Hero movement speed in tiles per second.
    pub hero_speed: f32,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MapConfig {
    pub size: u32,
    pub seed: u64,
    pub water: TileRect,
    pub trees: u32,
    pub buildings: u32,
}

/// Half-open tile rectangle `[x0, x1) x [y0, y1)`.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct TileRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TextureConfig {
    pub grass: String,
    pub water: String,
    pub mountain: String,
    pub trees: Vec<String>,
    pub building: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ActorConfig {
    pub id: String,
    pub animations: String,
    pub tile: [i32; 2],
    #[serde(default = "default_actor_size")]
    pub size: [f32; 2],
    #[serde(default)]
    pub controllable: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            map: MapConfig::default(),
            background: [0.86, 0.9, 0.95],
            spellbook: "assets/spells/spellbook.json".to_string(),
            camera_settings: "camera_settings.json".to_string(),
            textures: TextureConfig::default(),
            actors: vec![
                ActorConfig {
                    id: "hero".to_string(),
                    animations: "assets/animations/hero.json".to_string(),
                    tile: [44, 48],
                    size: default_actor_size(),
                    controllable: true,
                },
                ActorConfig {
                    id: "enemy1".to_string(),
                    animations: "assets/animations/enemy.json".to_string(),
                    tile: [52, 48],
                    size: default_actor_size(),
                    controllable: false,
                },
            ],
            hero_speed: 4.0,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        let platform = PlatformConfig::default();
        Self {
            title: platform.title,
            width: platform.width,
            height: platform.height,
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            size: 96,
            seed: 0x7117_5eed,
            water: TileRect {
                x0: 10,
                y0: 10,
                x1: 15,
                y1: 15,
            },
            trees: 50,
            buildings: 10,
        }
    }
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            grass: "assets/env/ground.png".to_string(),
            water: "assets/env/water.png".to_string(),
            mountain: "assets/env/mountain.png".to_string(),
            trees: vec![
                "assets/env/tree_snowy.png".to_string(),
                "assets/env/tree.png".to_string(),
            ],
            building: "assets/env/house.png".to_string(),
        }
    }
}

impl GameConfig {
    pub fn platform(&self) -> PlatformConfig {
        PlatformConfig {
            title: self.window.title.clone(),
            width: self.window.width,
            height: self.window.height,
        }
        .sanitized()
    }
}

const fn default_actor_size() -> [f32; 2] {
    [3.0, 4.0]
}

pub fn load_game_config(path: &Path) -> Result<GameConfig, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;
    let config: GameConfig = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse config JSON {}: {e}", path.display()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &GameConfig) -> Result<(), String> {
    if config.map.size == 0 {
        return Err("Config validation failed: map size must be positive".to_string());
    }
    if config.textures.trees.is_empty() {
        return Err("Config validation failed: at least one tree texture is required".to_string());
    }
    if !(config.hero_speed.is_finite() && config.hero_speed >= 0.0) {
        return Err(format!(
            "Config validation failed: hero_speed {} must be a non-negative number",
            config.hero_speed
        ));
    }
    let mut seen = Vec::new();
    for actor in &config.actors {
        if actor.id.is_empty() {
            return Err("Config validation failed: actor with empty id".to_string());
        }
        if seen.contains(&actor.id.as_str()) {
            return Err(format!(
                "Config validation failed: duplicate actor id '{}'",
                actor.id
            ));
        }
        seen.push(actor.id.as_str());
        if !(actor.size[0] > 0.0 && actor.size[1] > 0.0) {
            return Err(format!(
                "Config validation failed: actor '{}' has non-positive size",
                actor.id
            ));
        }
    }
    Ok(())
}
