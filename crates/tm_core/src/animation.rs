//! Actor clip animation: named frame sequences over one character sheet.
//!
//! Clips list sheet cells with per-frame durations. Timing runs on integer
//! microseconds (`u64`) so clip playback advances identically under the
//! fixed-timestep loop on every platform.
//!
//! The JSON format stores `duration_ms` for readability; on load it is
//! converted to `duration_us`.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::sprite_sheet::{frame_rect, FrameRect};

/// Grid layout of a character sheet image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    pub texture: String,
    pub columns: u32,
    pub rows: u32,
}

impl SheetLayout {
    pub fn cell_rect(&self, cell: u32) -> FrameRect {
        frame_rect(self.columns, self.rows, cell)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipFrame {
    pub cell: u32,
    pub duration_us: u64,
}

#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub frames: Vec<ClipFrame>,
    pub looping: bool,
}

/// One actor's animation definition (deserialized from JSON).
#[derive(Debug, Clone)]
pub struct ActorAnimations {
    pub actor: String,
    pub sheet: SheetLayout,
    pub idle_clip: String,
    pub clips: HashMap<String, AnimationClip>,
}

impl ActorAnimations {
    pub fn clip(&self, name: &str) -> Option<&AnimationClip> {
        self.clips.get(name)
    }
}

/// Result of one [`ClipPlayer::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipTick {
    pub cell: u32,
    /// True only on the tick a one-shot clip reached its end.
    pub just_finished: bool,
}

/// Playback state for the clip an actor is currently showing.
#[derive(Debug, Clone)]
pub struct ClipPlayer {
    pub clip_name: String,
    pub frame_index: usize,
    pub elapsed_us: u64,
    pub finished: bool,
}

impl ClipPlayer {
    pub fn new(clip_name: &str) -> Self {
        Self {
            clip_name: clip_name.to_string(),
            frame_index: 0,
            elapsed_us: 0,
            finished: false,
        }
    }

    /// Switch clips. Switching to the clip already playing is a no-op unless
    /// `restart` is set.
    pub fn play(&mut self, clip_name: &str, restart: bool) {
        if self.clip_name == clip_name && !restart {
            return;
        }
        *self = Self::new(clip_name);
    }

    /// Advance by `dt_us` microseconds and report the cell to draw.
    pub fn tick(&mut self, dt_us: u64, clip: &AnimationClip) -> ClipTick {
        let Some(last) = clip.frames.len().checked_sub(1) else {
            return ClipTick {
                cell: 0,
                just_finished: false,
            };
        };
        if self.finished {
            return ClipTick {
                cell: clip.frames[self.frame_index.min(last)].cell,
                just_finished: false,
            };
        }

        self.elapsed_us += dt_us;
        let mut just_finished = false;

        loop {
            let current = &clip.frames[self.frame_index];
            if self.elapsed_us < current.duration_us {
                break;
            }

            self.elapsed_us -= current.duration_us;
            self.frame_index += 1;

            if self.frame_index > last {
                if clip.looping {
                    self.frame_index = 0;
                } else {
                    self.frame_index = last;
                    self.elapsed_us = 0;
                    self.finished = true;
                    just_finished = true;
                    break;
                }
            }
        }

        ClipTick {
            cell: clip.frames[self.frame_index].cell,
            just_finished,
        }
    }
}

// --- JSON deserialization types (private) ---

#[derive(Debug, Deserialize)]
struct ActorAnimationsJson {
    version: String,
    actor: String,
    sheet: SheetJson,
    #[serde(default = "default_idle_clip")]
    idle: String,
    clips: HashMap<String, ClipJson>,
}

#[derive(Debug, Deserialize)]
struct SheetJson {
    texture: String,
    columns: u32,
    rows: u32,
}

#[derive(Debug, Deserialize)]
struct ClipJson {
    frames: Vec<FrameJson>,
    #[serde(default)]
    looping: bool,
}

#[derive(Debug, Deserialize)]
struct FrameJson {
    cell: u32,
    duration_ms: u64,
}

fn default_idle_clip() -> String {
    "idle".to_string()
}

/// Load an actor animation file from disk.
pub fn load_actor_animations(path: &Path) -> Result<ActorAnimations, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read animation file {}: {e}", path.display()))?;
    parse_actor_animations(&raw)
        .map_err(|e| format!("Animation file {}: {e}", path.display()))
}

pub fn parse_actor_animations(raw: &str) -> Result<ActorAnimations, String> {
    let json: ActorAnimationsJson =
        serde_json::from_str(raw).map_err(|e| format!("Failed to parse: {e}"))?;
    validate_animation_json(&json)?;

    let clips = json
        .clips
        .into_iter()
        .map(|(name, clip)| {
            let frames = clip
                .frames
                .into_iter()
                .map(|f| ClipFrame {
                    cell: f.cell,
                    duration_us: f.duration_ms * 1000,
                })
                .collect();
            (
                name,
                AnimationClip {
                    frames,
                    looping: clip.looping,
                },
            )
        })
        .collect();

    Ok(ActorAnimations {
        actor: json.actor,
        sheet: SheetLayout {
            texture: json.sheet.texture,
            columns: json.sheet.columns,
            rows: json.sheet.rows,
        },
        idle_clip: json.idle,
        clips,
    })
}

fn validate_animation_json(json: &ActorAnimationsJson) -> Result<(), String> {
    if json.version != "0.1" {
        return Err(format!(
            "Animation validation failed: unsupported version '{}'",
            json.version
        ));
    }
    if json.actor.is_empty() {
        return Err("Animation validation failed: actor is empty".to_string());
    }
    if json.sheet.texture.is_empty() {
        return Err("Animation validation failed: sheet texture is empty".to_string());
    }
    if json.sheet.columns == 0 || json.sheet.rows == 0 {
        return Err(format!(
            "Animation validation failed: sheet grid {}x{} has a zero dimension",
            json.sheet.columns, json.sheet.rows
        ));
    }
    if !json.clips.contains_key(&json.idle) {
        return Err(format!(
            "Animation validation failed: idle clip '{}' is not defined",
            json.idle
        ));
    }
    let cells = json
        .sheet
        .columns
        .checked_mul(json.sheet.rows)
        .ok_or_else(|| {
            format!(
                "Animation validation failed: sheet grid {}x{} has too many cells",
                json.sheet.columns, json.sheet.rows
            )
        })?;
    for (name, clip) in &json.clips {
        if clip.frames.is_empty() {
            return Err(format!(
                "Animation validation failed: clip '{}' has no frames",
                name
            ));
        }
        for (i, frame) in clip.frames.iter().enumerate() {
            if frame.cell >= cells {
                return Err(format!(
                    "Animation validation failed: clip '{}' frame {} uses cell {} outside the {}-cell sheet",
                    name, i, frame.cell, cells
                ));
            }
            if frame.duration_ms == 0 {
                return Err(format!(
                    "Animation validation failed: clip '{}' frame {} has zero duration",
                    name, i
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file_path(name_hint: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "tm_anim_test_{}_{}_{}.json",
            name_hint,
            std::process::id(),
            nanos
        ))
    }

    fn make_clip(durations_ms: &[u64], looping: bool) -> AnimationClip {
        AnimationClip {
            frames: durations_ms
                .iter()
                .enumerate()
                .map(|(i, &d)| ClipFrame {
                    cell: i as u32 + 10,
                    duration_us: d * 1000,
                })
                .collect(),
            looping,
        }
    }

    const HERO_JSON: &str = r#"
    {
      "version": "0.1",
      "actor": "hero",
      "sheet": { "texture": "assets/characters/hero.png", "columns": 4, "rows": 2 },
      "clips": {
        "idle": {
          "frames": [
            { "cell": 0, "duration_ms": 200 },
            { "cell": 1, "duration_ms": 200 }
          ],
          "looping": true
        },
        "attack": {
          "frames": [
            { "cell": 4, "duration_ms": 100 },
            { "cell": 5, "duration_ms": 100 }
          ]
        }
      }
    }
    "#;

    #[test]
    fn tick_advances_through_frames() {
        let clip = make_clip(&[100, 100, 100], true);
        let mut player = ClipPlayer::new("idle");

        assert_eq!(player.tick(0, &clip).cell, 10);
        assert_eq!(player.tick(50_000, &clip).cell, 10);
        // 110ms total: second frame
        assert_eq!(player.tick(60_000, &clip).cell, 11);
    }

    #[test]
    fn looping_wraps_around() {
        let clip = make_clip(&[100, 100], true);
        let mut player = ClipPlayer::new("idle");

        let tick = player.tick(250_000, &clip);
        assert_eq!(tick.cell, 10);
        assert!(!tick.just_finished);
        assert!(!player.finished);
    }

    #[test]
    fn one_shot_reports_finish_exactly_once() {
        let clip = make_clip(&[100, 100], false);
        let mut player = ClipPlayer::new("attack");

        let tick = player.tick(300_000, &clip);
        assert_eq!(tick.cell, 11);
        assert!(tick.just_finished);

        let tick = player.tick(100_000, &clip);
        assert_eq!(tick.cell, 11);
        assert!(!tick.just_finished);
        assert!(player.finished);
    }

    #[test]
    fn variable_frame_durations() {
        let clip = make_clip(&[50, 200, 100], true);
        let mut player = ClipPlayer::new("cast");

        assert_eq!(player.tick(50_000, &clip).cell, 11);
        assert_eq!(player.tick(150_000, &clip).cell, 11);
        assert_eq!(player.tick(50_000, &clip).cell, 12);
    }

    #[test]
    fn play_same_clip_without_restart_keeps_position() {
        let clip = make_clip(&[100, 100], true);
        let mut player = ClipPlayer::new("idle");
        player.tick(150_000, &clip);
        player.play("idle", false);
        assert_eq!(player.frame_index, 1);
        player.play("idle", true);
        assert_eq!(player.frame_index, 0);
        assert_eq!(player.elapsed_us, 0);
    }

    #[test]
    fn empty_clip_is_harmless() {
        let clip = AnimationClip {
            frames: Vec::new(),
            looping: false,
        };
        let mut player = ClipPlayer::new("none");
        assert_eq!(
            player.tick(1_000, &clip),
            ClipTick {
                cell: 0,
                just_finished: false
            }
        );
    }

    #[test]
    fn parses_actor_file() {
        let anims = parse_actor_animations(HERO_JSON).expect("should parse");
        assert_eq!(anims.actor, "hero");
        assert_eq!(anims.idle_clip, "idle");
        assert_eq!((anims.sheet.columns, anims.sheet.rows), (4, 2));
        let idle = anims.clip("idle").expect("idle");
        assert!(idle.looping);
        assert_eq!(idle.frames[1].duration_us, 200_000);
        let attack = anims.clip("attack").expect("attack");
        assert!(!attack.looping);
        let attack_us: u64 = attack.frames.iter().map(|f| f.duration_us).sum();
        assert_eq!(attack_us, 200_000);
    }

    #[test]
    fn sheet_cells_map_to_grid_rects() {
        let anims = parse_actor_animations(HERO_JSON).expect("should parse");
        // Cell 5 on a 4x2 sheet: column 1 of the bottom row.
        let rect = anims.sheet.cell_rect(5);
        assert!((rect.repeat_u - 0.25).abs() < 0.01);
        assert!((rect.repeat_v - 0.5).abs() < 0.01);
        assert!((rect.offset_u - 0.25).abs() < 0.01);
        assert!(rect.offset_v < 0.01);
    }

    #[test]
    fn load_reads_from_disk() {
        let path = temp_file_path("valid");
        fs::write(&path, HERO_JSON).expect("write temp file");
        let anims = load_actor_animations(&path).expect("should load");
        assert_eq!(anims.clips.len(), 2);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn rejects_bad_version() {
        let raw = HERO_JSON.replace("\"0.1\"", "\"9.9\"");
        let err = parse_actor_animations(&raw).expect_err("bad version should fail");
        assert!(err.contains("unsupported version"));
    }

    #[test]
    fn rejects_zero_duration() {
        let raw = HERO_JSON.replace("\"duration_ms\": 100", "\"duration_ms\": 0");
        let err = parse_actor_animations(&raw).expect_err("zero duration should fail");
        assert!(err.contains("zero duration"));
    }

    #[test]
    fn rejects_cell_outside_sheet() {
        let raw = HERO_JSON.replace("\"cell\": 5", "\"cell\": 8");
        let err = parse_actor_animations(&raw).expect_err("cell out of range");
        assert!(err.contains("outside"));
    }

    #[test]
    fn rejects_grid_too_large_to_index() {
        let raw = HERO_JSON
            .replace("\"columns\": 4", "\"columns\": 100000")
            .replace("\"rows\": 2", "\"rows\": 100000");
        let err = parse_actor_animations(&raw).expect_err("overflowing grid");
        assert!(err.contains("too many cells"), "{err}");
    }

    #[test]
    fn rejects_missing_idle_clip() {
        let raw = HERO_JSON.replace("\"idle\": {", "\"rest\": {");
        let err = parse_actor_animations(&raw).expect_err("no idle clip");
        assert!(err.contains("idle clip"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_actor_animations(Path::new("/nonexistent/tm_hero.json"))
            .expect_err("missing");
        assert!(err.contains("tm_hero.json"));
    }
}
