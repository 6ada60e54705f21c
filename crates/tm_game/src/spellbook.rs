//! Spellbook files: JSON spell definitions turned into a [`SpellRegistry`].
//!
//! A spell names its trigger key, an optional effect and its cast routine.
//! Each routine entry carries an `action` tag plus the fields that action
//! needs; `delay_ms` defaults to 0 (run inside the cast).

use serde::Deserialize;
use std::fs;
use std::path::Path;

use glam::{Vec2, Vec3};
use tm_core::character::ActorId;
use tm_core::effect::{Anchor, Effect, EffectConfig, Facing, Follow, FrameSource, ScreenAnchor};
use tm_core::error::SpellError;
use tm_core::input::{Key, Trigger};
use tm_core::registry::SpellRegistry;
use tm_core::spell::{
    CastStep, Cue, EffectCommand, RecastPolicy, SoundCue, Spell, SpellAction, SpellDef,
};
use tm_core::sprite_sheet::SpriteSheetConfig;

/// Shipped spellbook, used when the configured file cannot be loaded.
pub const DEFAULT_SPELLBOOK: &str = include_str!("../../../assets/spells/spellbook.json");

#[derive(Debug, Clone, Deserialize)]
pub struct SpellbookFile {
    pub version: String,
    pub spells: Vec<SpellJson>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpellJson {
    pub name: String,
    pub trigger: String,
    #[serde(default)]
    pub effect: Option<EffectJson>,
    #[serde(default)]
    pub steps: Vec<StepJson>,
    #[serde(default)]
    pub on_finish: Vec<ActionJson>,
    #[serde(default)]
    pub recast: RecastJson,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecastJson {
    #[default]
    Overlap,
    CancelPending,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EffectJson {
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default)]
    pub frames: Option<Vec<String>>,
    #[serde(default)]
    pub sequence: Option<SequenceJson>,
    #[serde(default = "default_grid_dim")]
    pub columns: u32,
    #[serde(default = "default_grid_dim")]
    pub rows: u32,
    #[serde(default)]
    pub total_frames: Option<u32>,
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    #[serde(default)]
    pub looping: bool,
    #[serde(default = "default_effect_size")]
    pub size: [f32; 2],
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default)]
    pub facing: FacingJson,
    #[serde(default)]
    pub anchor: Option<AnchorJson>,
    #[serde(default)]
    pub follow: Option<FollowJson>,
}

/// Numbered image files: `pattern` with `{}` replaced by `first..first+count`.
#[derive(Debug, Clone, Deserialize)]
pub struct SequenceJson {
    pub pattern: String,
    #[serde(default = "default_sequence_first")]
    pub first: u32,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FacingJson {
    #[default]
    Static,
    FaceCamera,
    None,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AnchorJson {
    pub top: f32,
    pub height_fraction: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FollowJson {
    pub actor: String,
    #[serde(default)]
    pub offset: [f32; 3],
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepJson {
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(flatten)]
    pub action: ActionJson,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionJson {
    StartEffect,
    StopEffect,
    ToggleEffect,
    Flash {
        actor: String,
        duration_ms: u64,
    },
    Act {
        actor: String,
        clip: String,
    },
    React {
        actor: String,
        clip: String,
    },
    Sound {
        path: String,
        #[serde(default = "default_volume")]
        volume: f32,
        #[serde(default)]
        start_offset_ms: u64,
        #[serde(default)]
        duration_ms: Option<u64>,
    },
    Tint {
        color: [f32; 3],
    },
}

const fn default_grid_dim() -> u32 {
    1
}

const fn default_frame_interval_ms() -> u64 {
    SpriteSheetConfig::DEFAULT_FRAME_INTERVAL_MS
}

const fn default_effect_size() -> [f32; 2] {
    [1.0, 1.0]
}

const fn default_sequence_first() -> u32 {
    1
}

const fn default_volume() -> f32 {
    1.0
}

pub fn load_spellbook(path: &Path) -> Result<SpellbookFile, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read spellbook {}: {e}", path.display()))?;
    parse_spellbook(&raw).map_err(|e| format!("Spellbook {}: {e}", path.display()))
}

pub fn parse_spellbook(raw: &str) -> Result<SpellbookFile, String> {
    let book: SpellbookFile =
        serde_json::from_str(raw).map_err(|e| format!("Failed to parse spellbook JSON: {e}"))?;
    validate_spellbook(&book)?;
    Ok(book)
}

fn validate_spellbook(book: &SpellbookFile) -> Result<(), String> {
    if book.version != "0.1" {
        return Err(format!(
            "Spellbook validation failed: unsupported version '{}'",
            book.version
        ));
    }
    for spell in &book.spells {
        let Some(trigger) = Trigger::parse(&spell.trigger) else {
            return Err(format!(
                "Spellbook validation failed: spell '{}' trigger '{}' must be a single character",
                spell.name, spell.trigger
            ));
        };
        if Key::for_trigger(trigger).is_none() {
            return Err(format!(
                "Spellbook validation failed: spell '{}' trigger '{}' is not a spell key (expected one of {})",
                spell.name,
                spell.trigger,
                spell_key_list()
            ));
        }
        for step in &spell.steps {
            validate_action(&spell.name, &step.action)?;
        }
        for action in &spell.on_finish {
            validate_action(&spell.name, action)?;
        }
    }
    Ok(())
}

fn spell_key_list() -> String {
    Key::SPELL_KEYS
        .iter()
        .filter_map(|key| key.trigger())
        .map(|trigger| trigger.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn validate_action(spell: &str, action: &ActionJson) -> Result<(), String> {
    match action {
        ActionJson::Sound { volume, path, .. } => {
            if !(0.0..=1.0).contains(volume) {
                return Err(format!(
                    "Spellbook validation failed: spell '{spell}' sound '{path}' volume {volume} is outside 0..1"
                ));
            }
        }
        ActionJson::Tint { color } => {
            if color.iter().any(|c| !c.is_finite() || *c < 0.0) {
                return Err(format!(
                    "Spellbook validation failed: spell '{spell}' tint {color:?} has negative components"
                ));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Build every spell and register it. Actor references must name one of
/// `known_actors`.
pub fn build_registry(
    book: &SpellbookFile,
    known_actors: &[ActorId],
) -> Result<SpellRegistry, String> {
    let mut registry = SpellRegistry::new();
    for spell_json in &book.spells {
        let spell = build_spell(spell_json)
            .map_err(|e| format!("Spell '{}': {e}", spell_json.name))?;
        if let Some(actor) = spell
            .referenced_actors()
            .into_iter()
            .find(|actor| !known_actors.contains(actor))
        {
            return Err(SpellError::UnknownActor {
                spell: spell.name().to_string(),
                actor: actor.to_string(),
            }
            .to_string());
        }
        registry.register(spell).map_err(|e| e.to_string())?;
    }
    Ok(registry)
}

pub fn build_spell(json: &SpellJson) -> Result<Spell, SpellError> {
    let trigger = Trigger::parse(&json.trigger).ok_or_else(|| {
        SpellError::InvalidConfig(format!("trigger '{}' is not a single character", json.trigger))
    })?;
    let effect = json.effect.as_ref().map(build_effect).transpose()?;
    let def = SpellDef {
        name: json.name.clone(),
        trigger,
        steps: json
            .steps
            .iter()
            .map(|step| CastStep::after(step.delay_ms, convert_action(&step.action)))
            .collect(),
        on_finish: json.on_finish.iter().map(convert_action).collect(),
        recast: match json.recast {
            RecastJson::Overlap => RecastPolicy::Overlap,
            RecastJson::CancelPending => RecastPolicy::CancelPending,
        },
    };
    Spell::new(def, effect)
}

fn build_effect(json: &EffectJson) -> Result<Effect, SpellError> {
    let (source, columns, rows, implied_total) =
        match (&json.sheet, &json.frames, &json.sequence) {
            (Some(sheet), None, None) => (
                FrameSource::Sheet(sheet.clone()),
                json.columns,
                json.rows,
                json.columns.saturating_mul(json.rows),
            ),
            (None, Some(frames), None) => {
                let count = frames.len() as u32;
                (FrameSource::Sequence(frames.clone()), count, 1, count)
            }
            (None, None, Some(sequence)) => {
                if !sequence.pattern.contains("{}") {
                    return Err(SpellError::InvalidConfig(format!(
                        "sequence pattern '{}' has no '{{}}' placeholder",
                        sequence.pattern
                    )));
                }
                let frames = (sequence.first..sequence.first.saturating_add(sequence.count))
                    .map(|i| sequence.pattern.replace("{}", &i.to_string()))
                    .collect();
                (FrameSource::Sequence(frames), sequence.count, 1, sequence.count)
            }
            _ => {
                return Err(SpellError::InvalidConfig(
                    "effect needs exactly one of 'sheet', 'frames' or 'sequence'".to_string(),
                ))
            }
        };

    let total = json.total_frames.unwrap_or(implied_total);
    let mut animation =
        SpriteSheetConfig::configure(columns, rows, total, json.frame_interval_ms)?;
    if json.looping {
        animation = animation.looping();
    }

    Effect::new(EffectConfig {
        source,
        animation,
        size: Vec2::from_array(json.size),
        position: Vec3::from_array(json.position),
        facing: match json.facing {
            FacingJson::Static => Facing::Static,
            FacingJson::FaceCamera => Facing::FaceCamera,
            FacingJson::None => Facing::None,
        },
        anchor: json.anchor.map_or(Anchor::World, |anchor| {
            Anchor::Screen(ScreenAnchor {
                top: anchor.top,
                height_fraction: anchor.height_fraction,
            })
        }),
        follow: json.follow.as_ref().map(|follow| Follow {
            target: ActorId::new(&follow.actor),
            offset: Vec3::from_array(follow.offset),
        }),
    })
}

fn convert_action(action: &ActionJson) -> SpellAction {
    match action {
        ActionJson::StartEffect => SpellAction::Effect(EffectCommand::Start),
        ActionJson::StopEffect => SpellAction::Effect(EffectCommand::Stop),
        ActionJson::ToggleEffect => SpellAction::Effect(EffectCommand::Toggle),
        ActionJson::Flash { actor, duration_ms } => SpellAction::Cue(Cue::Flash {
            actor: ActorId::new(actor),
            duration_ms: *duration_ms,
        }),
        ActionJson::Act { actor, clip } => SpellAction::Cue(Cue::Act {
            actor: ActorId::new(actor),
            clip: clip.clone(),
        }),
        ActionJson::React { actor, clip } => SpellAction::Cue(Cue::React {
            actor: ActorId::new(actor),
            clip: clip.clone(),
        }),
        ActionJson::Sound {
            path,
            volume,
            start_offset_ms,
            duration_ms,
        } => SpellAction::Cue(Cue::Sound(SoundCue {
            path: path.clone(),
            volume: *volume,
            start_offset_ms: *start_offset_ms,
            duration_ms: *duration_ms,
        })),
        ActionJson::Tint { color } => SpellAction::Cue(Cue::Tint { color: *color }),
    }
}
