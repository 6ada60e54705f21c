//! Error types shared by the effect and spell subsystems.

use crate::input::Trigger;

/// Construction- and registration-time failures. These indicate authoring
/// bugs and are returned to the caller; runtime resource problems are never
/// surfaced through this type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpellError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("trigger '{trigger}' is already bound to spell '{existing}'")]
    DuplicateTrigger { trigger: Trigger, existing: String },
    #[error("spell '{spell}' uses effect commands but has no effect")]
    MissingEffect { spell: String },
    #[error("spell '{spell}' refers to unknown actor '{actor}'")]
    UnknownActor { spell: String, actor: String },
}

/// A texture that could not be decoded or read. Effects that depend on it
/// become permanently inert.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to load '{path}': {reason}")]
pub struct LoadFailure {
    pub path: String,
    pub reason: String,
}
