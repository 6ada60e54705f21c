//! Per-actor performance state.
//!
//! Actors idle until a spell asks one to *act* (the caster's attack) or to
//! *react* (the target's hit or death). The clip player reports back through
//! [`ActorMachine::clip_complete`]; that notification is the only way out of
//! a performance.

use std::fmt;
use std::sync::Arc;

/// Stable name of an actor in the scene (`"hero"`, `"enemy1"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(Arc<str>);

impl ActorId {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActorState {
    #[default]
    Idle,
    Acting,
    Reacting,
}

/// Clip the actor should be playing, reported after every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipRequest {
    pub clip: String,
    /// Restart even if this clip is already playing.
    pub restart: bool,
}

#[derive(Debug, Clone)]
pub struct ActorMachine {
    state: ActorState,
    idle_clip: String,
    performance: Option<String>,
}

impl ActorMachine {
    pub fn new(idle_clip: &str) -> Self {
        Self {
            state: ActorState::Idle,
            idle_clip: idle_clip.to_string(),
            performance: None,
        }
    }

    pub fn state(&self) -> ActorState {
        self.state
    }

    /// Start an action of the actor's own (attack). Overrides any performance.
    pub fn act(&mut self, clip: &str) -> ClipRequest {
        self.perform(ActorState::Acting, clip)
    }

    /// Start a reaction to something done to the actor (hit, death).
    pub fn react(&mut self, clip: &str) -> ClipRequest {
        self.perform(ActorState::Reacting, clip)
    }

    fn perform(&mut self, state: ActorState, clip: &str) -> ClipRequest {
        self.state = state;
        self.performance = Some(clip.to_string());
        ClipRequest {
            clip: clip.to_string(),
            restart: true,
        }
    }

    /// The clip player finished `clip`. Returns the idle clip request when
    /// this ends the current performance; stale notifications (a clip that
    /// was already replaced) are ignored.
    pub fn clip_complete(&mut self, clip: &str) -> Option<ClipRequest> {
        if self.state == ActorState::Idle || self.performance.as_deref() != Some(clip) {
            return None;
        }
        self.state = ActorState::Idle;
        self.performance = None;
        Some(ClipRequest {
            clip: self.idle_clip.clone(),
            restart: false,
        })
    }
}
