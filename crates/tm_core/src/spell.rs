//! Spells: a trigger, a timed cast routine and an optional visual effect.
//!
//! A cast routine is a list of [`CastStep`]s, each an action with a delay
//! relative to the moment of casting. Zero-delay steps run inside
//! [`Spell::cast`]; the rest sit in the spell's own [`Schedule`] and fire from
//! [`Spell::update`]. Effect commands act on the spell's effect directly;
//! every other action is a [`Cue`] handed to the host (flashes, character
//! clips, sounds, background tint).

use crate::character::ActorId;
use crate::effect::{Effect, EffectContext, Readiness};
use crate::error::SpellError;
use crate::input::Trigger;
use crate::schedule::Schedule;
use crate::sprite_sheet::FrameEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectCommand {
    Start,
    Stop,
    Toggle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SoundCue {
    pub path: String,
    pub volume: f32,
    /// Skip this far into the clip before playing.
    pub start_offset_ms: u64,
    /// Cut the sound off after this long.
    pub duration_ms: Option<u64>,
}

/// Side effects the host carries out on behalf of a spell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cue {
    /// Render the actor solid white for a while.
    Flash { actor: ActorId, duration_ms: u64 },
    /// Play one of the actor's own action clips.
    Act { actor: ActorId, clip: String },
    /// Play a reaction clip on the actor.
    React { actor: ActorId, clip: String },
    Sound(SoundCue),
    /// Multiply the background by this colour.
    Tint { color: [f32; 3] },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpellAction {
    Effect(EffectCommand),
    Cue(Cue),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CastStep {
    pub delay_ms: u64,
    pub action: SpellAction,
}

impl CastStep {
    pub fn now(action: SpellAction) -> Self {
        Self {
            delay_ms: 0,
            action,
        }
    }

    pub fn after(delay_ms: u64, action: SpellAction) -> Self {
        Self { delay_ms, action }
    }
}

/// What happens to steps still pending from an earlier cast when the spell
/// is cast again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecastPolicy {
    /// Earlier steps still fire; each cast runs its full routine.
    #[default]
    Overlap,
    /// Earlier steps are dropped before the new routine is scheduled.
    CancelPending,
}

impl RecastPolicy {
    pub fn label(self) -> &'static str {
        match self {
            Self::Overlap => "overlap",
            Self::CancelPending => "cancel",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpellDef {
    pub name: String,
    pub trigger: Trigger,
    pub steps: Vec<CastStep>,
    /// Runs when the spell's one-shot effect shows its last frame.
    pub on_finish: Vec<SpellAction>,
    pub recast: RecastPolicy,
}

/// A cue tagged with the spell that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct SpellCue {
    pub spell: String,
    pub cue: Cue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpellStatus {
    /// Textures for the effect are still loading.
    Loading,
    /// The effect failed to load; casting still runs the non-visual steps.
    Degraded,
    Ready,
    /// Effect visible or steps pending.
    Active,
}

impl SpellStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Degraded => "degraded",
            Self::Ready => "ready",
            Self::Active => "active",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Spell {
    def: SpellDef,
    effect: Option<Effect>,
    pending: Schedule<SpellAction>,
    casts: u64,
}

impl Spell {
    pub fn new(def: SpellDef, effect: Option<Effect>) -> Result<Self, SpellError> {
        if def.name.trim().is_empty() {
            return Err(SpellError::InvalidConfig(format!(
                "spell on trigger '{}' has an empty name",
                def.trigger
            )));
        }
        let uses_effect = def
            .steps
            .iter()
            .map(|step| &step.action)
            .chain(def.on_finish.iter())
            .any(|action| matches!(action, SpellAction::Effect(_)));
        if uses_effect && effect.is_none() {
            return Err(SpellError::MissingEffect {
                spell: def.name.clone(),
            });
        }
        Ok(Self {
            def,
            effect,
            pending: Schedule::new(),
            casts: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn trigger(&self) -> Trigger {
        self.def.trigger
    }

    pub fn recast_policy(&self) -> RecastPolicy {
        self.def.recast
    }

    pub fn effect(&self) -> Option<&Effect> {
        self.effect.as_ref()
    }

    pub fn effect_mut(&mut self) -> Option<&mut Effect> {
        self.effect.as_mut()
    }

    pub fn pending_steps(&self) -> usize {
        self.pending.pending()
    }

    pub fn cast_count(&self) -> u64 {
        self.casts
    }

    /// Every actor the routine or the effect refers to, in first-use order.
    pub fn referenced_actors(&self) -> Vec<&ActorId> {
        let mut actors: Vec<&ActorId> = Vec::new();
        let actions = self
            .def
            .steps
            .iter()
            .map(|step| &step.action)
            .chain(self.def.on_finish.iter());
        let from_cues = actions.filter_map(|action| match action {
            SpellAction::Cue(Cue::Flash { actor, .. })
            | SpellAction::Cue(Cue::Act { actor, .. })
            | SpellAction::Cue(Cue::React { actor, .. }) => Some(actor),
            _ => None,
        });
        let from_effect = self.effect.as_ref().and_then(Effect::follow_target);
        for actor in from_cues.chain(from_effect) {
            if !actors.contains(&actor) {
                actors.push(actor);
            }
        }
        actors
    }

    pub fn status(&self) -> SpellStatus {
        let effect_visible = self.effect.as_ref().is_some_and(Effect::is_visible);
        if effect_visible || !self.pending.is_empty() {
            return SpellStatus::Active;
        }
        match self.effect.as_ref().map(Effect::readiness) {
            Some(Readiness::Pending) => SpellStatus::Loading,
            Some(Readiness::Failed) => SpellStatus::Degraded,
            Some(Readiness::Ready) | None => SpellStatus::Ready,
        }
    }

    /// Run the cast routine: immediate steps now, delayed steps scheduled.
    pub fn cast(&mut self, now_ms: u64, out: &mut Vec<SpellCue>) {
        self.casts += 1;
        if self.def.recast == RecastPolicy::CancelPending {
            let dropped = self.pending.cancel_all();
            if dropped > 0 {
                log::debug!(
                    "Spell '{}' recast: cancelled {} pending steps",
                    self.def.name,
                    dropped
                );
            }
        }
        log::info!("Casting '{}' ({})", self.def.name, self.def.trigger);

        let steps = self.def.steps.clone();
        for step in steps {
            if step.delay_ms == 0 {
                self.apply(step.action, out);
            } else {
                self.pending.schedule(now_ms, step.delay_ms, step.action);
            }
        }
    }

    /// Fire due steps, then advance the effect.
    pub fn update(&mut self, ctx: &EffectContext<'_>, out: &mut Vec<SpellCue>) {
        for action in self.pending.drain_due(ctx.now_ms) {
            self.apply(action, out);
        }

        let Some(effect) = self.effect.as_mut() else {
            return;
        };
        if let Some(FrameEvent::Finished(_)) = effect.update(ctx) {
            log::debug!("Spell '{}' effect finished", self.def.name);
            let finish = self.def.on_finish.clone();
            for action in finish {
                self.apply(action, out);
            }
        }
    }

    fn apply(&mut self, action: SpellAction, out: &mut Vec<SpellCue>) {
        match action {
            SpellAction::Effect(command) => {
                let Some(effect) = self.effect.as_mut() else {
                    return;
                };
                match command {
                    EffectCommand::Start => {
                        if !effect.start() {
                            log::debug!(
                                "Spell '{}': effect not ready, visual skipped",
                                self.def.name
                            );
                        }
                    }
                    EffectCommand::Stop => effect.stop(),
                    EffectCommand::Toggle => {
                        let visible = effect.toggle();
                        log::debug!("Spell '{}' effect toggled -> {}", self.def.name, visible);
                    }
                }
            }
            SpellAction::Cue(cue) => out.push(SpellCue {
                spell: self.def.name.clone(),
                cue,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{Anchor, EffectConfig, Facing, FrameSource, ViewPose};
    use crate::sprite_sheet::SpriteSheetConfig;
    use glam::{Vec2, Vec3};
    use std::collections::HashMap;

    const SHEET: &str = "assets/fx/lightning.png";

    fn enemy() -> ActorId {
        ActorId::new("enemy1")
    }

    fn flash(duration_ms: u64) -> SpellAction {
        SpellAction::Cue(Cue::Flash {
            actor: enemy(),
            duration_ms,
        })
    }

    fn effect(columns: u32, rows: u32, total: u32, loaded: bool) -> Effect {
        let mut effect = Effect::new(EffectConfig {
            source: FrameSource::Sheet(SHEET.to_string()),
            animation: SpriteSheetConfig::configure(columns, rows, total, 50).expect("valid"),
            size: Vec2::new(15.0, 30.0),
            position: Vec3::ZERO,
            facing: Facing::Static,
            anchor: Anchor::World,
            follow: None,
        })
        .expect("valid effect");
        if loaded {
            effect.texture_loaded(SHEET, 512, 512);
        }
        effect
    }

    fn def(steps: Vec<CastStep>) -> SpellDef {
        SpellDef {
            name: "Electric Shock".to_string(),
            trigger: Trigger::new('w'),
            steps,
            on_finish: Vec::new(),
            recast: RecastPolicy::Overlap,
        }
    }

    fn update(spell: &mut Spell, now_ms: u64) -> Vec<SpellCue> {
        let view = ViewPose::default();
        let targets: HashMap<ActorId, Vec3> = HashMap::new();
        let mut out = Vec::new();
        spell.update(
            &EffectContext {
                now_ms,
                view: &view,
                targets: &targets,
            },
            &mut out,
        );
        out
    }

    #[test]
    fn effect_commands_require_an_effect() {
        let err = Spell::new(
            def(vec![CastStep::now(SpellAction::Effect(EffectCommand::Start))]),
            None,
        )
        .expect_err("missing effect");
        assert!(matches!(err, SpellError::MissingEffect { .. }));
    }

    #[test]
    fn empty_name_is_invalid() {
        let mut d = def(Vec::new());
        d.name = "  ".to_string();
        assert!(matches!(Spell::new(d, None), Err(SpellError::InvalidConfig(_))));
    }

    #[test]
    fn immediate_steps_run_inside_cast() {
        let mut spell = Spell::new(
            def(vec![
                CastStep::now(SpellAction::Effect(EffectCommand::Start)),
                CastStep::now(flash(200)),
            ]),
            Some(effect(4, 4, 16, true)),
        )
        .expect("valid");

        let mut out = Vec::new();
        spell.cast(0, &mut out);
        assert!(spell.effect().expect("effect").is_visible());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].spell, "Electric Shock");
        assert_eq!(spell.pending_steps(), 0);
        assert_eq!(spell.cast_count(), 1);
    }

    #[test]
    fn delayed_steps_keep_their_relative_offsets() {
        let mut spell = Spell::new(
            def(vec![
                CastStep::after(100, flash(200)),
                CastStep::after(400, flash(200)),
            ]),
            None,
        )
        .expect("valid");

        let mut out = Vec::new();
        spell.cast(1_000, &mut out);
        assert!(out.is_empty());
        assert_eq!(spell.status(), SpellStatus::Active);

        assert!(update(&mut spell, 1_099).is_empty());
        assert_eq!(update(&mut spell, 1_100).len(), 1);
        assert!(update(&mut spell, 1_399).is_empty());
        assert_eq!(update(&mut spell, 1_400).len(), 1);
        assert_eq!(spell.status(), SpellStatus::Ready);
    }

    #[test]
    fn delayed_start_shows_first_frame_in_same_tick() {
        let mut spell = Spell::new(
            def(vec![CastStep::after(
                1_000,
                SpellAction::Effect(EffectCommand::Start),
            )]),
            Some(effect(6, 5, 30, true)),
        )
        .expect("valid");
        spell.cast(0, &mut Vec::new());
        update(&mut spell, 999);
        assert!(!spell.effect().expect("effect").is_visible());
        update(&mut spell, 1_000);
        let effect = spell.effect().expect("effect");
        assert!(effect.is_visible());
        assert_eq!(effect.current_frame(), 0);
    }

    #[test]
    fn finish_actions_fire_once_when_effect_completes() {
        let mut d = def(vec![CastStep::now(SpellAction::Effect(EffectCommand::Start))]);
        d.on_finish = vec![SpellAction::Cue(Cue::Tint {
            color: [1.0, 1.0, 1.0],
        })];
        let mut spell = Spell::new(d, Some(effect(2, 2, 4, true))).expect("valid");
        spell.cast(0, &mut Vec::new());

        let mut cues = Vec::new();
        for i in 0..10u64 {
            cues.extend(update(&mut spell, i * 50));
        }
        assert_eq!(cues.len(), 1);
        assert!(matches!(cues[0].cue, Cue::Tint { .. }));
        assert!(!spell.effect().expect("effect").is_visible());
    }

    #[test]
    fn cast_with_unloaded_effect_still_emits_cues() {
        let mut spell = Spell::new(
            def(vec![
                CastStep::now(SpellAction::Effect(EffectCommand::Start)),
                CastStep::now(flash(300)),
            ]),
            Some(effect(3, 3, 9, false)),
        )
        .expect("valid");
        assert_eq!(spell.status(), SpellStatus::Loading);

        let mut out = Vec::new();
        spell.cast(0, &mut out);
        assert_eq!(out.len(), 1);
        assert!(!spell.effect().expect("effect").is_visible());
    }

    #[test]
    fn failed_effect_reports_degraded() {
        let mut fx = effect(3, 3, 9, false);
        fx.texture_failed(SHEET);
        let spell = Spell::new(
            def(vec![CastStep::now(SpellAction::Effect(EffectCommand::Start))]),
            Some(fx),
        )
        .expect("valid");
        assert_eq!(spell.status(), SpellStatus::Degraded);
    }

    #[test]
    fn referenced_actors_are_deduplicated() {
        let mut d = def(vec![
            CastStep::now(SpellAction::Cue(Cue::Act {
                actor: ActorId::new("hero"),
                clip: "attack".to_string(),
            })),
            CastStep::after(100, flash(200)),
        ]);
        d.on_finish = vec![flash(100)];
        let spell = Spell::new(d, None).expect("valid");
        let names: Vec<&str> = spell.referenced_actors().iter().map(|a| a.as_str()).collect();
        assert_eq!(names, vec!["hero", "enemy1"]);
    }

    #[test]
    fn overlap_policy_keeps_earlier_pending_steps() {
        let mut spell =
            Spell::new(def(vec![CastStep::after(300, flash(100))]), None).expect("valid");
        spell.cast(0, &mut Vec::new());
        spell.cast(100, &mut Vec::new());
        assert_eq!(spell.pending_steps(), 2);
        assert_eq!(update(&mut spell, 300).len(), 1);
        assert_eq!(update(&mut spell, 400).len(), 1);
    }

    #[test]
    fn cancel_pending_policy_drops_earlier_steps() {
        let mut d = def(vec![CastStep::after(300, flash(100))]);
        d.recast = RecastPolicy::CancelPending;
        let mut spell = Spell::new(d, None).expect("valid");
        spell.cast(0, &mut Vec::new());
        spell.cast(100, &mut Vec::new());
        assert_eq!(spell.pending_steps(), 1);
        assert!(update(&mut spell, 300).is_empty());
        assert_eq!(update(&mut spell, 400).len(), 1);
    }

    #[test]
    fn recast_restarts_effect_instead_of_stacking() {
        let mut spell = Spell::new(
            def(vec![CastStep::now(SpellAction::Effect(EffectCommand::Start))]),
            Some(effect(3, 3, 9, true)),
        )
        .expect("valid");
        spell.cast(0, &mut Vec::new());
        update(&mut spell, 0);
        update(&mut spell, 50);
        assert_eq!(spell.effect().expect("effect").current_frame(), 1);

        spell.cast(60, &mut Vec::new());
        assert_eq!(spell.effect().expect("effect").current_frame(), 0);
        assert!(spell.effect().expect("effect").is_visible());
    }

    #[test]
    fn toggle_command_flips_looping_effect() {
        let mut fx = effect(2, 2, 4, false);
        fx.texture_loaded(SHEET, 64, 64);
        let mut spell = Spell::new(
            def(vec![CastStep::now(SpellAction::Effect(EffectCommand::Toggle))]),
            Some(fx),
        )
        .expect("valid");
        spell.cast(0, &mut Vec::new());
        assert!(spell.effect().expect("effect").is_visible());
        spell.cast(10, &mut Vec::new());
        assert!(!spell.effect().expect("effect").is_visible());
    }
}
