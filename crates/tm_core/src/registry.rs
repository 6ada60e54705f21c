//! Trigger-to-spell dispatch.

use std::collections::HashMap;

use crate::effect::{EffectContext, EffectQuad};
use crate::error::SpellError;
use crate::input::Trigger;
use crate::spell::{Spell, SpellCue};

/// Owns every spell in the scene. Each trigger maps to at most one spell;
/// updates run in registration order.
#[derive(Debug, Default)]
pub struct SpellRegistry {
    spells: Vec<Spell>,
    by_trigger: HashMap<Trigger, usize>,
}

impl SpellRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spell: Spell) -> Result<(), SpellError> {
        let trigger = spell.trigger();
        if let Some(&index) = self.by_trigger.get(&trigger) {
            return Err(SpellError::DuplicateTrigger {
                trigger,
                existing: self.spells[index].name().to_string(),
            });
        }
        log::info!("Registered spell '{}' on '{}'", spell.name(), trigger);
        self.by_trigger.insert(trigger, self.spells.len());
        self.spells.push(spell);
        Ok(())
    }

    /// Cast the spell bound to `trigger`. Returns false when nothing is bound.
    pub fn cast_by_trigger(
        &mut self,
        trigger: Trigger,
        now_ms: u64,
        out: &mut Vec<SpellCue>,
    ) -> bool {
        let Some(&index) = self.by_trigger.get(&trigger) else {
            log::trace!("No spell bound to '{}'", trigger);
            return false;
        };
        self.spells[index].cast(now_ms, out);
        true
    }

    /// Cast by name, for tooling that lists spells rather than keys.
    pub fn cast_by_name(&mut self, name: &str, now_ms: u64, out: &mut Vec<SpellCue>) -> bool {
        match self.spells.iter_mut().find(|spell| spell.name() == name) {
            Some(spell) => {
                spell.cast(now_ms, out);
                true
            }
            None => false,
        }
    }

    pub fn update(&mut self, ctx: &EffectContext<'_>, out: &mut Vec<SpellCue>) {
        for spell in &mut self.spells {
            spell.update(ctx, out);
        }
    }

    /// Every distinct texture path some effect is still waiting on.
    pub fn pending_textures(&self) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        for effect in self.spells.iter().filter_map(Spell::effect) {
            for path in effect.pending_textures() {
                if !paths.iter().any(|p| p == path) {
                    paths.push(path.to_string());
                }
            }
        }
        paths
    }

    /// Forward a loaded texture to every effect that uses it.
    pub fn texture_loaded(&mut self, path: &str, width: u32, height: u32) -> usize {
        self.spells
            .iter_mut()
            .filter_map(Spell::effect_mut)
            .map(|effect| effect.texture_loaded(path, width, height))
            .filter(|claimed| *claimed)
            .count()
    }

    pub fn texture_failed(&mut self, path: &str) -> usize {
        let mut claimed = 0;
        for spell in &mut self.spells {
            let name = spell.name().to_string();
            if let Some(effect) = spell.effect_mut() {
                if effect.texture_failed(path) {
                    log::warn!("Spell '{}' loses its visual: '{}' failed to load", name, path);
                    claimed += 1;
                }
            }
        }
        claimed
    }

    pub fn viewport_changed(&mut self) {
        for effect in self.spells.iter_mut().filter_map(Spell::effect_mut) {
            effect.viewport_changed();
        }
    }

    /// Quads for every visible effect, in registration order.
    pub fn quads(&self) -> Vec<EffectQuad<'_>> {
        self.spells
            .iter()
            .filter_map(Spell::effect)
            .filter_map(|effect| effect.quad())
            .collect()
    }

    pub fn spells(&self) -> &[Spell] {
        &self.spells
    }

    pub fn get(&self, trigger: Trigger) -> Option<&Spell> {
        self.by_trigger.get(&trigger).map(|&index| &self.spells[index])
    }

    pub fn len(&self) -> usize {
        self.spells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spells.is_empty()
    }
}
