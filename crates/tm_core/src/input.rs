//! Input state tracking with both edge-triggered and level-triggered queries.
//!
//! - **Level-triggered (held):** `is_held(key)` returns true every frame the key
//!   is physically down. Used for hero movement and camera dragging.
//!
//! - **Edge-triggered (just_pressed / just_released):** These are true only during
//!   the frame the transition happened. They are cleared by `end_frame()`, which
//!   the main loop calls only after at least one fixed simulation step has consumed
//!   them, so a spell key pressed on a zero-step frame still casts. Paused frames
//!   clear them without stepping. Host keys (Escape, F3, Home, F5) are taken with
//!   `take_just_pressed()` once per frame, outside the step loop.
//!
//! Spell keys are exposed as [`Trigger`] symbols, the currency of the spell
//! registry. The registry never sees `Key` directly.

use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
    Escape,
    Home,
    F3,
    F5,
    Q,
    W,
    E,
    R,
    D,
}

impl Key {
    /// Keys that can cast spells.
    pub const SPELL_KEYS: &'static [Key] = &[Key::Q, Key::W, Key::E, Key::R, Key::D];

    /// The trigger symbol a key dispatches, if it is a spell key.
    pub fn trigger(self) -> Option<Trigger> {
        match self {
            Key::Q => Some(Trigger::new('q')),
            Key::W => Some(Trigger::new('w')),
            Key::E => Some(Trigger::new('e')),
            Key::R => Some(Trigger::new('r')),
            Key::D => Some(Trigger::new('d')),
            _ => None,
        }
    }

    /// The spell key that dispatches `trigger`, if any key does.
    pub fn for_trigger(trigger: Trigger) -> Option<Key> {
        Key::SPELL_KEYS
            .iter()
            .copied()
            .find(|key| key.trigger() == Some(trigger))
    }
}

/// An input symbol a spell is bound to. Letters are case-folded so `'Q'`
/// and `'q'` are the same trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Trigger(char);

impl Trigger {
    pub fn new(symbol: char) -> Self {
        Self(symbol.to_ascii_lowercase())
    }

    pub fn symbol(self) -> char {
        self.0
    }

    /// Parse a single-character trigger such as `"w"`.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if !c.is_whitespace() => Some(Self::new(c)),
            _ => None,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseBtn {
    Left,
    Right,
    Middle,
}

pub struct InputState {
    held: HashSet<Key>,
    just_pressed: HashSet<Key>,
    just_released: HashSet<Key>,

    mouse_held: HashSet<MouseBtn>,
    mouse_just_pressed: HashSet<MouseBtn>,
    mouse_just_released: HashSet<MouseBtn>,

    pub mouse_position: (f64, f64),
    /// Cursor movement accumulated since the last `take_mouse_delta()`.
    mouse_delta: (f64, f64),
    /// Wheel notches accumulated since the last `take_scroll()`. Positive is
    /// "scroll up" (zoom in).
    scroll: f32,
}

impl InputState {
    pub fn new() -> Self {
        Self {
            held: HashSet::new(),
            just_pressed: HashSet::new(),
            just_released: HashSet::new(),
            mouse_held: HashSet::new(),
            mouse_just_pressed: HashSet::new(),
            mouse_just_released: HashSet::new(),
            mouse_position: (0.0, 0.0),
            mouse_delta: (0.0, 0.0),
            scroll: 0.0,
        }
    }

    pub fn key_down(&mut self, key: Key) {
        if self.held.insert(key) {
            self.just_pressed.insert(key);
        }
    }

    pub fn key_up(&mut self, key: Key) {
        if self.held.remove(&key) {
            self.just_released.insert(key);
        }
    }

    pub fn mouse_down(&mut self, btn: MouseBtn) {
        if self.mouse_held.insert(btn) {
            self.mouse_just_pressed.insert(btn);
        }
    }

    pub fn mouse_up(&mut self, btn: MouseBtn) {
        if self.mouse_held.remove(&btn) {
            self.mouse_just_released.insert(btn);
        }
    }

    /// Record a new cursor position, accumulating the delta from the previous one.
    pub fn mouse_moved(&mut self, x: f64, y: f64) {
        self.mouse_delta.0 += x - self.mouse_position.0;
        self.mouse_delta.1 += y - self.mouse_position.1;
        self.mouse_position = (x, y);
    }

    pub fn scrolled(&mut self, notches: f32) {
        self.scroll += notches;
    }

    pub fn take_mouse_delta(&mut self) -> (f64, f64) {
        std::mem::take(&mut self.mouse_delta)
    }

    pub fn take_scroll(&mut self) -> f32 {
        std::mem::take(&mut self.scroll)
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    pub fn is_just_pressed(&self, key: Key) -> bool {
        self.just_pressed.contains(&key)
    }

    /// Consume a press edge so later checks this frame no longer see it.
    pub fn take_just_pressed(&mut self, key: Key) -> bool {
        self.just_pressed.remove(&key)
    }

    pub fn is_just_released(&self, key: Key) -> bool {
        self.just_released.contains(&key)
    }

    pub fn is_mouse_held(&self, btn: MouseBtn) -> bool {
        self.mouse_held.contains(&btn)
    }

    pub fn is_mouse_just_pressed(&self, btn: MouseBtn) -> bool {
        self.mouse_just_pressed.contains(&btn)
    }

    pub fn is_mouse_just_released(&self, btn: MouseBtn) -> bool {
        self.mouse_just_released.contains(&btn)
    }

    /// Triggers of spell keys pressed this frame, in `Key::SPELL_KEYS` order.
    pub fn just_pressed_triggers(&self) -> Vec<Trigger> {
        Key::SPELL_KEYS
            .iter()
            .filter(|key| self.is_just_pressed(**key))
            .filter_map(|key| key.trigger())
            .collect()
    }

    pub fn end_frame(&mut self) {
        self.just_pressed.clear();
        self.just_released.clear();
        self.mouse_just_pressed.clear();
        self.mouse_just_released.clear();
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_down_sets_held_and_just_pressed() {
        let mut input = InputState::new();
        input.key_down(Key::Q);
        assert!(input.is_held(Key::Q));
        assert!(input.is_just_pressed(Key::Q));
    }

    #[test]
    fn test_key_up_clears_held_sets_just_released() {
        let mut input = InputState::new();
        input.key_down(Key::Q);
        input.key_up(Key::Q);
        assert!(!input.is_held(Key::Q));
        assert!(input.is_just_released(Key::Q));
    }

    #[test]
    fn test_key_repeat_does_not_retrigger() {
        let mut input = InputState::new();
        input.key_down(Key::W);
        input.end_frame();
        // OS key repeat delivers another press while the key is still held.
        input.key_down(Key::W);
        assert!(input.is_held(Key::W));
        assert!(!input.is_just_pressed(Key::W));
    }

    #[test]
    fn test_key_up_without_down_is_no_op() {
        let mut input = InputState::new();
        input.key_up(Key::E);
        assert!(!input.is_just_released(Key::E));
        assert!(!input.is_held(Key::E));
    }

    #[test]
    fn test_end_frame_clears_transient_state() {
        let mut input = InputState::new();
        input.key_down(Key::Left);
        input.mouse_down(MouseBtn::Left);
        input.end_frame();
        assert!(!input.is_just_pressed(Key::Left));
        assert!(!input.is_mouse_just_pressed(MouseBtn::Left));
        assert!(input.is_held(Key::Left));
        assert!(input.is_mouse_held(MouseBtn::Left));
    }

    #[test]
    fn test_take_just_pressed_consumes_edge_once() {
        let mut input = InputState::new();
        input.key_down(Key::F3);
        assert!(input.take_just_pressed(Key::F3));
        assert!(!input.take_just_pressed(Key::F3));
        assert!(!input.is_just_pressed(Key::F3));
        assert!(input.is_held(Key::F3));
    }

    #[test]
    fn test_spell_keys_map_to_triggers() {
        assert_eq!(Key::Q.trigger(), Some(Trigger::new('q')));
        assert_eq!(Key::D.trigger(), Some(Trigger::new('d')));
        assert_eq!(Key::Left.trigger(), None);
        assert_eq!(Key::Escape.trigger(), None);
    }

    #[test]
    fn test_trigger_resolves_back_to_its_key() {
        for key in Key::SPELL_KEYS {
            let trigger = key.trigger().expect("spell key");
            assert_eq!(Key::for_trigger(trigger), Some(*key));
        }
        assert_eq!(Key::for_trigger(Trigger::new('R')), Some(Key::R));
        assert_eq!(Key::for_trigger(Trigger::new('f')), None);
        assert_eq!(Key::for_trigger(Trigger::new('1')), None);
    }

    #[test]
    fn test_just_pressed_triggers_in_stable_order() {
        let mut input = InputState::new();
        input.key_down(Key::R);
        input.key_down(Key::Q);
        input.key_down(Key::Left);
        assert_eq!(
            input.just_pressed_triggers(),
            vec![Trigger::new('q'), Trigger::new('r')]
        );
    }

    #[test]
    fn test_trigger_is_case_folded() {
        assert_eq!(Trigger::new('Q'), Trigger::new('q'));
        assert_eq!(Trigger::parse("W"), Some(Trigger::new('w')));
        assert_eq!(Trigger::parse(""), None);
        assert_eq!(Trigger::parse("qw"), None);
        assert_eq!(Trigger::parse(" "), None);
        assert_eq!(Trigger::new('d').to_string(), "d");
    }

    #[test]
    fn test_mouse_delta_accumulates_until_taken() {
        let mut input = InputState::new();
        input.mouse_moved(10.0, 5.0);
        input.mouse_moved(15.0, 2.0);
        let (dx, dy) = input.take_mouse_delta();
        assert!((dx - 15.0).abs() < f64::EPSILON);
        assert!((dy - 2.0).abs() < f64::EPSILON);
        assert_eq!(input.take_mouse_delta(), (0.0, 0.0));
    }

    #[test]
    fn test_scroll_accumulates_until_taken() {
        let mut input = InputState::new();
        input.scrolled(1.0);
        input.scrolled(-3.0);
        assert!((input.take_scroll() + 2.0).abs() < f32::EPSILON);
        assert_eq!(input.take_scroll(), 0.0);
    }
}
