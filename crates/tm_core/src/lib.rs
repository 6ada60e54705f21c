pub mod animation;
pub mod character;
pub mod effect;
pub mod error;
pub mod input;
pub mod registry;
pub mod schedule;
pub mod spell;
pub mod sprite_sheet;
pub mod time;
