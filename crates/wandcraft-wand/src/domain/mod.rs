//! Domain model for the Wand context.

pub mod aggregates;
pub mod bindings;
pub mod commands;
pub mod error;
pub mod events;
pub mod lost;
pub mod mana;
pub mod path;
pub mod ports;
pub mod progression;
pub mod properties;
pub mod snapshot;
pub mod template;

#[cfg(test)]
pub(crate) mod fixtures;
