//! Wandcraft: Wand bounded context.
//!
//! Responsible for the wand item model: mana economy, upgrade paths,
//! spell and brush bindings, property overrides, owner binding and
//! lost-wand tracking.

pub mod application;
pub mod domain;
