//! Wandcraft: content configuration.
//!
//! Loads wand templates, upgrade paths and the spell/brush catalog from a
//! YAML document, validates every cross-reference once at load time and
//! fingerprints the source so callers can tell content revisions apart.

pub mod catalog;
pub mod config;
pub mod definitions;
pub mod error;
pub mod loader;

pub use catalog::ConfiguredSpellCatalog;
pub use config::ContentConfig;
pub use error::ContentError;
pub use loader::ContentBundle;
