//! Application services for the Wand context.

pub mod command_handlers;
pub mod lost_wands;
pub mod query_handlers;
