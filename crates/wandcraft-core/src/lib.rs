//! Wandcraft Core: shared domain abstractions.
//!
//! Every bounded context builds on the traits and types defined here.
//! Nothing in this crate touches storage, networking or the host engine.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod repository;
pub mod rng;
