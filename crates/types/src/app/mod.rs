// Path: crates/types/src/app/mod.rs

//! Core data structures for deterministic contract evaluation.

mod contract;
mod interaction;
mod outcome;
mod sort_key;
mod state;

pub use contract::*;
pub use interaction::*;
pub use outcome::*;
pub use sort_key::*;
pub use state::*;
