// Path: crates/types/src/lib.rs
#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # Tessera Types
//!
//! The foundational library of the tessera workspace: the data model of
//! contract interactions, checkpoints and evaluation outcomes, the evaluation
//! options surface, and the error taxonomy shared by every other crate.
//!
//! ## Architectural Role
//!
//! As the base crate, `tessera-types` has minimal dependencies and is itself a
//! dependency for every other crate in the workspace. This keeps the shared
//! definitions of `Interaction`, `SortKey`, `EvalStateResult` and the error
//! enums in one canonical place.

/// A top-level, crate-wide `Result` type alias with a default error type.
pub type Result<T, E = crate::error::EvaluationError> = std::result::Result<T, E>;

/// Core data structures: interactions, sort keys, contract definitions and outcomes.
pub mod app;
/// The canonical, deterministic binary codec for persisted checkpoints.
pub mod codec;
/// Evaluation options and manifest overrides.
pub mod config;
/// A unified set of all error types used across the workspace.
pub mod error;
/// A prelude containing useful extension traits like `OptionExt`.
pub mod prelude;
/// Well-known interaction tag names.
pub mod tags;
