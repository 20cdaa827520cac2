// Path: crates/execution/src/lib.rs
//! # Tessera Execution Crate Lints
//!
//! This crate enforces a strict set of lints to ensure high-quality,
//! panic-free, and well-documented code. Panics are disallowed in non-test
//! code to promote robust error handling.
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]
//! # Tessera Execution
//!
//! Deterministic contract state evaluation. An [`Engine`] owns the loaders,
//! the checkpoint store and the handler factory; a [`ContractFacade`] built
//! from it replays a contract's interactions in sort-key order, runs internal
//! reads and writes between contracts against a per-call overlay of
//! uncommitted states, and simulates or submits new interactions.

mod bridge;
pub mod call_graph;
mod engine;
mod evaluator;
pub mod evolve;
mod facade;
/// Native and isolated-task contract backends.
pub mod handler;
pub mod loader;
mod session;
pub mod sort_key;
pub mod tags;

pub use engine::{Engine, EngineBuilder};
pub use facade::ContractFacade;
pub use handler::{IsolatedHandler, NativeHandler, NativeHandlerFactory};
pub use session::SessionKind;
pub use sort_key::SortKeyService;
