// Path: crates/api/src/lib.rs

//! # Tessera API Crate Lints
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
        clippy::todo,
        clippy::unimplemented,
        clippy::indexing_slicing
    )
)]
//! # Tessera API
//!
//! Capability traits for every collaborator of the evaluation engine:
//! contract handlers and the factories that build them, the internal-call
//! bridge exposed to contract code, interaction and definition loaders,
//! checkpoint and key/value persistence, and interaction submission. Also
//! hosts the uncommitted-state overlay shared by nested evaluations.

/// Re-exports all core error types from the central `tessera-types` crate.
pub mod error;
/// Contract handlers, handler factories and the internal-call bridge.
pub mod handler;
/// Interaction and contract definition loaders.
pub mod loader;
/// The scoped overlay of uncommitted callee states.
pub mod overlay;
/// Checkpoint and key/value persistence.
pub mod storage;
/// Submission of new interactions to the ledger.
pub mod submit;

/// A curated set of the most commonly used traits and types.
pub mod prelude {
    pub use crate::error::{ErrorCode, EvaluationError, StorageError};
    pub use crate::handler::{
        ContractBridge, ContractCall, ContractHandler, ContractOutput, ExecutionContext,
        HandlerFactory, NativeContract,
    };
    pub use crate::loader::{DefinitionLoader, InteractionsLoader};
    pub use crate::overlay::UncommittedOverlay;
    pub use crate::storage::{CheckpointStore, KvStorage, KvStorageFactory};
    pub use crate::submit::InteractionSubmitter;
}
