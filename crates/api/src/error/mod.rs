// Path: crates/api/src/error/mod.rs
// Re-export all core error types from the central types crate.
pub use tessera_types::error::{
    BridgeError, ContractError, ErrorCode, EvaluationError, HandlerError, LoaderError,
    StorageError,
};
pub use tessera_types::Result;
