// Path: crates/test_utils/src/lib.rs
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

//! # Tessera Test Utilities
//!
//! In-memory ledgers, deterministic ids, interaction builders and sample
//! contracts for exercising the evaluation engine end to end.

pub mod assertions;
pub mod builders;
pub mod contracts;
pub mod ids;
pub mod ledger;

pub use builders::InteractionBuilder;
pub use ids::{block_id, src_id, tx_id};
pub use ledger::{MemDefinitionLoader, MemInteractionsLoader, RecordingSubmitter};
