// Path: crates/storage/src/lib.rs
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

//! Checkpoint stores and contract key/value storage.
//!
//! Two checkpoint backends are provided: an ordered in-memory map and a redb
//! database keyed by `contract || 0x00 || sort_key`. [`BufferedCheckpointStore`]
//! wraps either one to hold writes until an explicit flush. Contract scratch
//! storage comes in the same two flavours, versioned by sort key.

pub mod buffered;
pub mod keys;
pub mod kv;
pub mod mem;
pub mod metrics;
pub mod redb_kv;
pub mod redb_store;

pub use buffered::BufferedCheckpointStore;
pub use kv::{MemKvFactory, MemKvStorage};
pub use mem::MemCheckpointStore;
pub use redb_kv::{RedbKvFactory, RedbKvStorage};
pub use redb_store::RedbCheckpointStore;
