// Path: crates/types/src/tags.rs

//! Tag names carried by ledger transactions that the engine interprets.

/// Identifies the application protocol of a transaction.
pub const APP_NAME: &str = "App-Name";
/// The protocol version.
pub const APP_VERSION: &str = "App-Version";
/// The contract an interaction is addressed to.
pub const CONTRACT_TX_ID: &str = "Contract";
/// The JSON input of an interaction. Follows its `Contract` tag.
pub const INPUT: &str = "Input";
/// Marks an internal write: names a contract written to by the interaction's own contract.
pub const INTERACT_WRITE: &str = "Interact-Write";
/// The source transaction of a contract deployment.
pub const CONTRACT_SRC_TX_ID: &str = "Contract-Src";
/// The initial state of a contract deployment.
pub const INIT_STATE: &str = "Init-State";
/// The content type of a contract source.
pub const CONTENT_TYPE: &str = "Content-Type";

/// The `App-Name` value of contract interactions.
pub const APP_NAME_CONTRACT_ACTION: &str = "SmartWeaveAction";
