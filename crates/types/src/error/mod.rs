// Path: crates/types/src/error/mod.rs
//! Core error types for the tessera evaluation engine.

use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Represents errors that can occur within a persistence backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A generic error originating from the underlying key-value store backend (e.g., redb).
    #[error("backend error: {0}")]
    Backend(String),
    /// An error occurred while serializing data for storage.
    #[error("encode error: {0}")]
    Encode(String),
    /// An error occurred while deserializing data from storage.
    #[error("decode error: {0}")]
    Decode(String),
    /// The requested key or item was not found in the store.
    #[error("not found")]
    NotFound,
    /// A transactional operation was issued outside of `begin`/`commit`.
    #[error("no open transaction")]
    NoTransaction,
}

impl ErrorCode for StorageError {
    fn code(&self) -> &'static str {
        match self {
            Self::Backend(_) => "STORAGE_BACKEND_ERROR",
            Self::Encode(_) => "STORAGE_ENCODE_ERROR",
            Self::Decode(_) => "STORAGE_DECODE_ERROR",
            Self::NotFound => "STORAGE_NOT_FOUND",
            Self::NoTransaction => "STORAGE_NO_TRANSACTION",
        }
    }
}

/// Errors raised by interaction and definition loaders.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The contract or source transaction does not exist.
    #[error("Contract having txId: {0} not found")]
    NotFound(String),
    /// The remote index could not be queried.
    #[error("Failed to fetch interactions: {0}")]
    Fetch(String),
    /// A loaded record could not be interpreted.
    #[error("Malformed ledger record: {0}")]
    Malformed(String),
}

impl ErrorCode for LoaderError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "LOADER_NOT_FOUND",
            Self::Fetch(_) => "LOADER_FETCH_FAILED",
            Self::Malformed(_) => "LOADER_MALFORMED",
        }
    }
}

/// Errors raised while instantiating a contract handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// No backend is registered for the definition's content type.
    #[error("Unsupported contract content type: {0}")]
    UnsupportedContentType(String),
    /// The backend does not know the source.
    #[error("Unknown contract source: {0}")]
    UnknownSource(String),
    /// The backend failed to prepare the source.
    #[error("Handler initialization failed: {0}")]
    Init(String),
}

impl ErrorCode for HandlerError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedContentType(_) => "HANDLER_UNSUPPORTED_CONTENT_TYPE",
            Self::UnknownSource(_) => "HANDLER_UNKNOWN_SOURCE",
            Self::Init(_) => "HANDLER_INIT_FAILED",
        }
    }
}

/// Errors returned to contract code from an internal read, view or write.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// The callee failed in a way the caller is expected to handle.
    #[error("{0}")]
    Contract(String),
    /// The evaluation is being aborted by a fatal error. Contract code must
    /// not try to recover from this.
    #[error("evaluation aborted: {0}")]
    Aborted(String),
}

impl ErrorCode for BridgeError {
    fn code(&self) -> &'static str {
        match self {
            Self::Contract(_) => "BRIDGE_CONTRACT_ERROR",
            Self::Aborted(_) => "BRIDGE_ABORTED",
        }
    }
}

/// The failure type of contract code written against the native backends.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContractError {
    /// A business rejection; becomes an `error` outcome.
    #[error("{0}")]
    Business(String),
    /// A runtime fault; becomes an `exception` outcome.
    #[error("{0}")]
    Exception(String),
}

impl From<BridgeError> for ContractError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::Contract(msg) => Self::Business(msg),
            BridgeError::Aborted(msg) => Self::Exception(msg),
        }
    }
}

impl ErrorCode for ContractError {
    fn code(&self) -> &'static str {
        match self {
            Self::Business(_) => "CONTRACT_BUSINESS_ERROR",
            Self::Exception(_) => "CONTRACT_EXCEPTION",
        }
    }
}

/// Fatal, engine-level errors. Any of these aborts the evaluation that raised it.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// A sort key could not be built or parsed.
    #[error("[InvalidSortKeyError] {0}")]
    InvalidSortKey(String),
    /// The effective source of the contract is not whitelisted.
    #[error("[NonWhitelistedSourceError] Contract source not part of whitelisted sources list: {src_tx_id}.")]
    NonWhitelistedSource {
        /// The rejected source transaction id.
        src_tx_id: String,
    },
    /// The internal call chain is deeper than allowed.
    #[error("Max call depth of {max_depth} has been exceeded for interaction {interaction_tx_id} on {contract_tx_id}")]
    MaxCallDepthExceeded {
        /// The configured maximum.
        max_depth: u32,
        /// The callee that would exceed it.
        contract_tx_id: String,
        /// The interaction being executed.
        interaction_tx_id: String,
    },
    /// A contract re-entered an interaction that is still executing.
    #[error("[CyclicCallError] {contract_tx_id} re-entered interaction {interaction_tx_id} (chain: {chain})")]
    CyclicCall {
        /// The re-entering contract.
        contract_tx_id: String,
        /// The interaction already on the active chain.
        interaction_tx_id: String,
        /// The active chain, rendered for diagnostics.
        chain: String,
    },
    /// The `__init` pseudo-interaction failed.
    #[error("[ConstructorError] Constructor of {contract_tx_id} failed: {message}")]
    ConstructorFailed {
        /// The contract whose constructor failed.
        contract_tx_id: String,
        /// The handler's message.
        message: String,
    },
    /// The source needs the unsafe client and it is not allowed.
    #[error("[UnsafeClientError] Using unsafeClient is not allowed by default. Use EvaluationOptions.allow_unsafe_client flag to evaluate {contract_tx_id}.")]
    UnsafeClientNotAllowed {
        /// The offending contract.
        contract_tx_id: String,
    },
    /// A handler exception with `ignore_exceptions` disabled.
    #[error("Exception while processing interaction {tx_id}: {message}")]
    UnhandledException {
        /// The interaction that faulted.
        tx_id: String,
        /// The fault.
        message: String,
    },
    /// A replayed interaction ended without a verdict.
    #[error("Validity not set for interaction {0}")]
    ValidityNotSet(String),
    /// A contract with KV storage was targeted by another contract.
    #[error("Foreign writes and reads are forbidden for KV storage contracts: {0}")]
    KvStorageForeignCall(String),
    /// The checkpoint store or KV storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    /// The interactions or definition loader failed.
    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),
    /// No handler could be built for the contract.
    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),
    /// The interaction submitter rejected a write.
    #[error("Submission failed: {0}")]
    Submission(String),
    /// A strict write was refused because its dry run failed.
    #[error("Cannot create interaction: {0}")]
    DryRunFailed(String),
    /// The evaluation options hold a value the engine cannot honour.
    #[error("[InvalidOptionsError] {0}")]
    InvalidOptions(String),
}

impl EvaluationError {
    /// Whether this error, raised while evaluating a callee, is reported to the
    /// caller as a business error instead of aborting the caller.
    pub fn is_callee_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NonWhitelistedSource { .. }
                | Self::ConstructorFailed { .. }
                | Self::UnsafeClientNotAllowed { .. }
                | Self::KvStorageForeignCall(_)
        )
    }
}

impl ErrorCode for EvaluationError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidSortKey(_) => "EVAL_INVALID_SORT_KEY",
            Self::NonWhitelistedSource { .. } => "EVAL_NON_WHITELISTED_SOURCE",
            Self::MaxCallDepthExceeded { .. } => "EVAL_MAX_CALL_DEPTH_EXCEEDED",
            Self::CyclicCall { .. } => "EVAL_CYCLIC_CALL",
            Self::ConstructorFailed { .. } => "EVAL_CONSTRUCTOR_FAILED",
            Self::UnsafeClientNotAllowed { .. } => "EVAL_UNSAFE_CLIENT_NOT_ALLOWED",
            Self::UnhandledException { .. } => "EVAL_UNHANDLED_EXCEPTION",
            Self::ValidityNotSet(_) => "EVAL_VALIDITY_NOT_SET",
            Self::KvStorageForeignCall(_) => "EVAL_KV_FOREIGN_CALL",
            Self::Storage(_) => "EVAL_STORAGE_ERROR",
            Self::Loader(_) => "EVAL_LOADER_ERROR",
            Self::Handler(_) => "EVAL_HANDLER_ERROR",
            Self::Submission(_) => "EVAL_SUBMISSION_FAILED",
            Self::DryRunFailed(_) => "EVAL_DRY_RUN_FAILED",
            Self::InvalidOptions(_) => "EVAL_INVALID_OPTIONS",
        }
    }
}
