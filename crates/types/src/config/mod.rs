// Path: crates/types/src/config/mod.rs

//! Evaluation options for contract facades, and the manifest overrides a
//! contract source may impose on them.

use crate::error::EvaluationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What happens to a callee whose effective source is not whitelisted.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WhitelistViolationPolicy {
    /// Only the caller's current interaction is invalidated. The callee is
    /// evaluated again on the next call.
    #[default]
    InvalidateInteraction,
    /// The callee is frozen for the rest of the top-level call: later calls
    /// fail immediately with the same error.
    FreezeContract,
}

/// Controls what the call graph keeps for diagnostics.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct StackTraceOptions {
    /// Save the post-interaction state in each call record.
    #[serde(default)]
    pub save_state: bool,
}

/// Per-facade evaluation configuration.
///
/// Set on the root facade only. Nested facades inherit the root's options,
/// resolved against the callee's manifest.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EvaluationOptions {
    /// Process internal-write markers addressed to the contract.
    #[serde(default)]
    pub internal_writes: bool,
    /// Accepted source transaction ids. Empty means every source is accepted.
    #[serde(default)]
    pub whitelist_sources: Vec<String>,
    /// Handling of whitelist violations raised by callees.
    #[serde(default)]
    pub whitelist_violation_policy: WhitelistViolationPolicy,
    /// Permit sources that use the unsafe client.
    #[serde(default)]
    pub allow_unsafe_client: bool,
    /// Raise a callee's failed write in the caller. `None` derives the value
    /// from the top-level call: true for writes and dry writes, false for views.
    #[serde(default)]
    pub throw_on_internal_write_error: Option<bool>,
    /// Wall-clock budget for a single handler invocation.
    #[serde(default = "default_max_interaction_evaluation_time_seconds")]
    pub max_interaction_evaluation_time_seconds: f64,
    /// Buffer checkpoints until an explicit flush.
    #[serde(default)]
    pub manual_cache_flush: bool,
    /// Persist a checkpoint every N replayed interactions. Zero persists only
    /// the final state of each evaluation.
    #[serde(default = "default_cache_every_n_interactions")]
    pub cache_every_n_interactions: u32,
    /// Gas budget per interaction.
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    /// Give contracts sort-key versioned key/value storage.
    #[serde(default)]
    pub use_kv_storage: bool,
    /// Run the `__init` pseudo-interaction before the first real interaction.
    #[serde(default)]
    pub use_constructor: bool,
    /// Where new interactions are submitted.
    #[serde(default)]
    pub sequencer_url: Option<String>,
    /// Wait for the submitted interaction to be confirmed.
    #[serde(default)]
    pub wait_for_confirmation: bool,
    /// Maximum nesting depth of internal calls.
    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: u32,
    /// Record handler exceptions instead of aborting the evaluation.
    #[serde(default = "default_ignore_exceptions")]
    pub ignore_exceptions: bool,
    /// Dry-run every `write_interaction` and refuse to submit failures.
    #[serde(default)]
    pub strict: bool,
    /// Call graph diagnostics.
    #[serde(default)]
    pub stack_trace: StackTraceOptions,
}

fn default_max_interaction_evaluation_time_seconds() -> f64 {
    60.0
}
fn default_cache_every_n_interactions() -> u32 {
    1
}
fn default_gas_limit() -> u64 {
    u64::MAX
}
fn default_max_call_depth() -> u32 {
    7
}
fn default_ignore_exceptions() -> bool {
    true
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            internal_writes: false,
            whitelist_sources: Vec::new(),
            whitelist_violation_policy: WhitelistViolationPolicy::default(),
            allow_unsafe_client: false,
            throw_on_internal_write_error: None,
            max_interaction_evaluation_time_seconds:
                default_max_interaction_evaluation_time_seconds(),
            manual_cache_flush: false,
            cache_every_n_interactions: default_cache_every_n_interactions(),
            gas_limit: default_gas_limit(),
            use_kv_storage: false,
            use_constructor: false,
            sequencer_url: None,
            wait_for_confirmation: false,
            max_call_depth: default_max_call_depth(),
            ignore_exceptions: default_ignore_exceptions(),
            strict: false,
            stack_trace: StackTraceOptions::default(),
        }
    }
}

impl EvaluationOptions {
    /// Parses options from a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        let options: Self = toml::from_str(raw)?;
        options
            .validate()
            .map_err(|e| <toml::de::Error as serde::de::Error>::custom(e.to_string()))?;
        Ok(options)
    }

    /// Rejects values no evaluation can run with.
    pub fn validate(&self) -> Result<(), EvaluationError> {
        let budget = self.max_interaction_evaluation_time_seconds;
        if !budget.is_finite() || budget <= 0.0 {
            return Err(EvaluationError::InvalidOptions(format!(
                "max_interaction_evaluation_time_seconds must be a positive number of seconds, got {budget}"
            )));
        }
        Ok(())
    }

    /// The time one interaction may run. Budgets too large for a `Duration`
    /// saturate.
    pub fn interaction_time_budget(&self) -> Duration {
        Duration::try_from_secs_f64(self.max_interaction_evaluation_time_seconds)
            .unwrap_or(Duration::MAX)
    }

    /// Whether `src_tx_id` passes the whitelist.
    pub fn is_source_allowed(&self, src_tx_id: &str) -> bool {
        self.whitelist_sources.is_empty() || self.whitelist_sources.iter().any(|s| s == src_tx_id)
    }

    /// Applies a manifest's overrides. Returns the overridden option names.
    pub fn resolve(&self, manifest: &ManifestOptions) -> (Self, Vec<&'static str>) {
        let mut resolved = self.clone();
        let mut overridden = Vec::new();
        macro_rules! apply {
            ($field:ident) => {
                if let Some(v) = manifest.$field {
                    if resolved.$field != v {
                        overridden.push(stringify!($field));
                    }
                    resolved.$field = v;
                }
            };
        }
        apply!(use_constructor);
        apply!(use_kv_storage);
        apply!(internal_writes);
        apply!(allow_unsafe_client);
        apply!(max_call_depth);
        if let Some(v) = manifest.throw_on_internal_write_error {
            if resolved.throw_on_internal_write_error != Some(v) {
                overridden.push("throw_on_internal_write_error");
            }
            resolved.throw_on_internal_write_error = Some(v);
        }
        (resolved, overridden)
    }
}

/// Option values a contract source fixes for its own evaluation.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestOptions {
    /// Fixes `use_constructor`.
    #[serde(default)]
    pub use_constructor: Option<bool>,
    /// Fixes `use_kv_storage`.
    #[serde(default, rename = "useKVStorage")]
    pub use_kv_storage: Option<bool>,
    /// Fixes `internal_writes`.
    #[serde(default)]
    pub internal_writes: Option<bool>,
    /// Fixes `allow_unsafe_client`.
    #[serde(default)]
    pub allow_unsafe_client: Option<bool>,
    /// Fixes `max_call_depth`.
    #[serde(default)]
    pub max_call_depth: Option<u32>,
    /// Fixes `throw_on_internal_write_error`.
    #[serde(default)]
    pub throw_on_internal_write_error: Option<bool>,
}
