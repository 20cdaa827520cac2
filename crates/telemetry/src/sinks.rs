// Path: crates/telemetry/src/sinks.rs
//! Defines abstract traits for metrics reporting, decoupling core logic from the backend.

use once_cell::sync::OnceCell;

// --- Static Sink Access ---

/// A no-op sink for use in tests or when telemetry is disabled.
#[derive(Debug, Clone, Copy)]
pub struct NopSink;

/// A lazily-initialized static reference to the global `MetricsSink` implementation.
pub static SINK: OnceCell<&'static dyn MetricsSink> = OnceCell::new();
static NOP_SINK: NopSink = NopSink;

/// Returns a static reference to the configured error metrics sink.
/// If no sink has been initialized, it returns a no-op sink.
pub fn error_metrics() -> &'static dyn ErrorMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns a static reference to the configured evaluation metrics sink.
/// If no sink has been initialized, it returns a no-op sink.
pub fn evaluation_metrics() -> &'static dyn EvaluationMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns a static reference to the configured storage metrics sink.
/// If no sink has been initialized, it returns a no-op sink.
pub fn storage_metrics() -> &'static dyn StorageMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

// --- Trait Definitions ---

/// A sink for metrics related to checkpoint and key/value persistence.
pub trait StorageMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments the number of checkpoints written, labeled by backend.
    fn inc_checkpoints_written(&self, backend: &'static str, count: u64);
    /// Increments the total number of bytes written to the storage backend.
    fn inc_bytes_written_total(&self, bytes: u64);
    /// Increments the number of checkpoints removed by pruning.
    fn inc_checkpoints_pruned(&self, count: u64);
}
impl StorageMetricsSink for NopSink {
    fn inc_checkpoints_written(&self, _backend: &'static str, _count: u64) {}
    fn inc_bytes_written_total(&self, _bytes: u64) {}
    fn inc_checkpoints_pruned(&self, _count: u64) {}
}

/// A sink for metrics related to contract state evaluation.
pub trait EvaluationMetricsSink: Send + Sync + std::fmt::Debug {
    /// Counts a replayed interaction, labeled by outcome (`ok`, `error`, `exception`).
    fn inc_interactions_evaluated(&self, outcome: &'static str);
    /// Observes the wall-clock time of one handler invocation.
    fn observe_interaction_duration(&self, duration_secs: f64);
    /// Counts checkpoint lookups, labeled by whether a usable checkpoint was found.
    fn inc_checkpoint_lookup(&self, hit: bool);
    /// Counts source swaps performed by `evolve`.
    fn inc_evolves(&self);
    /// Counts internal calls, labeled by call type.
    fn inc_internal_calls(&self, call_type: &'static str);
}
impl EvaluationMetricsSink for NopSink {
    fn inc_interactions_evaluated(&self, _outcome: &'static str) {}
    fn observe_interaction_duration(&self, _duration_secs: f64) {}
    fn inc_checkpoint_lookup(&self, _hit: bool) {}
    fn inc_evolves(&self) {}
    fn inc_internal_calls(&self, _call_type: &'static str) {}
}

/// A sink for recording structured error metrics.
pub trait ErrorMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments a counter for a specific error, categorized by its kind and variant.
    fn inc_error(&self, kind: &'static str, variant: &'static str);
}
impl ErrorMetricsSink for NopSink {
    fn inc_error(&self, _kind: &'static str, _variant: &'static str) {}
}

/// A unified sink that implements all domain-specific traits, providing a single
/// point of implementation for metrics backends like Prometheus.
pub trait MetricsSink: StorageMetricsSink + EvaluationMetricsSink + ErrorMetricsSink {}

// Blanket implementation to allow any type that implements all sub-traits
// to be used as a `MetricsSink`.
impl<T> MetricsSink for T where T: StorageMetricsSink + EvaluationMetricsSink + ErrorMetricsSink {}
