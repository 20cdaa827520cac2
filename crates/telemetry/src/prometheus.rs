// Path: crates/telemetry/src/prometheus.rs
//! A concrete implementation of the metrics sinks using the Prometheus crate.

use crate::sinks::*;
use once_cell::sync::OnceCell;
use prometheus::{
    exponential_buckets, register_histogram, register_int_counter, register_int_counter_vec,
    Histogram, IntCounter, IntCounterVec,
};

// --- Metric Statics ---
// Collectors live in OnceCells and are set exactly once by `install`.

static CHECKPOINTS_WRITTEN_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static STORAGE_BYTES_WRITTEN_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static CHECKPOINTS_PRUNED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static INTERACTIONS_EVALUATED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static INTERACTION_DURATION_SECONDS: OnceCell<Histogram> = OnceCell::new();
static CHECKPOINT_LOOKUPS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static EVOLVES_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static INTERNAL_CALLS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static ERRORS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();

#[derive(Debug, Clone, Copy)]
pub struct PrometheusSink;

/// Helper macro to reduce boilerplate for getting a metric from OnceCell.
/// Metrics recorded before `install()` are dropped.
macro_rules! with_metric {
    ($metric:ident, |$m:ident| $body:expr) => {
        if let Some($m) = $metric.get() {
            $body;
        }
    };
}

impl StorageMetricsSink for PrometheusSink {
    fn inc_checkpoints_written(&self, backend: &'static str, count: u64) {
        with_metric!(CHECKPOINTS_WRITTEN_TOTAL, |m| m
            .with_label_values(&[backend])
            .inc_by(count));
    }
    fn inc_bytes_written_total(&self, bytes: u64) {
        with_metric!(STORAGE_BYTES_WRITTEN_TOTAL, |m| m.inc_by(bytes));
    }
    fn inc_checkpoints_pruned(&self, count: u64) {
        with_metric!(CHECKPOINTS_PRUNED_TOTAL, |m| m.inc_by(count));
    }
}

impl EvaluationMetricsSink for PrometheusSink {
    fn inc_interactions_evaluated(&self, outcome: &'static str) {
        with_metric!(INTERACTIONS_EVALUATED_TOTAL, |m| m
            .with_label_values(&[outcome])
            .inc());
    }
    fn observe_interaction_duration(&self, duration_secs: f64) {
        with_metric!(INTERACTION_DURATION_SECONDS, |m| m.observe(duration_secs));
    }
    fn inc_checkpoint_lookup(&self, hit: bool) {
        let label = if hit { "hit" } else { "miss" };
        with_metric!(CHECKPOINT_LOOKUPS_TOTAL, |m| m
            .with_label_values(&[label])
            .inc());
    }
    fn inc_evolves(&self) {
        with_metric!(EVOLVES_TOTAL, |m| m.inc());
    }
    fn inc_internal_calls(&self, call_type: &'static str) {
        with_metric!(INTERNAL_CALLS_TOTAL, |m| m
            .with_label_values(&[call_type])
            .inc());
    }
}

impl ErrorMetricsSink for PrometheusSink {
    fn inc_error(&self, kind: &'static str, variant: &'static str) {
        with_metric!(ERRORS_TOTAL, |m| m.with_label_values(&[kind, variant]).inc());
    }
}

fn already_installed() -> prometheus::Error {
    prometheus::Error::Msg("prometheus sink already installed".into())
}

/// Initializes all Prometheus metrics collectors, publishes the sink to the
/// global [`SINK`] and returns it. Fails when called twice.
pub fn install() -> Result<&'static dyn MetricsSink, prometheus::Error> {
    CHECKPOINTS_WRITTEN_TOTAL
        .set(register_int_counter_vec!(
            "tessera_checkpoints_written_total",
            "Total number of checkpoints written, by backend.",
            &["backend"]
        )?)
        .map_err(|_| already_installed())?;
    STORAGE_BYTES_WRITTEN_TOTAL
        .set(register_int_counter!(
            "tessera_storage_bytes_written_total",
            "Total bytes written to checkpoint and key/value backends."
        )?)
        .map_err(|_| already_installed())?;
    CHECKPOINTS_PRUNED_TOTAL
        .set(register_int_counter!(
            "tessera_checkpoints_pruned_total",
            "Total number of checkpoints removed by pruning."
        )?)
        .map_err(|_| already_installed())?;
    INTERACTIONS_EVALUATED_TOTAL
        .set(register_int_counter_vec!(
            "tessera_interactions_evaluated_total",
            "Total interactions replayed, by outcome.",
            &["outcome"]
        )?)
        .map_err(|_| already_installed())?;
    INTERACTION_DURATION_SECONDS
        .set(register_histogram!(
            "tessera_interaction_duration_seconds",
            "Wall-clock time of a single handler invocation.",
            exponential_buckets(0.0001, 2.0, 18)?
        )?)
        .map_err(|_| already_installed())?;
    CHECKPOINT_LOOKUPS_TOTAL
        .set(register_int_counter_vec!(
            "tessera_checkpoint_lookups_total",
            "Checkpoint lookups at the start of an evaluation, by result.",
            &["result"]
        )?)
        .map_err(|_| already_installed())?;
    EVOLVES_TOTAL
        .set(register_int_counter!(
            "tessera_evolves_total",
            "Total number of contract source swaps."
        )?)
        .map_err(|_| already_installed())?;
    INTERNAL_CALLS_TOTAL
        .set(register_int_counter_vec!(
            "tessera_internal_calls_total",
            "Internal calls between contracts, by call type.",
            &["call_type"]
        )?)
        .map_err(|_| already_installed())?;
    ERRORS_TOTAL
        .set(register_int_counter_vec!(
            "tessera_errors_total",
            "Total number of errors, categorized by type and variant.",
            &["kind", "variant"]
        )?)
        .map_err(|_| already_installed())?;

    static PROMETHEUS_SINK: PrometheusSink = PrometheusSink;
    let sink: &'static dyn MetricsSink = &PROMETHEUS_SINK;
    SINK.set(sink).map_err(|_| already_installed())?;
    Ok(sink)
}

/// Renders every registered metric in the Prometheus text format.
pub fn gather_text() -> Result<String, prometheus::Error> {
    use prometheus::Encoder;
    let mut buf = Vec::new();
    prometheus::TextEncoder::new().encode(&prometheus::gather(), &mut buf)?;
    String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installed_sink_exports_evaluation_counters() {
        let sink = install().unwrap();
        sink.inc_interactions_evaluated("ok");
        sink.inc_checkpoint_lookup(true);
        sink.inc_error("evaluation", "EVAL_CYCLIC_CALL");
        let text = gather_text().unwrap();
        assert!(text.contains("tessera_interactions_evaluated_total"));
        assert!(text.contains("tessera_errors_total"));
        assert!(install().is_err());
    }
}
