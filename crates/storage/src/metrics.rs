// Path: crates/storage/src/metrics.rs
use once_cell::sync::OnceCell;
use tessera_telemetry::sinks::StorageMetricsSink;

/// A storage-specific sink override. When unset, the global telemetry sink is used.
pub static SINK: OnceCell<&'static dyn StorageMetricsSink> = OnceCell::new();

pub fn metrics() -> &'static dyn StorageMetricsSink {
    SINK.get()
        .copied()
        .unwrap_or_else(tessera_telemetry::storage_metrics)
}
