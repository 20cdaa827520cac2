// Path: crates/telemetry/src/init.rs
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Initializes the global `tracing` subscriber for structured JSON logging.
///
/// `RUST_LOG` takes precedence; otherwise the engine logs at `info` and the
/// evaluator's per-interaction records stay at `debug`.
pub fn init_tracing() -> Result<(), anyhow::Error> {
    init_tracing_with("info")
}

/// Like [`init_tracing`], with an explicit fallback filter directive.
pub fn init_tracing_with(default_directive: &str) -> Result<(), anyhow::Error> {
    let fmt_layer = fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))?;
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    // Route `log` records (loaders, overlay) through the same subscriber.
    tracing_log::LogTracer::init()?;
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
