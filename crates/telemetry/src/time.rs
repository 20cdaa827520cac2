// Path: crates/telemetry/src/time.rs
use crate::sinks::EvaluationMetricsSink;
use std::time::{Duration, Instant};

/// Observes the lifetime of one handler invocation on drop.
pub struct InteractionTimer<'a> {
    sink: &'a dyn EvaluationMetricsSink,
    start: Instant,
}

impl<'a> InteractionTimer<'a> {
    /// Starts timing.
    pub fn new(sink: &'a dyn EvaluationMetricsSink) -> Self {
        Self {
            sink,
            start: Instant::now(),
        }
    }

    /// Time elapsed so far.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for InteractionTimer<'_> {
    fn drop(&mut self) {
        self.sink
            .observe_interaction_duration(self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Recorder(Mutex<Vec<f64>>);

    impl EvaluationMetricsSink for Recorder {
        fn inc_interactions_evaluated(&self, _outcome: &'static str) {}
        fn observe_interaction_duration(&self, duration_secs: f64) {
            self.0.lock().unwrap().push(duration_secs);
        }
        fn inc_checkpoint_lookup(&self, _hit: bool) {}
        fn inc_evolves(&self) {}
        fn inc_internal_calls(&self, _call_type: &'static str) {}
    }

    #[test]
    fn timer_observes_on_drop() {
        let recorder = Recorder::default();
        {
            let _t = InteractionTimer::new(&recorder);
        }
        let seen = recorder.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0] >= 0.0);
    }
}
