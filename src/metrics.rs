//! Prometheus counters for the generation endpoints.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::inference::session::StopReason;

pub struct Metrics {
    registry: Registry,
    requests: IntCounterVec,
    chunks: IntCounter,
    completions: IntCounterVec,
    errors: IntCounter,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("lollms_bridge".to_string()), None)?;

        let requests = IntCounterVec::new(
            Opts::new("requests_total", "Generation requests by endpoint"),
            &["endpoint"],
        )?;
        let chunks = IntCounter::new("chunks_total", "Chunks delivered to clients")?;
        let completions = IntCounterVec::new(
            Opts::new("generations_total", "Finished generations by stop reason"),
            &["reason"],
        )?;
        let errors = IntCounter::new("errors_total", "Errors reported to the error sink")?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(chunks.clone()))?;
        registry.register(Box::new(completions.clone()))?;
        registry.register(Box::new(errors.clone()))?;

        Ok(Self {
            registry,
            requests,
            chunks,
            completions,
            errors,
        })
    }

    pub fn record_request(&self, endpoint: &str) {
        self.requests.with_label_values(&[endpoint]).inc();
    }

    pub fn record_finished(&self, reason: StopReason, chunks: usize) {
        self.completions.with_label_values(&[reason.as_str()]).inc();
        self.chunks.inc_by(chunks as u64);
    }

    pub fn record_error(&self) {
        self.errors.inc();
    }

    pub fn finished_count(&self, reason: StopReason) -> u64 {
        self.completions.with_label_values(&[reason.as_str()]).get()
    }

    pub fn error_count(&self) -> u64 {
        self.errors.get()
    }

    /// Render all metrics in the Prometheus text format.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
