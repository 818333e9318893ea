//! OpenTelemetry metrics for inference calls.

use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram, Meter},
};
use std::sync::OnceLock;

static METRICS: OnceLock<InferenceMetrics> = OnceLock::new();

/// Request, error, latency, retry and token metrics, labeled by server
/// configuration and operation.
#[derive(Clone)]
pub struct InferenceMetrics {
    _meter: Meter,
    /// Completed inference calls
    pub requests: Counter<u64>,
    /// Failed inference calls
    pub errors: Counter<u64>,
    /// Call duration in seconds
    pub duration: Histogram<f64>,
    /// Attempts beyond the first
    pub retries: Counter<u64>,
    /// Tokens generated
    pub tokens: Counter<u64>,
    /// Requests rejected by a saturated pool
    pub rejected: Counter<u64>,
}

impl InferenceMetrics {
    fn init() -> Self {
        let meter = global::meter("lantern_client");

        Self {
            _meter: meter.clone(),
            requests: meter
                .u64_counter("inference.requests")
                .with_description("Completed inference calls")
                .build(),
            errors: meter
                .u64_counter("inference.errors")
                .with_description("Failed inference calls")
                .build(),
            duration: meter
                .f64_histogram("inference.duration")
                .with_unit("seconds")
                .with_description("Inference call duration")
                .build(),
            retries: meter
                .u64_counter("inference.retries")
                .with_description("Retried inference attempts")
                .build(),
            tokens: meter
                .u64_counter("inference.tokens")
                .with_description("Tokens generated")
                .build(),
            rejected: meter
                .u64_counter("inference.rejected")
                .with_description("Requests rejected by a saturated pool")
                .build(),
        }
    }

    /// Get the global instance.
    pub fn get() -> &'static Self {
        METRICS.get_or_init(Self::init)
    }

    /// Record a successful call.
    pub fn record_request(&self, server: &str, operation: &str, duration_secs: f64) {
        let labels = &[
            KeyValue::new("server", server.to_string()),
            KeyValue::new("operation", operation.to_string()),
        ];
        self.requests.add(1, labels);
        self.duration.record(duration_secs, labels);
    }

    /// Record a failed call.
    pub fn record_error(&self, server: &str, operation: &str, error_type: &str) {
        let labels = &[
            KeyValue::new("server", server.to_string()),
            KeyValue::new("operation", operation.to_string()),
            KeyValue::new("error_type", error_type.to_string()),
        ];
        self.errors.add(1, labels);
        if error_type == "saturated" {
            self.rejected
                .add(1, &[KeyValue::new("server", server.to_string())]);
        }
    }

    /// Record one retried attempt.
    pub fn record_retry(&self, server: &str, operation: &str) {
        self.retries.add(
            1,
            &[
                KeyValue::new("server", server.to_string()),
                KeyValue::new("operation", operation.to_string()),
            ],
        );
    }

    /// Record tokens generated by `model`.
    pub fn record_tokens(&self, model: &str, tokens: u64) {
        self.tokens
            .add(tokens, &[KeyValue::new("model", model.to_string())]);
    }
}

impl Default for InferenceMetrics {
    fn default() -> Self {
        Self::get().clone()
    }
}
