//! OpenTelemetry metrics for job lifecycle events.

use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram, Meter},
};
use std::sync::OnceLock;

static METRICS: OnceLock<JobMetrics> = OnceLock::new();

/// Job lifecycle counters, labeled by task category.
#[derive(Clone)]
pub struct JobMetrics {
    _meter: Meter,
    /// Jobs admitted
    pub submitted: Counter<u64>,
    /// Jobs rejected at submission
    pub rejected: Counter<u64>,
    /// Jobs completed
    pub completed: Counter<u64>,
    /// Jobs failed
    pub failed: Counter<u64>,
    /// Jobs cancelled while pending
    pub cancelled: Counter<u64>,
    /// Processing time of finished jobs
    pub duration: Histogram<f64>,
}

impl JobMetrics {
    fn init() -> Self {
        let meter = global::meter("lantern_jobs");

        Self {
            _meter: meter.clone(),
            submitted: meter
                .u64_counter("jobs.submitted")
                .with_description("Jobs admitted to the queue")
                .build(),
            rejected: meter
                .u64_counter("jobs.rejected")
                .with_description("Jobs rejected at submission")
                .build(),
            completed: meter
                .u64_counter("jobs.completed")
                .with_description("Jobs completed")
                .build(),
            failed: meter
                .u64_counter("jobs.failed")
                .with_description("Jobs failed")
                .build(),
            cancelled: meter
                .u64_counter("jobs.cancelled")
                .with_description("Jobs cancelled before processing")
                .build(),
            duration: meter
                .f64_histogram("jobs.duration")
                .with_unit("seconds")
                .with_description("Processing time of finished jobs")
                .build(),
        }
    }

    /// Get the global instance.
    pub fn get() -> &'static Self {
        METRICS.get_or_init(Self::init)
    }

    fn labels(category: &str) -> [KeyValue; 1] {
        [KeyValue::new("task", category.to_string())]
    }

    /// Record an admitted job.
    pub fn record_submitted(&self, category: &str) {
        self.submitted.add(1, &Self::labels(category));
    }

    /// Record a rejected submission.
    pub fn record_rejected(&self, category: &str, reason: &str) {
        self.rejected.add(
            1,
            &[
                KeyValue::new("task", category.to_string()),
                KeyValue::new("reason", reason.to_string()),
            ],
        );
    }

    /// Record a finished job.
    pub fn record_finished(&self, category: &str, success: bool, seconds: Option<f64>) {
        let labels = Self::labels(category);
        if success {
            self.completed.add(1, &labels);
        } else {
            self.failed.add(1, &labels);
        }
        if let Some(seconds) = seconds {
            self.duration.record(seconds, &labels);
        }
    }

    /// Record a cancelled job.
    pub fn record_cancelled(&self, category: &str) {
        self.cancelled.add(1, &Self::labels(category));
    }
}

impl Default for JobMetrics {
    fn default() -> Self {
        Self::get().clone()
    }
}
