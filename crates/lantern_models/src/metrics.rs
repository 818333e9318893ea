//! Running request statistics of one model.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Request counters and latency of one model.
///
/// Latency is a running mean updated incrementally, so no sum is stored.
///
/// # Examples
///
/// ```
/// use lantern_models::ModelMetrics;
///
/// let mut metrics = ModelMetrics::default();
/// assert_eq!(metrics.success_rate(), None);
///
/// metrics.record(2.0, true);
/// metrics.record(4.0, false);
/// assert_eq!(*metrics.average_latency(), 3.0);
/// assert_eq!(metrics.success_rate(), Some(0.5));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, Getters)]
pub struct ModelMetrics {
    /// Requests recorded
    total_requests: u64,
    /// Requests that failed
    failed_requests: u64,
    /// Mean latency in seconds
    average_latency: f64,
}

impl ModelMetrics {
    /// Record one request.
    pub fn record(&mut self, elapsed_seconds: f64, success: bool) {
        self.total_requests += 1;
        if !success {
            self.failed_requests += 1;
        }
        self.average_latency +=
            (elapsed_seconds - self.average_latency) / self.total_requests as f64;
    }

    /// Fraction of requests that succeeded; `None` before the first request.
    pub fn success_rate(&self) -> Option<f64> {
        if self.total_requests == 0 {
            None
        } else {
            Some((self.total_requests - self.failed_requests) as f64 / self.total_requests as f64)
        }
    }

    /// Zero every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
