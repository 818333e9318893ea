//! Per-model, per-submitter, per-day usage aggregates.

use chrono::NaiveDate;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Composite key of a usage record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UsageKey {
    /// Logical model name
    pub model: String,
    /// Submitter identity
    pub submitter: String,
    /// Calendar day (UTC)
    pub day: NaiveDate,
}

impl UsageKey {
    /// Create a new key.
    pub fn new(model: impl Into<String>, submitter: impl Into<String>, day: NaiveDate) -> Self {
        Self {
            model: model.into(),
            submitter: submitter.into(),
            day,
        }
    }
}

/// Aggregate counters for one key.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use lantern_core::{UsageKey, UsageRecord};
///
/// let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
/// let mut record = UsageRecord::new(UsageKey::new("chat-large", "recruiter-7", day));
/// record.apply(120, 1.5, true);
/// record.apply(0, 0.5, false);
///
/// assert_eq!(*record.request_count(), 2);
/// assert_eq!(record.success_rate(), Some(0.5));
/// assert_eq!(record.average_processing_time(), Some(1.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct UsageRecord {
    key: UsageKey,
    request_count: u64,
    token_count: u64,
    /// Cumulative processing time in seconds
    processing_time: f64,
    success_count: u64,
    failure_count: u64,
}

impl UsageRecord {
    /// Create a record with zero counters.
    pub fn new(key: UsageKey) -> Self {
        Self {
            key,
            request_count: 0,
            token_count: 0,
            processing_time: 0.0,
            success_count: 0,
            failure_count: 0,
        }
    }

    /// Count one finished job.
    pub fn apply(&mut self, tokens: u64, elapsed_seconds: f64, success: bool) {
        self.request_count += 1;
        self.token_count += tokens;
        self.processing_time += elapsed_seconds.max(0.0);
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
    }

    /// Fraction of successful requests, if any were made.
    pub fn success_rate(&self) -> Option<f64> {
        (self.request_count > 0).then(|| self.success_count as f64 / self.request_count as f64)
    }

    /// Mean processing time per request, if any were made.
    pub fn average_processing_time(&self) -> Option<f64> {
        (self.request_count > 0).then(|| self.processing_time / self.request_count as f64)
    }
}
