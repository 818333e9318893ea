//! Folding finished jobs into usage records.

use chrono::{DateTime, NaiveDate, Utc};
use lantern_core::{JobStatus, ProcessingJob, UsageKey, UsageRecord};
use lantern_error::JobResult;
use lantern_interface::UsageStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Sums over a set of usage records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    /// Requests counted
    pub requests: u64,
    /// Tokens generated
    pub tokens: u64,
    /// Cumulative processing time in seconds
    pub processing_time: f64,
    /// Successful requests
    pub successes: u64,
    /// Failed requests
    pub failures: u64,
}

impl UsageTotals {
    fn add(mut self, record: &UsageRecord) -> Self {
        self.requests += record.request_count();
        self.tokens += record.token_count();
        self.processing_time += record.processing_time();
        self.successes += record.success_count();
        self.failures += record.failure_count();
        self
    }

    /// Fraction of successful requests, if any were made.
    pub fn success_rate(&self) -> Option<f64> {
        (self.requests > 0).then(|| self.successes as f64 / self.requests as f64)
    }
}

/// Records usage and answers aggregate queries.
#[derive(Clone)]
pub struct UsageRecorder {
    store: Arc<dyn UsageStore>,
}

impl std::fmt::Debug for UsageRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageRecorder").finish_non_exhaustive()
    }
}

impl UsageRecorder {
    /// Create a recorder over `store`.
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self { store }
    }

    /// Count one request for `model` by `submitter` on the UTC day of `at`.
    #[instrument(skip(self))]
    pub async fn record(
        &self,
        model: &str,
        submitter: &str,
        at: DateTime<Utc>,
        tokens: u64,
        elapsed_seconds: f64,
        success: bool,
    ) -> JobResult<UsageRecord> {
        let key = UsageKey::new(model, submitter, at.date_naive());
        let record = self
            .store
            .increment(&key, tokens, elapsed_seconds, success)
            .await?;
        debug!(requests = record.request_count(), "Recorded usage");
        Ok(record)
    }

    /// Count a finished job.
    ///
    /// Returns `None` for jobs that never reached a model or did not end
    /// completed or failed.
    pub async fn record_job(&self, job: &ProcessingJob) -> JobResult<Option<UsageRecord>> {
        let success = match job.status() {
            JobStatus::Completed => true,
            JobStatus::Failed => false,
            _ => return Ok(None),
        };
        let Some(model) = job.model() else {
            return Ok(None);
        };
        let at = (*job.completed_at()).unwrap_or_else(Utc::now);
        let record = self
            .record(
                model,
                job.submitted_by(),
                at,
                u64::from((*job.token_count()).unwrap_or(0)),
                (*job.processing_time()).unwrap_or(0.0),
                success,
            )
            .await?;
        Ok(Some(record))
    }

    /// One record.
    pub async fn get(
        &self,
        model: &str,
        submitter: &str,
        day: NaiveDate,
    ) -> JobResult<Option<UsageRecord>> {
        self.store.get(&UsageKey::new(model, submitter, day)).await
    }

    /// Every record.
    pub async fn all(&self) -> JobResult<Vec<UsageRecord>> {
        self.store.list().await
    }

    /// Records of one model, across submitters and days.
    pub async fn for_model(&self, model: &str) -> JobResult<Vec<UsageRecord>> {
        Ok(self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|r| r.key().model == model)
            .collect())
    }

    /// Records of one day, across models and submitters.
    pub async fn for_day(&self, day: NaiveDate) -> JobResult<Vec<UsageRecord>> {
        Ok(self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|r| r.key().day == day)
            .collect())
    }

    /// Sums over every record, or those of one model.
    pub async fn totals(&self, model: Option<&str>) -> JobResult<UsageTotals> {
        let records = match model {
            Some(model) => self.for_model(model).await?,
            None => self.store.list().await?,
        };
        Ok(records.iter().fold(UsageTotals::default(), UsageTotals::add))
    }
}
