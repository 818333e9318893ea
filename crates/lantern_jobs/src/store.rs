//! In-memory job store.

use async_trait::async_trait;
use lantern_core::{JobStatus, ProcessingJob};
use lantern_error::{JobError, JobErrorKind, JobResult};
use lantern_interface::JobStore;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

/// Job records in a lock-guarded map.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<Uuid, ProcessingJob>>,
}

impl InMemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: &ProcessingJob) -> JobResult<()> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if jobs.contains_key(job.id()) {
            return Err(JobError::new(JobErrorKind::Store(format!(
                "job {} already exists",
                job.id()
            ))));
        }
        jobs.insert(*job.id(), job.clone());
        Ok(())
    }

    async fn update(&self, job: &ProcessingJob) -> JobResult<()> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        match jobs.get_mut(job.id()) {
            Some(stored) => {
                *stored = job.clone();
                Ok(())
            }
            None => Err(JobError::new(JobErrorKind::NotFound(job.id().to_string()))),
        }
    }

    async fn get(&self, id: Uuid) -> JobResult<Option<ProcessingJob>> {
        Ok(self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned())
    }

    async fn list(&self, status: Option<JobStatus>) -> JobResult<Vec<ProcessingJob>> {
        let mut jobs: Vec<_> = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|job| status.is_none_or(|s| *job.status() == s))
            .cloned()
            .collect();
        jobs.sort_by_key(|job| *job.created_at());
        Ok(jobs)
    }
}
