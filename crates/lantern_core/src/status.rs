//! Job status state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a processing job.
///
/// ```text
/// pending ──► processing ──► completed
///    │             └───────► failed
///    ├──────────────────────► failed      (no model available)
///    └──────────────────────► cancelled
/// ```
///
/// # Examples
///
/// ```
/// use lantern_core::JobStatus;
///
/// assert!(JobStatus::Pending.can_transition_to(JobStatus::Processing));
/// assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
/// assert!(JobStatus::Cancelled.is_terminal());
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobStatus {
    /// Waiting for a worker
    #[default]
    Pending,
    /// Claimed by a worker
    Processing,
    /// Finished with output
    Completed,
    /// Finished with an error
    Failed,
    /// Withdrawn before a worker claimed it
    Cancelled,
}

impl JobStatus {
    /// True for completed, failed and cancelled.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Pending, JobStatus::Cancelled)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}
