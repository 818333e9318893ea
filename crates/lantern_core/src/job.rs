//! Processing jobs and the requests that create them.

use crate::{JobPriority, JobStatus, TaskCategory};
use chrono::{DateTime, Utc};
use derive_builder::Builder;
use derive_getters::Getters;
use lantern_error::{JobError, JobErrorKind, JobResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Caller-facing job submission.
///
/// # Examples
///
/// ```
/// use lantern_core::{JobPriority, JobRequestBuilder, TaskCategory};
///
/// let request = JobRequestBuilder::default()
///     .task_category(TaskCategory::Summarization)
///     .prompt("Summarize the attached interview notes.")
///     .priority(JobPriority::High)
///     .build()
///     .unwrap();
///
/// assert_eq!(*request.priority(), JobPriority::High);
/// assert!(request.name().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder, Getters)]
#[builder(build_fn(error = "lantern_error::BuilderError"))]
pub struct JobRequest {
    /// Human-readable job name
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    name: Option<String>,

    /// What the job is for; drives model selection
    task_category: TaskCategory,

    /// Prompt text (or the text to embed)
    #[builder(setter(into))]
    prompt: String,

    /// System prompt overriding the model default
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    system_prompt: Option<String>,

    /// Draining priority
    #[builder(default)]
    #[serde(default)]
    priority: JobPriority,

    /// Arbitrary structured input (e.g. `{"messages": [...]}` for chat history)
    #[builder(default)]
    #[serde(default)]
    input_data: Value,

    /// Identity of the submitter
    #[builder(default = "\"anonymous\".to_string()", setter(into))]
    #[serde(default = "default_submitter")]
    submitted_by: String,
}

fn default_submitter() -> String {
    "anonymous".to_string()
}

/// Outcome of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job was pending and is now cancelled
    Cancelled,
    /// The job is processing; the request is recorded but the call runs on
    Requested,
    /// The job had already reached a terminal state
    AlreadyFinished(JobStatus),
}

/// A job tracked through the pending → processing → terminal state machine.
///
/// Only the worker that owns a job mutates it; once terminal it is read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct ProcessingJob {
    id: Uuid,
    name: String,
    /// Logical model name, assigned when a worker resolves one
    model: Option<String>,
    task_category: TaskCategory,
    priority: JobPriority,
    prompt: String,
    system_prompt: Option<String>,
    input_data: Value,
    status: JobStatus,
    output_data: Option<Value>,
    token_count: Option<u32>,
    /// Seconds between start and completion
    processing_time: Option<f64>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    submitted_by: String,
    cancel_requested: bool,
}

impl ProcessingJob {
    /// Create a pending job from a request.
    pub fn from_request(request: JobRequest) -> Self {
        let id = Uuid::new_v4();
        let name = request
            .name
            .unwrap_or_else(|| format!("{}-{}", request.task_category, id.simple()));
        Self {
            id,
            name,
            model: None,
            task_category: request.task_category,
            priority: request.priority,
            prompt: request.prompt,
            system_prompt: request.system_prompt,
            input_data: request.input_data,
            status: JobStatus::Pending,
            output_data: None,
            token_count: None,
            processing_time: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            submitted_by: request.submitted_by,
            cancel_requested: false,
        }
    }

    #[track_caller]
    fn transition(&mut self, next: JobStatus) -> JobResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(JobError::new(JobErrorKind::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            }));
        }
        self.status = next;
        Ok(())
    }

    fn elapsed_since_start(&self, at: DateTime<Utc>) -> Option<f64> {
        self.started_at.map(|started| {
            (at - started)
                .num_microseconds()
                .map(|us| us as f64 / 1_000_000.0)
                .unwrap_or(0.0)
        })
    }

    /// `pending → processing`: a worker claimed the job and resolved `model`.
    pub fn start(&mut self, model: impl Into<String>, at: DateTime<Utc>) -> JobResult<()> {
        self.transition(JobStatus::Processing)?;
        self.model = Some(model.into());
        self.started_at = Some(at);
        Ok(())
    }

    /// `processing → completed` with the output payload and token count.
    pub fn complete(&mut self, output: Value, token_count: u32, at: DateTime<Utc>) -> JobResult<()> {
        self.transition(JobStatus::Completed)?;
        self.output_data = Some(output);
        self.token_count = Some(token_count);
        self.completed_at = Some(at);
        self.processing_time = self.elapsed_since_start(at);
        Ok(())
    }

    /// `pending|processing → failed`, recording the error message.
    ///
    /// Processing time is recorded only when the job had started.
    pub fn fail(&mut self, message: impl Into<String>, at: DateTime<Utc>) -> JobResult<()> {
        self.transition(JobStatus::Failed)?;
        self.error_message = Some(message.into());
        self.completed_at = Some(at);
        self.processing_time = self.elapsed_since_start(at);
        Ok(())
    }

    /// Request cancellation.
    ///
    /// Only pending jobs are cancelled. A processing job keeps running; the
    /// request is recorded in `cancel_requested`.
    pub fn cancel(&mut self, at: DateTime<Utc>) -> CancelOutcome {
        match self.status {
            JobStatus::Pending => {
                self.status = JobStatus::Cancelled;
                self.completed_at = Some(at);
                CancelOutcome::Cancelled
            }
            JobStatus::Processing => {
                self.cancel_requested = true;
                CancelOutcome::Requested
            }
            terminal => CancelOutcome::AlreadyFinished(terminal),
        }
    }
}
