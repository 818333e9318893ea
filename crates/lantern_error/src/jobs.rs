//! Job queue and worker errors.

/// Job lifecycle error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum JobErrorKind {
    /// Selector found no active, server-confirmed model for the category
    #[display("No available model for task category {}", _0)]
    NoModelAvailable(String),

    /// Submission rejected because the bounded queue is full
    #[display("Job queue saturated (capacity {})", capacity)]
    QueueSaturated {
        /// Outstanding jobs the queue admits (workers + waiting slots)
        capacity: usize,
    },

    /// The state machine does not allow this transition
    #[display("Invalid job transition from {} to {}", from, to)]
    InvalidTransition {
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// No job with this identifier
    #[display("Job not found: {}", _0)]
    NotFound(String),

    /// Inference call failed for the job
    #[display("Inference failed: {}", _0)]
    Inference(String),

    /// Job or usage store rejected an operation
    #[display("Store error: {}", _0)]
    Store(String),

    /// The queue no longer accepts work
    #[display("Job queue is shut down")]
    ShutDown,
}

/// Job error with location tracking.
///
/// # Examples
///
/// ```
/// use lantern_error::{JobError, JobErrorKind};
///
/// let err = JobError::new(JobErrorKind::QueueSaturated { capacity: 4 });
/// assert!(format!("{}", err).contains("saturated"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Job Error: {} at line {} in {}", kind, line, file)]
pub struct JobError {
    /// The error kind
    pub kind: JobErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// File where error occurred
    pub file: &'static str,
}

impl JobError {
    /// Create a new JobError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: JobErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &JobErrorKind {
        &self.kind
    }
}

/// Result type for job operations.
pub type JobResult<T> = Result<T, JobError>;
