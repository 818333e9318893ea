use chrono::{Duration, Utc};
use lantern_core::{
    CancelOutcome, JobPriority, JobRequestBuilder, JobStatus, ProcessingJob, TaskCategory,
};
use lantern_error::{BuilderErrorKind, JobErrorKind, LanternError, LanternErrorKind};
use serde_json::json;

fn chat_job() -> anyhow::Result<ProcessingJob> {
    let request = JobRequestBuilder::default()
        .name("screening-chat")
        .task_category(TaskCategory::Chat)
        .prompt("Draft interview questions for a backend role")
        .submitted_by("recruiter-1")
        .build()?;
    Ok(ProcessingJob::from_request(request))
}

#[test]
fn new_job_is_pending_without_model() -> anyhow::Result<()> {
    let job = chat_job()?;
    assert_eq!(*job.status(), JobStatus::Pending);
    assert!(job.model().is_none());
    assert_eq!(*job.priority(), JobPriority::Normal);
    assert_eq!(job.submitted_by(), "recruiter-1");
    Ok(())
}

#[test]
fn unnamed_job_gets_generated_name() -> anyhow::Result<()> {
    let request = JobRequestBuilder::default()
        .task_category(TaskCategory::Embedding)
        .prompt("senior rust engineer")
        .build()?;
    let job = ProcessingJob::from_request(request);
    assert!(job.name().starts_with("embedding-"));
    assert_eq!(job.submitted_by(), "anonymous");
    Ok(())
}

#[test]
fn completed_job_records_processing_time() -> anyhow::Result<()> {
    let mut job = chat_job()?;
    let started = Utc::now();
    let finished = started + Duration::milliseconds(1_250);

    job.start("chat-large", started)?;
    job.complete(json!({"text": "1. Tell me about..."}), 42, finished)?;

    assert_eq!(*job.status(), JobStatus::Completed);
    assert_eq!(job.model().as_deref(), Some("chat-large"));
    assert_eq!(*job.token_count(), Some(42));
    let started_at = job.started_at().expect("started");
    let completed_at = job.completed_at().expect("completed");
    assert!(started_at <= completed_at);
    let expected = (completed_at - started_at).num_microseconds().unwrap() as f64 / 1e6;
    assert_eq!(*job.processing_time(), Some(expected));
    assert!((expected - 1.25).abs() < 1e-9);
    Ok(())
}

#[test]
fn failure_before_start_has_no_processing_time() -> anyhow::Result<()> {
    let mut job = chat_job()?;
    job.fail("No available model for task category chat", Utc::now())?;

    assert_eq!(*job.status(), JobStatus::Failed);
    assert!(job.processing_time().is_none());
    assert!(job.error_message().as_deref().unwrap().contains("No available model"));
    Ok(())
}

#[test]
fn terminal_job_rejects_transitions() -> anyhow::Result<()> {
    let mut job = chat_job()?;
    job.start("chat-large", Utc::now())?;
    job.fail("connection refused", Utc::now())?;

    let err = job.complete(json!({}), 1, Utc::now()).unwrap_err();
    assert!(matches!(err.kind, JobErrorKind::InvalidTransition { .. }));
    assert_eq!(*job.status(), JobStatus::Failed);
    Ok(())
}

#[test]
fn cancel_only_succeeds_while_pending() -> anyhow::Result<()> {
    let mut pending = chat_job()?;
    assert_eq!(pending.cancel(Utc::now()), CancelOutcome::Cancelled);
    assert_eq!(*pending.status(), JobStatus::Cancelled);

    let mut running = chat_job()?;
    running.start("chat-large", Utc::now())?;
    assert_eq!(running.cancel(Utc::now()), CancelOutcome::Requested);
    assert_eq!(*running.status(), JobStatus::Processing);
    assert!(*running.cancel_requested());

    running.complete(json!({"text": "done"}), 3, Utc::now())?;
    assert_eq!(
        running.cancel(Utc::now()),
        CancelOutcome::AlreadyFinished(JobStatus::Completed)
    );
    Ok(())
}

#[test]
fn request_without_prompt_names_the_missing_field() {
    let err = JobRequestBuilder::default()
        .task_category(TaskCategory::Chat)
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), &BuilderErrorKind::MissingField("prompt".into()));

    let err: LanternError = err.into();
    assert!(matches!(err.kind(), LanternErrorKind::Builder(_)));
    assert!(err.to_string().contains("Missing required field: prompt"));
}
