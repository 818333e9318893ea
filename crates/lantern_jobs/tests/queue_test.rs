//! Job lifecycle through the queue and worker pool.

mod test_utils;

use anyhow::Result;
use futures::future::join_all;
use lantern_core::{CancelOutcome, JobPriority, JobRequest, JobRequestBuilder, JobStatus, TaskCategory};
use lantern_error::JobErrorKind;
use lantern_jobs::TaskHandler;
use lantern_models::ModelDescriptor;
use serde_json::json;
use strum::IntoEnumIterator;
use std::sync::Arc;
use std::time::Duration;
use test_utils::{FakeDriver, SlowStore, eventually, harness, harness_with_store};

fn request(category: TaskCategory, prompt: &str) -> JobRequest {
    JobRequestBuilder::default()
        .task_category(category)
        .prompt(prompt)
        .submitted_by("recruiting-pipeline")
        .build()
        .unwrap()
}

fn prioritized(prompt: &str, priority: JobPriority) -> JobRequest {
    JobRequestBuilder::default()
        .task_category(TaskCategory::TextGeneration)
        .prompt(prompt)
        .priority(priority)
        .build()
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn excess_submissions_are_rejected_not_blocked() -> Result<()> {
    let h = harness(
        2,
        2,
        FakeDriver::gated(&["llama3.1:8b"]),
        vec![ModelDescriptor::new("m1", "llama3.1:8b", TaskCategory::Chat).with_priority(10)],
    );

    let results = join_all((0..5).map(|i| h.queue.submit(request(TaskCategory::Chat, &format!("job {i}"))))).await;
    let admitted: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
    let rejected: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();

    assert_eq!(admitted.len(), 4);
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].kind, JobErrorKind::QueueSaturated { capacity: 4 });

    eventually(|| h.driver.calls() == 2).await;
    let stats = h.queue.stats();
    assert_eq!(stats.processing, 2);
    assert_eq!(stats.pending, 2);
    assert_eq!(stats.rejected, 1);

    h.driver.release(4);
    for id in &admitted {
        let job = h.queue.wait(*id).await?;
        assert_eq!(*job.status(), JobStatus::Completed);
        assert_eq!(job.model().as_deref(), Some("m1"));
        assert_eq!(job.output_data().as_ref().unwrap()["text"], json!("1 messages"));
    }

    let metrics = h.registry.get("m1").unwrap().metrics();
    assert_eq!(*metrics.total_requests(), 4);
    assert_eq!(*metrics.failed_requests(), 0);
    let totals = h.usage.totals(Some("m1")).await?;
    assert_eq!(totals.requests, 4);
    assert_eq!(totals.tokens, 20);
    assert_eq!(h.queue.stats().completed, 4);
    Ok(())
}

#[tokio::test]
async fn capacity_frees_up_as_jobs_finish() -> Result<()> {
    let h = harness(
        1,
        1,
        FakeDriver::open(&["llama3.1:8b"]),
        vec![ModelDescriptor::new("writer", "llama3.1:8b", TaskCategory::TextGeneration)],
    );

    for i in 0..6 {
        let job = h
            .queue
            .submit_and_wait(request(TaskCategory::TextGeneration, &format!("write ad {i}")))
            .await?;
        assert_eq!(*job.status(), JobStatus::Completed);
        assert_eq!(*job.token_count(), Some(3));
        assert!(job.processing_time().is_some());
    }
    assert_eq!(h.queue.stats().rejected, 0);
    Ok(())
}

#[tokio::test]
async fn no_model_fails_without_calling_the_server() -> Result<()> {
    let h = harness(
        1,
        1,
        FakeDriver::open(&["llama3.1:8b"]),
        vec![
            ModelDescriptor::new("chat", "llama3.1:8b", TaskCategory::Chat),
            ModelDescriptor::new("unloaded", "qwen2.5:14b", TaskCategory::Translation),
        ],
    );

    for category in [TaskCategory::Embedding, TaskCategory::Translation] {
        let job = h.queue.submit_and_wait(request(category, "anything")).await?;
        assert_eq!(*job.status(), JobStatus::Failed);
        assert!(job.model().is_none());
        assert!(job.processing_time().is_none());
        assert!(job
            .error_message()
            .as_deref()
            .unwrap()
            .contains("No available model"));
    }

    assert_eq!(h.driver.calls(), 0);
    assert_eq!(*h.registry.get("unloaded").unwrap().metrics().total_requests(), 0);
    assert!(h.usage.all().await?.is_empty());
    assert_eq!(h.queue.stats().failed, 2);
    Ok(())
}

#[tokio::test]
async fn inference_failure_is_recorded_everywhere() -> Result<()> {
    let h = harness(
        1,
        1,
        FakeDriver::open(&["mistral:7b"]),
        vec![ModelDescriptor::new("summarizer", "mistral:7b", TaskCategory::Summarization)],
    );
    h.driver.set_failing(true);

    let job = h
        .queue
        .submit_and_wait(request(TaskCategory::Summarization, "summarize"))
        .await?;

    assert_eq!(*job.status(), JobStatus::Failed);
    assert_eq!(job.model().as_deref(), Some("summarizer"));
    assert!(job.processing_time().is_some());
    let message = job.error_message().clone().unwrap();
    assert!(message.contains("4 attempts"), "{message}");
    assert!(message.contains("timed out"), "{message}");

    let metrics = h.registry.get("summarizer").unwrap().metrics();
    assert_eq!(*metrics.total_requests(), 1);
    assert_eq!(*metrics.failed_requests(), 1);
    assert_eq!(metrics.success_rate(), Some(0.0));

    let totals = h.usage.totals(None).await?;
    assert_eq!(totals.failures, 1);
    assert_eq!(totals.successes, 0);

    let failed = h.queue.list(Some(JobStatus::Failed)).await?;
    assert_eq!(failed.len(), 1);
    Ok(())
}

#[tokio::test]
async fn finished_job_stays_visible_while_its_record_is_written() -> Result<()> {
    let h = harness_with_store(
        1,
        1,
        FakeDriver::gated(&["llama3.1:8b"]),
        vec![ModelDescriptor::new("writer", "llama3.1:8b", TaskCategory::TextGeneration)],
        Arc::new(SlowStore::new(Duration::from_millis(300))),
    );

    let id = h.queue.submit(request(TaskCategory::TextGeneration, "slow write")).await?;
    eventually(|| h.driver.calls() == 1).await;
    h.driver.release(1);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let current = h.queue.get(id).await?.expect("job is known");
    assert_eq!(*current.status(), JobStatus::Completed);
    assert_eq!(
        h.queue.cancel(id).await?,
        CancelOutcome::AlreadyFinished(JobStatus::Completed)
    );
    assert_eq!(*h.queue.wait(id).await?.status(), JobStatus::Completed);
    assert_eq!(h.queue.list(Some(JobStatus::Completed)).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn unroutable_and_cancelled_jobs_are_terminal_for_waiters() -> Result<()> {
    let h = harness_with_store(
        1,
        1,
        FakeDriver::gated(&["llama3.1:8b"]),
        vec![ModelDescriptor::new("writer", "llama3.1:8b", TaskCategory::TextGeneration)],
        Arc::new(SlowStore::new(Duration::from_millis(300))),
    );

    let running = h.queue.submit(request(TaskCategory::TextGeneration, "first")).await?;
    eventually(|| h.driver.calls() == 1).await;
    let waiting = h.queue.submit(request(TaskCategory::TextGeneration, "second")).await?;
    let (outcome, waited) = tokio::join!(h.queue.cancel(waiting), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.queue.wait(waiting).await
    });
    assert_eq!(outcome?, CancelOutcome::Cancelled);
    assert_eq!(*waited?.status(), JobStatus::Cancelled);

    h.driver.release(1);
    assert_eq!(*h.queue.wait(running).await?.status(), JobStatus::Completed);

    let orphan = h.queue.submit(request(TaskCategory::Embedding, "no embedder")).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let failed = h.queue.wait(orphan).await?;
    assert_eq!(*failed.status(), JobStatus::Failed);
    assert_eq!(h.driver.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn only_pending_jobs_can_be_cancelled() -> Result<()> {
    let h = harness(
        1,
        1,
        FakeDriver::gated(&["llama3.1:8b"]),
        vec![ModelDescriptor::new("writer", "llama3.1:8b", TaskCategory::TextGeneration)],
    );

    let running = h.queue.submit(request(TaskCategory::TextGeneration, "first")).await?;
    eventually(|| h.driver.calls() == 1).await;
    let waiting = h.queue.submit(request(TaskCategory::TextGeneration, "second")).await?;

    assert_eq!(h.queue.cancel(waiting).await?, CancelOutcome::Cancelled);
    assert_eq!(h.queue.status(waiting).await?, JobStatus::Cancelled);
    assert_eq!(h.queue.cancel(running).await?, CancelOutcome::Requested);
    assert_eq!(h.queue.status(running).await?, JobStatus::Processing);

    h.driver.release(1);
    let finished = h.queue.wait(running).await?;
    assert_eq!(*finished.status(), JobStatus::Completed);
    assert!(*finished.cancel_requested());

    assert_eq!(
        h.queue.cancel(running).await?,
        CancelOutcome::AlreadyFinished(JobStatus::Completed)
    );
    assert_eq!(
        h.queue.cancel(waiting).await?,
        CancelOutcome::AlreadyFinished(JobStatus::Cancelled)
    );
    assert_eq!(*h.queue.wait(waiting).await?.status(), JobStatus::Cancelled);

    assert_eq!(h.driver.calls(), 1);
    assert_eq!(*h.registry.get("writer").unwrap().metrics().total_requests(), 1);
    assert_eq!(h.queue.stats().cancelled, 1);

    let unknown = h.queue.cancel(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(unknown.kind, JobErrorKind::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn higher_priority_drains_first_fifo_within_class() -> Result<()> {
    let h = harness(
        1,
        8,
        FakeDriver::gated(&["llama3.1:8b"]),
        vec![ModelDescriptor::new("writer", "llama3.1:8b", TaskCategory::TextGeneration)],
    );

    let blocker = h.queue.submit(prioritized("blocker", JobPriority::Normal)).await?;
    eventually(|| h.driver.calls() == 1).await;

    let mut ids = vec![blocker];
    for (prompt, priority) in [
        ("low", JobPriority::Low),
        ("normal-1", JobPriority::Normal),
        ("urgent", JobPriority::Urgent),
        ("normal-2", JobPriority::Normal),
        ("high", JobPriority::High),
    ] {
        ids.push(h.queue.submit(prioritized(prompt, priority)).await?);
    }

    h.driver.release(ids.len());
    for id in ids {
        h.queue.wait(id).await?;
    }

    assert_eq!(
        h.driver.prompts(),
        vec!["blocker", "urgent", "high", "normal-1", "normal-2", "low"]
    );
    Ok(())
}

#[tokio::test]
async fn chat_history_and_embeddings_reach_the_driver() -> Result<()> {
    let h = harness(
        2,
        2,
        FakeDriver::open(&["llama3.1:8b", "nomic-embed-text:latest"]),
        vec![
            ModelDescriptor::new("chat", "llama3.1:8b", TaskCategory::Chat),
            ModelDescriptor::new("embedder", "nomic-embed-text", TaskCategory::Embedding),
        ],
    );

    let chat = JobRequestBuilder::default()
        .task_category(TaskCategory::Chat)
        .prompt("And the salary range?")
        .input_data(json!({"messages": [
            {"role": "user", "content": "Tell me about the role."},
            {"role": "assistant", "content": "It is a backend position."}
        ]}))
        .build()?;
    let job = h.queue.submit_and_wait(chat).await?;
    assert_eq!(job.output_data().as_ref().unwrap()["text"], json!("3 messages"));

    let job = h
        .queue
        .submit_and_wait(request(TaskCategory::Embedding, "distributed systems"))
        .await?;
    let output = job.output_data().clone().unwrap();
    assert_eq!(output["dimensions"], json!(3));
    assert_eq!(output["embedding"], json!([0.5, 0.25, 0.125]));
    assert_eq!(*job.token_count(), Some(0));
    Ok(())
}

#[tokio::test]
async fn malformed_chat_history_fails_the_job() -> Result<()> {
    let h = harness(
        1,
        1,
        FakeDriver::open(&["llama3.1:8b"]),
        vec![ModelDescriptor::new("chat", "llama3.1:8b", TaskCategory::Chat)],
    );
    let bad = JobRequestBuilder::default()
        .task_category(TaskCategory::Chat)
        .prompt("hi")
        .input_data(json!({"messages": "not a list"}))
        .build()?;

    let job = h.queue.submit_and_wait(bad).await?;
    assert_eq!(*job.status(), JobStatus::Failed);
    assert!(job.error_message().as_deref().unwrap().contains("messages"));
    assert_eq!(h.driver.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn shutdown_cancels_waiting_jobs_and_refuses_new_ones() -> Result<()> {
    let h = harness(
        1,
        4,
        FakeDriver::gated(&["llama3.1:8b"]),
        vec![ModelDescriptor::new("writer", "llama3.1:8b", TaskCategory::TextGeneration)],
    );

    let running = h.queue.submit(request(TaskCategory::TextGeneration, "first")).await?;
    eventually(|| h.driver.calls() == 1).await;
    let waiting = h.queue.submit(request(TaskCategory::TextGeneration, "second")).await?;

    let releaser = {
        let driver = h.driver.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            driver.release(1);
        })
    };
    h.queue.shutdown().await;
    releaser.await?;

    assert!(h.queue.is_shut_down());
    assert_eq!(h.queue.status(running).await?, JobStatus::Completed);
    assert_eq!(h.queue.status(waiting).await?, JobStatus::Cancelled);

    let err = h
        .queue
        .submit(request(TaskCategory::TextGeneration, "late"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, JobErrorKind::ShutDown);

    h.queue.shutdown().await;
    Ok(())
}

#[test]
fn every_category_has_a_handler() {
    for category in TaskCategory::iter() {
        let handler = TaskHandler::for_category(category);
        match category {
            TaskCategory::Chat => assert_eq!(handler, TaskHandler::Chat),
            TaskCategory::Embedding => assert_eq!(handler, TaskHandler::Embed),
            _ => assert_eq!(handler, TaskHandler::Generate),
        }
    }
}
