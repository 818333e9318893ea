//! Fake inference driver and queue harness.

#![allow(dead_code)]

use async_trait::async_trait;
use lantern_core::{ChatMessage, GenerationParams, GenerationResult, JobStatus, ProcessingJob};
use lantern_error::{ClientError, ClientErrorKind, ClientResult, JobResult};
use lantern_interface::{ChunkStream, InferenceDriver, JobStore, ModelLister};
use lantern_jobs::{InMemoryJobStore, JobQueue, JobQueueConfig};
use lantern_models::{ModelDescriptor, ModelRegistry, ModelSelector};
use lantern_usage::{InMemoryUsageStore, UsageRecorder};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Driver that answers from memory, optionally holding every call at a gate.
pub struct FakeDriver {
    models: Vec<String>,
    gate: Option<Semaphore>,
    failing: AtomicBool,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FakeDriver {
    /// Answers immediately.
    pub fn open(models: &[&str]) -> Self {
        Self::build(models, None)
    }

    /// Holds every call until [`release`](Self::release).
    pub fn gated(models: &[&str]) -> Self {
        Self::build(models, Some(Semaphore::new(0)))
    }

    fn build(models: &[&str], gate: Option<Semaphore>) -> Self {
        Self {
            models: models.iter().map(|m| m.to_string()).collect(),
            gate,
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Let `n` held calls through.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Make every later call fail with a timeout that outlasted its retries.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Calls that reached the driver, including held ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts in the order calls arrived.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    async fn enter(&self, prompt: &str) -> ClientResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ClientError::new(ClientErrorKind::RetriesExhausted {
                attempts: 4,
                cause: "Request timed out: 30s".into(),
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl ModelLister for FakeDriver {
    async fn list_models(&self) -> ClientResult<Vec<String>> {
        Ok(self.models.clone())
    }
}

#[async_trait]
impl InferenceDriver for FakeDriver {
    fn config_name(&self) -> &str {
        "fake"
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn pull_model(&self, _name: &str) -> ClientResult<bool> {
        Ok(true)
    }

    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        _system_prompt: Option<&str>,
        _params: &GenerationParams,
    ) -> ClientResult<GenerationResult> {
        self.enter(prompt).await?;
        let tokens = prompt.split_whitespace().count() as u32;
        Ok(GenerationResult::text(model, format!("echo: {prompt}"), tokens))
    }

    async fn generate_stream(
        &self,
        _model: &str,
        _prompt: &str,
        _system_prompt: Option<&str>,
        _params: &GenerationParams,
    ) -> ClientResult<ChunkStream> {
        Err(ClientError::new(ClientErrorKind::Configuration(
            "streaming not supported by fake".into(),
        )))
    }

    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        _params: &GenerationParams,
    ) -> ClientResult<GenerationResult> {
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        self.enter(last).await?;
        Ok(GenerationResult::text(
            model,
            format!("{} messages", messages.len()),
            5,
        ))
    }

    async fn chat_stream(
        &self,
        _model: &str,
        _messages: &[ChatMessage],
        _params: &GenerationParams,
    ) -> ClientResult<ChunkStream> {
        Err(ClientError::new(ClientErrorKind::Configuration(
            "streaming not supported by fake".into(),
        )))
    }

    async fn embed(&self, model: &str, text: &str) -> ClientResult<GenerationResult> {
        self.enter(text).await?;
        Ok(GenerationResult::embedding(model, vec![0.5, 0.25, 0.125]))
    }
}

/// A running queue and everything it writes to.
pub struct Harness {
    pub queue: JobQueue,
    pub driver: Arc<FakeDriver>,
    pub registry: Arc<ModelRegistry>,
    pub usage: UsageRecorder,
}

/// In-memory store whose writes of terminal records take `delay`.
pub struct SlowStore {
    inner: InMemoryJobStore,
    delay: Duration,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: InMemoryJobStore::new(),
            delay,
        }
    }
}

#[async_trait]
impl JobStore for SlowStore {
    async fn insert(&self, job: &ProcessingJob) -> JobResult<()> {
        self.inner.insert(job).await
    }

    async fn update(&self, job: &ProcessingJob) -> JobResult<()> {
        if job.status().is_terminal() {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.update(job).await
    }

    async fn get(&self, id: Uuid) -> JobResult<Option<ProcessingJob>> {
        self.inner.get(id).await
    }

    async fn list(&self, status: Option<JobStatus>) -> JobResult<Vec<ProcessingJob>> {
        self.inner.list(status).await
    }
}

/// Start a queue over `driver` with the given models registered.
pub fn harness(
    workers: usize,
    queue_size: usize,
    driver: FakeDriver,
    models: Vec<ModelDescriptor>,
) -> Harness {
    harness_with_store(
        workers,
        queue_size,
        driver,
        models,
        Arc::new(InMemoryJobStore::new()),
    )
}

/// Like [`harness`], persisting jobs into `store`.
pub fn harness_with_store(
    workers: usize,
    queue_size: usize,
    driver: FakeDriver,
    models: Vec<ModelDescriptor>,
    store: Arc<dyn JobStore>,
) -> Harness {
    let registry = Arc::new(ModelRegistry::new());
    for model in models {
        registry.register(model).unwrap();
    }
    let driver = Arc::new(driver);
    let selector = Arc::new(ModelSelector::new(
        registry.clone(),
        driver.clone(),
        Duration::from_secs(300),
    ));
    let usage = UsageRecorder::new(Arc::new(InMemoryUsageStore::new()));
    let queue = JobQueue::start(
        JobQueueConfig {
            workers,
            queue_size,
        },
        driver.clone(),
        selector,
        store,
        usage.clone(),
    );
    Harness {
        queue,
        driver,
        registry,
        usage,
    }
}

/// Poll `condition` until it holds, failing after two seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
