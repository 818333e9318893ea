//! Trait definitions for inference transports and stores.

use async_trait::async_trait;
use futures_util::stream::Stream;
use lantern_core::{
    ChatMessage, GenerationChunk, GenerationParams, GenerationResult, JobStatus, ProcessingJob,
    UsageKey, UsageRecord,
};
use lantern_error::{ClientResult, JobResult};
use std::pin::Pin;
use uuid::Uuid;

/// Finite, non-restartable sequence of partial results.
pub type ChunkStream = Pin<Box<dyn Stream<Item = ClientResult<GenerationChunk>> + Send>>;

/// Source of the model identifiers loaded on a server.
#[async_trait]
pub trait ModelLister: Send + Sync {
    /// Model identifiers currently available on the server.
    async fn list_models(&self) -> ClientResult<Vec<String>>;
}

/// Transport to one inference server configuration.
///
/// Implementations are stateless with respect to model metrics: updating
/// counters after a call is the caller's job.
#[async_trait]
pub trait InferenceDriver: ModelLister {
    /// Name of the server configuration this driver talks to.
    fn config_name(&self) -> &str;

    /// Probe the server. Never fails; returns the health verdict.
    async fn health_check(&self) -> bool;

    /// Ask the server to fetch a model. True only on an explicit success marker.
    async fn pull_model(&self, name: &str) -> ClientResult<bool>;

    /// Single-shot text generation.
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        system_prompt: Option<&str>,
        params: &GenerationParams,
    ) -> ClientResult<GenerationResult>;

    /// Streamed text generation.
    async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
        system_prompt: Option<&str>,
        params: &GenerationParams,
    ) -> ClientResult<ChunkStream>;

    /// Single-shot chat completion.
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> ClientResult<GenerationResult>;

    /// Streamed chat completion.
    async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> ClientResult<ChunkStream>;

    /// Embed text; the vector is returned in the result metadata.
    async fn embed(&self, model: &str, text: &str) -> ClientResult<GenerationResult>;
}

/// Persistence for job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Store a new job.
    async fn insert(&self, job: &ProcessingJob) -> JobResult<()>;

    /// Replace an existing job record.
    async fn update(&self, job: &ProcessingJob) -> JobResult<()>;

    /// Fetch a job by id.
    async fn get(&self, id: Uuid) -> JobResult<Option<ProcessingJob>>;

    /// List jobs, optionally filtered by status, oldest first.
    async fn list(&self, status: Option<JobStatus>) -> JobResult<Vec<ProcessingJob>>;
}

/// Persistence for usage aggregates.
///
/// `increment` must be atomic: concurrent calls on the same key never lose
/// an update.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Upsert the record for `key` and add one request's worth of counters.
    async fn increment(
        &self,
        key: &UsageKey,
        tokens: u64,
        elapsed_seconds: f64,
        success: bool,
    ) -> JobResult<UsageRecord>;

    /// Fetch a single record.
    async fn get(&self, key: &UsageKey) -> JobResult<Option<UsageRecord>>;

    /// All records, ordered by key.
    async fn list(&self) -> JobResult<Vec<UsageRecord>>;
}
