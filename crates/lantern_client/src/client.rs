//! HTTP client bound to one server configuration.

use crate::metrics::InferenceMetrics;
use crate::pool::{PoolPermit, RequestPool};
use crate::retry::RetryPolicy;
use crate::stream::{LineBuffer, chunk_stream, parse_chat_line, parse_generate_line};
use crate::wire::{
    ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse, GenerateRequest,
    GenerateResponse, PullRequest, PullStatus, TagsResponse, WireMessage, options_from_params,
};
use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;
use lantern_config::SharedConfiguration;
use lantern_core::{ChatMessage, GenerationParams, GenerationResult, Role, ServerConfiguration};
use lantern_error::{ClientError, ClientErrorKind, ClientResult};
use lantern_interface::{ChunkStream, InferenceDriver, ModelLister};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Either a complete result or a stream of partial results.
pub enum Generation {
    /// Single-shot response
    Complete(GenerationResult),
    /// Newline-delimited chunks, ending with a chunk marked `done`
    Streaming(ChunkStream),
}

impl std::fmt::Debug for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Generation::Complete(result) => f.debug_tuple("Complete").field(result).finish(),
            Generation::Streaming(_) => f.debug_tuple("Streaming").finish(),
        }
    }
}

/// Client for one inference server.
///
/// Connection settings are read from the shared configuration when the
/// client is built; health checks write their verdict back to it.
pub struct InferenceClient {
    config: SharedConfiguration,
    settings: ServerConfiguration,
    http: reqwest::Client,
    pool: Arc<RequestPool>,
    retry: RetryPolicy,
    health_timeout: Duration,
    metrics: InferenceMetrics,
}

impl std::fmt::Debug for InferenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceClient")
            .field("server", &self.settings.name)
            .field("base_url", &self.settings.base_url())
            .field("retry", &self.retry)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

fn transport_error(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::new(ClientErrorKind::Timeout(e.to_string()))
    } else if e.is_decode() {
        ClientError::new(ClientErrorKind::Decode(e.to_string()))
    } else {
        ClientError::new(ClientErrorKind::Connection(e.to_string()))
    }
}

async fn check_status(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ClientError::new(ClientErrorKind::Unauthorized(status.as_u16())));
    }
    let message = match response.text().await {
        Ok(body) if !body.is_empty() => body,
        _ => status.canonical_reason().unwrap_or("unknown").to_string(),
    };
    Err(ClientError::new(ClientErrorKind::Server {
        status: status.as_u16(),
        message,
    }))
}

impl InferenceClient {
    /// Build a client for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientErrorKind::Configuration`] if the configuration is
    /// invalid or the HTTP client cannot be built.
    pub fn new(config: SharedConfiguration) -> ClientResult<Self> {
        let settings = config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        settings
            .validate()
            .map_err(|e| ClientError::new(ClientErrorKind::Configuration(e.message)))?;

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(settings.timeout()))
            .build()
            .map_err(|e| ClientError::new(ClientErrorKind::Configuration(e.to_string())))?;

        debug!(
            server = %settings.name,
            base_url = %settings.base_url(),
            max_concurrent = settings.max_concurrent_requests,
            queue = settings.request_queue_size,
            "Created inference client"
        );

        Ok(Self {
            pool: Arc::new(RequestPool::new(
                settings.max_concurrent_requests,
                settings.request_queue_size,
            )),
            retry: RetryPolicy::new(settings.max_retries, settings.retry_delay()),
            http,
            settings,
            config,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            metrics: InferenceMetrics::default(),
        })
    }

    /// Override the health probe timeout.
    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    /// Configuration the client was built from.
    pub fn settings(&self) -> &ServerConfiguration {
        &self.settings
    }

    /// Shared configuration the client reports health to.
    pub fn config(&self) -> &SharedConfiguration {
        &self.config
    }

    /// Request pool of this configuration.
    pub fn pool(&self) -> &Arc<RequestPool> {
        &self.pool
    }

    /// Retry policy of this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Stop accepting requests. Waiting callers fail with
    /// [`ClientErrorKind::Closed`]; in-flight calls finish. Idempotent.
    pub fn close(&self) {
        if !self.pool.is_closed() {
            info!(server = %self.settings.name, "Closing inference client");
        }
        self.pool.close();
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.settings.base_url(), path);
        let builder = self.http.request(method, url);
        if let Some(token) = &self.settings.api_key {
            builder.bearer_auth(token)
        } else if let Some(user) = &self.settings.username {
            builder.basic_auth(user, self.settings.password.as_deref())
        } else {
            builder
        }
    }

    async fn acquire(&self, operation: &str) -> ClientResult<PoolPermit> {
        self.pool.acquire().await.inspect_err(|e| {
            self.metrics
                .record_error(&self.settings.name, operation, e.kind.label());
        })
    }

    async fn attempt_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        timeout: Duration,
    ) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.request(method, path).timeout(timeout);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(transport_error)?;
        let response = check_status(response).await?;
        response.json::<T>().await.map_err(transport_error)
    }

    async fn attempt_open<B>(&self, path: &str, body: &B) -> ClientResult<Response>
    where
        B: Serialize + ?Sized,
    {
        let timeout = self.settings.timeout();
        let send = self.request(Method::POST, path).json(body).send();
        let response = match tokio::time::timeout(timeout, send).await {
            Ok(sent) => sent.map_err(transport_error)?,
            Err(_) => {
                return Err(ClientError::new(ClientErrorKind::Timeout(format!(
                    "no response within {:?}",
                    timeout
                ))));
            }
        };
        check_status(response).await
    }

    fn finish<T>(&self, operation: &str, started: Instant, result: ClientResult<T>) -> ClientResult<T> {
        match &result {
            Ok(_) => self.metrics.record_request(
                &self.settings.name,
                operation,
                started.elapsed().as_secs_f64(),
            ),
            Err(e) => {
                warn!(server = %self.settings.name, operation, error = %e, "Inference call failed");
                self.metrics
                    .record_error(&self.settings.name, operation, e.kind.label());
            }
        }
        result
    }

    /// Single-shot JSON call with pooling and retry.
    async fn call<B, T>(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let _permit = self.acquire(operation).await?;
        let started = Instant::now();
        let timeout = self.settings.timeout();
        let result = self
            .retry
            .run(move |attempt| {
                if attempt > 0 {
                    self.metrics.record_retry(&self.settings.name, operation);
                }
                self.attempt_json(method.clone(), path, body, timeout)
            })
            .await;
        self.finish(operation, started, result)
    }

    /// Open a streamed POST with pooling and retry on the initial exchange.
    async fn open<B>(&self, operation: &str, path: &str, body: &B) -> ClientResult<(PoolPermit, Response)>
    where
        B: Serialize + ?Sized,
    {
        let permit = self.acquire(operation).await?;
        let started = Instant::now();
        let result = self
            .retry
            .run(move |attempt| {
                if attempt > 0 {
                    self.metrics.record_retry(&self.settings.name, operation);
                }
                self.attempt_open(path, body)
            })
            .await;
        let response = self.finish(operation, started, result)?;
        Ok((permit, response))
    }

    /// Probe the server with a short timeout and record the verdict.
    ///
    /// The probe bypasses the request pool: a pool full of slow generations
    /// says nothing about the server being down. Never fails: an unreachable
    /// server, an error status or a closed client all count as unhealthy.
    #[instrument(skip(self), fields(server = %self.settings.name))]
    pub async fn health_check(&self) -> bool {
        let healthy = if self.pool.is_closed() {
            debug!("Client closed, skipping health probe");
            false
        } else {
            match self
                .attempt_json::<(), TagsResponse>(Method::GET, "/api/tags", None, self.health_timeout)
                .await
            {
                Ok(_) => true,
                Err(e) => {
                    debug!(error = %e, timeout = ?self.health_timeout, "Health probe failed");
                    false
                }
            }
        };

        self.config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .record_health(healthy, Utc::now());
        info!(healthy, "Health check complete");
        healthy
    }

    /// Identifiers of the models present on the server.
    #[instrument(skip(self), fields(server = %self.settings.name))]
    pub async fn list_models(&self) -> ClientResult<Vec<String>> {
        let tags: TagsResponse = self
            .call::<(), _>("list_models", Method::GET, "/api/tags", None)
            .await?;
        debug!(count = tags.models.len(), "Listed models");
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Ask the server to fetch `name`, following its progress lines.
    ///
    /// Returns true only when a line reports status `"success"`.
    #[instrument(skip(self), fields(server = %self.settings.name))]
    pub async fn pull_model(&self, name: &str) -> ClientResult<bool> {
        let body = PullRequest {
            name: name.to_string(),
            stream: true,
        };
        let (_permit, response) = self.open("pull_model", "/api/pull", &body).await?;

        let mut bytes = response.bytes_stream();
        let mut lines = LineBuffer::default();
        let check = |line: &[u8]| -> ClientResult<bool> {
            let status: PullStatus = serde_json::from_slice(line)
                .map_err(|e| ClientError::new(ClientErrorKind::Decode(e.to_string())))?;
            if let Some(error) = status.error {
                return Err(ClientError::new(ClientErrorKind::PullFailed(error)));
            }
            debug!(status = %status.status, completed = ?status.completed, total = ?status.total, "Pull progress");
            Ok(status.status == "success")
        };

        let idle = self.settings.timeout();
        loop {
            let read = match tokio::time::timeout(idle, bytes.next()).await {
                Ok(Some(read)) => read.map_err(transport_error)?,
                Ok(None) => break,
                Err(_) => {
                    warn!(model = name, ?idle, "Pull progress stalled");
                    return Err(ClientError::new(ClientErrorKind::Timeout(format!(
                        "no pull progress within {:?}",
                        idle
                    ))));
                }
            };
            for line in lines.push(&read) {
                if check(&line)? {
                    info!(model = name, "Model pulled");
                    return Ok(true);
                }
            }
        }
        if let Some(tail) = lines.finish()
            && check(&tail)?
        {
            info!(model = name, "Model pulled");
            return Ok(true);
        }
        warn!(model = name, "Pull ended without success marker");
        Ok(false)
    }

    fn generate_body(
        model: &str,
        prompt: &str,
        system_prompt: Option<&str>,
        params: &GenerationParams,
        stream: bool,
    ) -> GenerateRequest {
        GenerateRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            system: system_prompt
                .map(str::to_string)
                .or_else(|| params.system_prompt.clone()),
            stream,
            options: options_from_params(params),
        }
    }

    fn chat_body(
        model: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
        stream: bool,
    ) -> ChatRequest {
        let mut wire: Vec<WireMessage> = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = &params.system_prompt
            && !messages.iter().any(|m| m.role == Role::System)
        {
            wire.push(WireMessage::from(&ChatMessage::system(system.clone())));
        }
        wire.extend(messages.iter().map(WireMessage::from));
        ChatRequest {
            model: model.to_string(),
            messages: wire,
            stream,
            options: options_from_params(params),
        }
    }

    fn completed(&self, model: &str, mut result: GenerationResult) -> GenerationResult {
        if result.model.is_empty() {
            result.model = model.to_string();
        }
        self.metrics
            .record_tokens(&result.model, u64::from(result.token_count));
        result
    }

    /// Generate text in one response.
    ///
    /// An explicit `system_prompt` wins over `params.system_prompt`.
    #[instrument(skip(self, prompt, system_prompt, params), fields(server = %self.settings.name))]
    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        system_prompt: Option<&str>,
        params: &GenerationParams,
    ) -> ClientResult<GenerationResult> {
        let body = Self::generate_body(model, prompt, system_prompt, params, false);
        let response: GenerateResponse = self
            .call("generate", Method::POST, "/api/generate", Some(&body))
            .await?;
        Ok(self.completed(model, response.into_result()))
    }

    /// Generate text as a stream of chunks.
    ///
    /// The pool slot is held until the stream ends or is dropped.
    #[instrument(skip(self, prompt, system_prompt, params), fields(server = %self.settings.name))]
    pub async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
        system_prompt: Option<&str>,
        params: &GenerationParams,
    ) -> ClientResult<ChunkStream> {
        let body = Self::generate_body(model, prompt, system_prompt, params, true);
        let (permit, response) = self.open("generate_stream", "/api/generate", &body).await?;
        Ok(chunk_stream(
            response.bytes_stream(),
            Some(permit),
            self.settings.timeout(),
            parse_generate_line,
        ))
    }

    /// Generate text, streamed or not.
    pub async fn generate_with(
        &self,
        model: &str,
        prompt: &str,
        system_prompt: Option<&str>,
        params: &GenerationParams,
        stream: bool,
    ) -> ClientResult<Generation> {
        if stream {
            self.generate_stream(model, prompt, system_prompt, params)
                .await
                .map(Generation::Streaming)
        } else {
            self.generate(model, prompt, system_prompt, params)
                .await
                .map(Generation::Complete)
        }
    }

    /// Complete a conversation in one response.
    ///
    /// `params.system_prompt` is prepended unless `messages` already carries
    /// a system message.
    #[instrument(skip(self, messages, params), fields(server = %self.settings.name, messages = messages.len()))]
    pub async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> ClientResult<GenerationResult> {
        let body = Self::chat_body(model, messages, params, false);
        let response: ChatResponse = self
            .call("chat", Method::POST, "/api/chat", Some(&body))
            .await?;
        Ok(self.completed(model, response.into_result()))
    }

    /// Complete a conversation as a stream of chunks.
    #[instrument(skip(self, messages, params), fields(server = %self.settings.name, messages = messages.len()))]
    pub async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> ClientResult<ChunkStream> {
        let body = Self::chat_body(model, messages, params, true);
        let (permit, response) = self.open("chat_stream", "/api/chat", &body).await?;
        Ok(chunk_stream(
            response.bytes_stream(),
            Some(permit),
            self.settings.timeout(),
            parse_chat_line,
        ))
    }

    /// Complete a conversation, streamed or not.
    pub async fn chat_with(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
        stream: bool,
    ) -> ClientResult<Generation> {
        if stream {
            self.chat_stream(model, messages, params)
                .await
                .map(Generation::Streaming)
        } else {
            self.chat(model, messages, params)
                .await
                .map(Generation::Complete)
        }
    }

    /// Embed `text`; the vector is in the result metadata.
    #[instrument(skip(self, text), fields(server = %self.settings.name))]
    pub async fn embed(&self, model: &str, text: &str) -> ClientResult<GenerationResult> {
        let body = EmbeddingsRequest {
            model: model.to_string(),
            prompt: text.to_string(),
        };
        let response: EmbeddingsResponse = self
            .call("embed", Method::POST, "/api/embeddings", Some(&body))
            .await?;
        if response.embedding.is_empty() {
            return Err(ClientError::new(ClientErrorKind::Decode(
                "empty embedding".into(),
            )));
        }
        debug!(dimensions = response.embedding.len(), "Embedded text");
        Ok(GenerationResult::embedding(model, response.embedding))
    }
}

#[async_trait]
impl ModelLister for InferenceClient {
    async fn list_models(&self) -> ClientResult<Vec<String>> {
        InferenceClient::list_models(self).await
    }
}

#[async_trait]
impl InferenceDriver for InferenceClient {
    fn config_name(&self) -> &str {
        &self.settings.name
    }

    async fn health_check(&self) -> bool {
        InferenceClient::health_check(self).await
    }

    async fn pull_model(&self, name: &str) -> ClientResult<bool> {
        InferenceClient::pull_model(self, name).await
    }

    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        system_prompt: Option<&str>,
        params: &GenerationParams,
    ) -> ClientResult<GenerationResult> {
        InferenceClient::generate(self, model, prompt, system_prompt, params).await
    }

    async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
        system_prompt: Option<&str>,
        params: &GenerationParams,
    ) -> ClientResult<ChunkStream> {
        InferenceClient::generate_stream(self, model, prompt, system_prompt, params).await
    }

    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> ClientResult<GenerationResult> {
        InferenceClient::chat(self, model, messages, params).await
    }

    async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> ClientResult<ChunkStream> {
        InferenceClient::chat_stream(self, model, messages, params).await
    }

    async fn embed(&self, model: &str, text: &str) -> ClientResult<GenerationResult> {
        InferenceClient::embed(self, model, text).await
    }
}
