//! Wiring of configuration, clients, model selection, job queues and usage.

use futures_util::future::join_all;
use lantern_client::InferenceClient;
use lantern_config::{ConfigRegistry, LanternConfig};
use lantern_core::{CancelOutcome, GenerationParams, JobRequest, ProcessingJob, TaskCategory};
use lantern_error::{
    ClientError, ClientErrorKind, ConfigError, JobError, JobErrorKind, LanternResult,
};
use lantern_interface::UsageStore;
use lantern_jobs::{InMemoryJobStore, JobQueue, JobQueueConfig};
use lantern_models::{ModelRegistry, ModelSelector};
use lantern_usage::{InMemoryUsageStore, UsageRecorder};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Everything that serves one named server configuration.
pub struct ServerHandle {
    client: Arc<InferenceClient>,
    selector: Arc<ModelSelector>,
    queue: JobQueue,
}

impl ServerHandle {
    /// Inference client bound to the configuration.
    pub fn client(&self) -> &Arc<InferenceClient> {
        &self.client
    }

    /// Model selector confirming availability against this server.
    pub fn selector(&self) -> &Arc<ModelSelector> {
        &self.selector
    }

    /// Job queue whose workers call this server.
    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }
}

/// Configured Lantern instance.
///
/// One client, selector and job queue per active server configuration. The model
/// registry and usage recorder are shared, so metrics and usage aggregate
/// across servers.
pub struct InferenceService {
    configs: ConfigRegistry,
    registry: Arc<ModelRegistry>,
    usage: UsageRecorder,
    servers: HashMap<String, ServerHandle>,
}

impl InferenceService {
    /// Build a service with in-memory usage storage.
    ///
    /// Must be called inside a Tokio runtime: job workers spawn immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if a server configuration or model seed is invalid.
    pub fn new(config: LanternConfig) -> LanternResult<Self> {
        Self::with_usage_store(config, Arc::new(InMemoryUsageStore::new()))
    }

    /// Load layered configuration and build the service.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails to load or validate.
    pub fn load() -> LanternResult<Self> {
        Self::new(LanternConfig::load()?)
    }

    /// Build a service recording usage into `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if a server configuration or model seed is invalid.
    #[instrument(skip_all, fields(servers = config.servers.len(), models = config.models.len()))]
    pub fn with_usage_store(
        config: LanternConfig,
        store: Arc<dyn UsageStore>,
    ) -> LanternResult<Self> {
        let configs = ConfigRegistry::from_config(&config)?;
        let registry = Arc::new(ModelRegistry::from_specs(&config.models)?);
        let usage = UsageRecorder::new(store);

        let mut servers = HashMap::new();
        for shared in configs.active() {
            let client = Arc::new(
                InferenceClient::new(shared)?.with_health_timeout(config.health_check_timeout()),
            );
            let selector = Arc::new(ModelSelector::new(
                registry.clone(),
                client.clone(),
                config.availability_ttl(),
            ));
            let queue = JobQueue::start(
                JobQueueConfig::from_server(client.settings()),
                client.clone(),
                selector.clone(),
                Arc::new(InMemoryJobStore::new()),
                usage.clone(),
            );
            servers.insert(
                client.settings().name.clone(),
                ServerHandle {
                    client,
                    selector,
                    queue,
                },
            );
        }

        info!(
            servers = servers.len(),
            models = registry.len(),
            "Inference service ready"
        );
        Ok(Self {
            configs,
            registry,
            usage,
            servers,
        })
    }

    /// Server configurations.
    pub fn configs(&self) -> &ConfigRegistry {
        &self.configs
    }

    /// Model registry shared by every server.
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Usage recorder shared by every server.
    pub fn usage(&self) -> &UsageRecorder {
        &self.usage
    }

    /// Names of the served (active) configurations, sorted.
    pub fn server_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.servers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Handle for `name`, or for the default configuration when `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unknown, inactive, or no default
    /// exists.
    pub fn server(&self, name: Option<&str>) -> LanternResult<&ServerHandle> {
        let name = match name {
            Some(name) => name.to_string(),
            None => self
                .configs
                .default_config()
                .map(|shared| {
                    shared
                        .read()
                        .unwrap_or_else(PoisonError::into_inner)
                        .name
                        .clone()
                })
                .ok_or_else(|| ConfigError::new("No server named and no default configured"))?,
        };
        if let Some(handle) = self.servers.get(&name) {
            return Ok(handle);
        }
        let message = if self.configs.get(&name).is_some() {
            format!("Server '{}' is inactive", name)
        } else {
            format!("Unknown server '{}'", name)
        };
        Err(ConfigError::new(message).into())
    }

    /// Submit a job to a server's queue without waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unknown, the queue is saturated or
    /// shut down.
    pub async fn submit(&self, server: Option<&str>, request: JobRequest) -> LanternResult<Uuid> {
        Ok(self.server(server)?.queue.submit(request).await?)
    }

    /// Submit a job and wait for its terminal state.
    ///
    /// A job that fails still returns `Ok`; inspect its status.
    ///
    /// # Errors
    ///
    /// Returns an error if the job could not be admitted.
    pub async fn submit_and_wait(
        &self,
        server: Option<&str>,
        request: JobRequest,
    ) -> LanternResult<ProcessingJob> {
        Ok(self.server(server)?.queue.submit_and_wait(request).await?)
    }

    /// Current copy of a job.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unknown or its store fails.
    pub async fn job(&self, server: Option<&str>, id: Uuid) -> LanternResult<Option<ProcessingJob>> {
        Ok(self.server(server)?.queue.get(id).await?)
    }

    /// Cancel a pending job.
    ///
    /// # Errors
    ///
    /// Returns an error if the server or job is unknown.
    pub async fn cancel(&self, server: Option<&str>, id: Uuid) -> LanternResult<CancelOutcome> {
        Ok(self.server(server)?.queue.cancel(id).await?)
    }

    /// Probe every active configuration concurrently.
    ///
    /// Each probe records its outcome on the configuration.
    #[instrument(skip(self))]
    pub async fn check_all_health(&self) -> BTreeMap<String, bool> {
        let probes = self
            .configs
            .active()
            .into_iter()
            .map(|shared| shared.read().unwrap_or_else(PoisonError::into_inner).name.clone())
            .filter_map(|name| self.servers.get(&name).map(|handle| (name, handle)))
            .map(|(name, handle)| async move { (name, handle.client.health_check().await) });

        let results: BTreeMap<_, _> = join_all(probes).await.into_iter().collect();
        let healthy = results.values().filter(|ok| **ok).count();
        info!(healthy, total = results.len(), "Health sweep finished");
        results
    }

    /// Model identifier and default parameters to call for `category`.
    ///
    /// `requested` may be a registered logical name, which brings its
    /// parameters, or a raw server-side identifier. Without it the selector
    /// picks the best available model.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unknown or no model is available.
    pub async fn resolve_model(
        &self,
        server: Option<&str>,
        category: TaskCategory,
        requested: Option<&str>,
    ) -> LanternResult<(String, GenerationParams)> {
        if let Some(requested) = requested {
            return Ok(match self.registry.get(requested) {
                Some(descriptor) => (descriptor.model_id().clone(), descriptor.params().clone()),
                None => (requested.to_string(), GenerationParams::default()),
            });
        }
        let handle = self.server(server)?;
        let descriptor = handle
            .selector
            .select_best_model(category)
            .await
            .ok_or_else(|| JobError::new(JobErrorKind::NoModelAvailable(category.to_string())))?;
        debug!(model = %descriptor.name(), "Resolved model");
        Ok((descriptor.model_id().clone(), descriptor.params().clone()))
    }

    /// Make sure `model` is loaded on a server, pulling it if absent.
    ///
    /// `model` may be a registered logical name or a raw identifier. Returns
    /// `true` when a pull was performed.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be listed or the pull fails.
    #[instrument(skip(self))]
    pub async fn ensure_model(&self, server: Option<&str>, model: &str) -> LanternResult<bool> {
        let handle = self.server(server)?;
        let model_id = self
            .registry
            .get(model)
            .map(|descriptor| descriptor.model_id().clone())
            .unwrap_or_else(|| model.to_string());

        handle.selector.invalidate().await;
        if handle.selector.listed(&model_id).await? {
            debug!(%model_id, "Model already loaded");
            return Ok(false);
        }

        info!(%model_id, "Model absent, pulling");
        if !handle.client.pull_model(&model_id).await? {
            warn!(%model_id, "Pull ended without success");
            return Err(ClientError::new(ClientErrorKind::PullFailed(format!(
                "pull of {} did not complete",
                model_id
            )))
            .into());
        }
        handle.selector.invalidate().await;
        Ok(true)
    }

    /// Stop every job queue and close every client.
    ///
    /// Pending jobs are cancelled; jobs already processing finish first.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        join_all(self.servers.values().map(|handle| handle.queue.shutdown())).await;
        for handle in self.servers.values() {
            handle.client.close();
        }
        info!("Inference service stopped");
    }
}
