//! Catalog of deployable models.

use crate::descriptor::{ModelDescriptor, ModelSummary};
use crate::metrics::ModelMetrics;
use crate::selector::rank;
use lantern_config::ModelSpec;
use lantern_core::TaskCategory;
use lantern_error::{ModelsError, ModelsErrorKind, ModelsResult};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, instrument};

/// Models keyed by logical name.
///
/// Lookups hand out shared descriptors; deactivation and metrics updates
/// act on the shared descriptor, so every holder sees them at once.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<String, Arc<ModelDescriptor>>>,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry seeded from configuration.
    ///
    /// # Errors
    ///
    /// Fails on duplicate names or invalid entries.
    pub fn from_specs(specs: &[ModelSpec]) -> ModelsResult<Self> {
        let registry = Self::new();
        for spec in specs {
            registry.register(ModelDescriptor::from(spec))?;
        }
        Ok(registry)
    }

    /// Add a model.
    ///
    /// # Errors
    ///
    /// Fails if the name or model identifier is empty, or the name is taken.
    #[instrument(skip(self, descriptor), fields(name = %descriptor.name()))]
    pub fn register(&self, descriptor: ModelDescriptor) -> ModelsResult<Arc<ModelDescriptor>> {
        if descriptor.name().trim().is_empty() {
            return Err(ModelsError::new(ModelsErrorKind::InvalidDescriptor(
                "name must not be empty".into(),
            )));
        }
        if descriptor.model_id().trim().is_empty() {
            return Err(ModelsError::new(ModelsErrorKind::InvalidDescriptor(format!(
                "model '{}' has an empty model_id",
                descriptor.name()
            ))));
        }

        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        if models.contains_key(descriptor.name()) {
            return Err(ModelsError::new(ModelsErrorKind::Duplicate(
                descriptor.name().clone(),
            )));
        }
        let descriptor = Arc::new(descriptor);
        models.insert(descriptor.name().clone(), descriptor.clone());
        info!(
            model_id = %descriptor.model_id(),
            task = %descriptor.task_category(),
            priority = descriptor.priority(),
            "Registered model"
        );
        Ok(descriptor)
    }

    /// Look up a model by logical name.
    pub fn get(&self, name: &str) -> Option<Arc<ModelDescriptor>> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn require(&self, name: &str) -> ModelsResult<Arc<ModelDescriptor>> {
        self.get(name)
            .ok_or_else(|| ModelsError::new(ModelsErrorKind::NotFound(name.to_string())))
    }

    /// Take a model out of selection immediately.
    pub fn deactivate(&self, name: &str) -> ModelsResult<()> {
        self.require(name)?.set_active(false);
        info!(name, "Deactivated model");
        Ok(())
    }

    /// Return a model to selection.
    pub fn activate(&self, name: &str) -> ModelsResult<()> {
        self.require(name)?.set_active(true);
        info!(name, "Activated model");
        Ok(())
    }

    /// Every model, sorted by name.
    pub fn list(&self) -> Vec<Arc<ModelDescriptor>> {
        let mut models: Vec<_> = self
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        models.sort_by(|a, b| a.name().cmp(b.name()));
        models
    }

    /// Models serving `category`, active or not, sorted by name.
    pub fn by_category(&self, category: TaskCategory) -> Vec<Arc<ModelDescriptor>> {
        self.list()
            .into_iter()
            .filter(|m| *m.task_category() == category)
            .collect()
    }

    /// Active models serving `category`, best first.
    pub fn candidates(&self, category: TaskCategory) -> Vec<Arc<ModelDescriptor>> {
        let mut ranked: Vec<_> = self
            .by_category(category)
            .into_iter()
            .filter(|m| m.is_active())
            .map(|m| {
                let metrics = m.metrics();
                (m, metrics)
            })
            .collect();
        ranked.sort_by(|(a, am), (b, bm)| rank(a, am, b, bm));
        ranked.into_iter().map(|(m, _)| m).collect()
    }

    /// Record one finished request against `name`.
    pub fn update_metrics(
        &self,
        name: &str,
        elapsed_seconds: f64,
        success: bool,
    ) -> ModelsResult<ModelMetrics> {
        let metrics = self.require(name)?.record(elapsed_seconds, success);
        debug!(
            name,
            total = metrics.total_requests(),
            failed = metrics.failed_requests(),
            avg_latency = metrics.average_latency(),
            "Updated model metrics"
        );
        Ok(metrics)
    }

    /// Zero the metrics of `name`.
    pub fn reset_metrics(&self, name: &str) -> ModelsResult<()> {
        self.require(name)?.reset_metrics();
        info!(name, "Reset model metrics");
        Ok(())
    }

    /// Summaries of every model, sorted by name.
    pub fn snapshot(&self) -> Vec<ModelSummary> {
        self.list().iter().map(|m| m.summary()).collect()
    }

    /// Number of registered models.
    pub fn len(&self) -> usize {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no model is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
