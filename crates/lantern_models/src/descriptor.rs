//! Deployable models and their live metrics.

use crate::metrics::ModelMetrics;
use derive_getters::Getters;
use lantern_config::ModelSpec;
use lantern_core::{GenerationParams, TaskCategory};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// A model that can serve one task category.
///
/// Identity and tuning are fixed at registration. The active flag and the
/// metrics are shared across workers; metrics updates take the descriptor's
/// own lock, so concurrent completions never interleave.
#[derive(Debug, Getters)]
pub struct ModelDescriptor {
    /// Logical name (unique in a registry)
    name: String,
    /// Identifier of the model on the inference server
    model_id: String,
    /// Task category served
    task_category: TaskCategory,
    /// Default generation parameters
    params: GenerationParams,
    /// Higher wins ties in selection
    priority: i32,
    /// Free-form description
    description: Option<String>,
    #[getter(skip)]
    active: AtomicBool,
    #[getter(skip)]
    metrics: Mutex<ModelMetrics>,
}

impl ModelDescriptor {
    /// Create an active descriptor with default parameters and priority 0.
    pub fn new(
        name: impl Into<String>,
        model_id: impl Into<String>,
        task_category: TaskCategory,
    ) -> Self {
        Self {
            name: name.into(),
            model_id: model_id.into(),
            task_category,
            params: GenerationParams::default(),
            priority: 0,
            description: None,
            active: AtomicBool::new(true),
            metrics: Mutex::new(ModelMetrics::default()),
        }
    }

    /// Set the selection priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the default generation parameters.
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set whether the model starts active.
    pub fn with_active(self, active: bool) -> Self {
        self.active.store(active, Ordering::SeqCst);
        self
    }

    /// Start from existing metrics.
    pub fn with_metrics(mut self, metrics: ModelMetrics) -> Self {
        self.metrics = Mutex::new(metrics);
        self
    }

    /// Whether the model may be selected.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    /// Copy of the current metrics.
    pub fn metrics(&self) -> ModelMetrics {
        *self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record one request and return the updated metrics.
    pub fn record(&self, elapsed_seconds: f64, success: bool) -> ModelMetrics {
        let mut metrics = self.metrics.lock().unwrap_or_else(PoisonError::into_inner);
        metrics.record(elapsed_seconds, success);
        *metrics
    }

    /// Zero the metrics.
    pub fn reset_metrics(&self) {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
    }

    /// Serializable view of the descriptor.
    pub fn summary(&self) -> ModelSummary {
        let metrics = self.metrics();
        ModelSummary {
            name: self.name.clone(),
            model_id: self.model_id.clone(),
            task_category: self.task_category,
            priority: self.priority,
            is_active: self.is_active(),
            success_rate: metrics.success_rate(),
            metrics,
        }
    }
}

impl From<&ModelSpec> for ModelDescriptor {
    fn from(spec: &ModelSpec) -> Self {
        let descriptor = Self::new(&spec.name, &spec.model_id, spec.task_category)
            .with_priority(spec.priority)
            .with_params(spec.params.clone())
            .with_active(spec.is_active);
        match &spec.description {
            Some(description) => descriptor.with_description(description),
            None => descriptor,
        }
    }
}

/// Point-in-time view of a descriptor, for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    /// Logical name
    pub name: String,
    /// Server-side identifier
    pub model_id: String,
    /// Task category served
    pub task_category: TaskCategory,
    /// Selection priority
    pub priority: i32,
    /// Whether the model may be selected
    pub is_active: bool,
    /// Derived success rate, if any request was recorded
    pub success_rate: Option<f64>,
    /// Raw counters
    pub metrics: ModelMetrics,
}
