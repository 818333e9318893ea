//! Availability-aware model selection.

use crate::availability::{AvailabilityCache, is_listed};
use crate::descriptor::ModelDescriptor;
use crate::metrics::ModelMetrics;
use crate::registry::ModelRegistry;
use lantern_core::TaskCategory;
use lantern_error::ClientResult;
use lantern_interface::ModelLister;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Selection order: priority descending, then success rate descending
/// (unmeasured models last), then average latency ascending.
pub fn rank(
    a: &ModelDescriptor,
    a_metrics: &ModelMetrics,
    b: &ModelDescriptor,
    b_metrics: &ModelMetrics,
) -> Ordering {
    b.priority()
        .cmp(a.priority())
        .then_with(|| match (a_metrics.success_rate(), b_metrics.success_rate()) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| {
            a_metrics
                .average_latency()
                .total_cmp(b_metrics.average_latency())
        })
}

/// Picks the best loaded model for a task category on one server.
pub struct ModelSelector {
    registry: Arc<ModelRegistry>,
    lister: Arc<dyn ModelLister>,
    cache: AvailabilityCache,
}

impl std::fmt::Debug for ModelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSelector")
            .field("models", &self.registry.len())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl ModelSelector {
    /// Create a selector that trusts a listing for `ttl`.
    pub fn new(registry: Arc<ModelRegistry>, lister: Arc<dyn ModelLister>, ttl: Duration) -> Self {
        Self {
            registry,
            lister,
            cache: AvailabilityCache::new(ttl),
        }
    }

    /// Registry the selector ranks.
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Drop the cached listing so the next selection asks the server.
    pub async fn invalidate(&self) {
        self.cache.invalidate().await;
    }

    /// Whether `model_id` is loaded on the server, per the cache.
    ///
    /// A failed listing counts as not loaded.
    pub async fn is_available(&self, model_id: &str) -> bool {
        self.listed(model_id).await.unwrap_or(false)
    }

    /// Like [`is_available`](Self::is_available), but surfaces listing errors.
    pub async fn listed(&self, model_id: &str) -> ClientResult<bool> {
        self.cache.contains(self.lister.as_ref(), model_id).await
    }

    /// Best active model for `category` whose identifier the server lists.
    ///
    /// Candidates the server has not loaded are skipped. Returns `None` when
    /// no candidate is confirmed, including when the listing fails.
    #[instrument(skip(self))]
    pub async fn select_best_model(&self, category: TaskCategory) -> Option<Arc<ModelDescriptor>> {
        let candidates = self.registry.candidates(category);
        if candidates.is_empty() {
            debug!("No active candidates");
            return None;
        }

        let loaded = match self.cache.models(self.lister.as_ref()).await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(error = %e, "Could not list models, no selection possible");
                return None;
            }
        };

        for candidate in candidates {
            if is_listed(&loaded, candidate.model_id()) {
                debug!(name = %candidate.name(), model_id = %candidate.model_id(), "Selected model");
                return Some(candidate);
            }
            warn!(
                name = %candidate.name(),
                model_id = %candidate.model_id(),
                "Model not loaded on server, trying next candidate"
            );
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measured(total: u64, failed: u64, latency: f64) -> ModelMetrics {
        let mut metrics = ModelMetrics::default();
        for i in 0..total {
            metrics.record(latency, i >= failed);
        }
        metrics
    }

    #[test]
    fn priority_dominates() {
        let low = ModelDescriptor::new("low", "x", TaskCategory::Chat).with_priority(1);
        let high = ModelDescriptor::new("high", "y", TaskCategory::Chat).with_priority(2);
        assert_eq!(
            rank(&high, &ModelMetrics::default(), &low, &measured(10, 0, 0.1)),
            Ordering::Less
        );
    }

    #[test]
    fn unmeasured_ranks_below_measured() {
        let a = ModelDescriptor::new("a", "x", TaskCategory::Chat);
        let b = ModelDescriptor::new("b", "y", TaskCategory::Chat);
        assert_eq!(
            rank(&a, &ModelMetrics::default(), &b, &measured(4, 3, 1.0)),
            Ordering::Greater
        );
    }

    #[test]
    fn latency_breaks_equal_success_rates() {
        let a = ModelDescriptor::new("a", "x", TaskCategory::Chat);
        let b = ModelDescriptor::new("b", "y", TaskCategory::Chat);
        assert_eq!(
            rank(&a, &measured(5, 0, 0.5), &b, &measured(5, 0, 2.0)),
            Ordering::Less
        );
    }
}
