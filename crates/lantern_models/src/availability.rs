//! Short-lived cache of the models a server has loaded.

use lantern_error::ClientResult;
use lantern_interface::ModelLister;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Caches `list_models` output for a fixed time-to-live.
///
/// Concurrent lookups on a stale cache share one refresh.
#[derive(Debug)]
pub struct AvailabilityCache {
    ttl: Duration,
    entry: Mutex<Option<(Instant, Arc<HashSet<String>>)>>,
}

impl AvailabilityCache {
    /// Create an empty cache.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// Time-to-live of a listing.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Forget the cached listing.
    pub async fn invalidate(&self) {
        *self.entry.lock().await = None;
    }

    /// Current listing, refreshed through `lister` when stale.
    ///
    /// # Errors
    ///
    /// Propagates listing failures; a failed refresh leaves the cache empty.
    pub async fn models(&self, lister: &dyn ModelLister) -> ClientResult<Arc<HashSet<String>>> {
        let mut entry = self.entry.lock().await;
        if let Some((fetched, models)) = entry.as_ref()
            && fetched.elapsed() < self.ttl
        {
            return Ok(models.clone());
        }

        *entry = None;
        let models: Arc<HashSet<String>> = Arc::new(lister.list_models().await?.into_iter().collect());
        debug!(count = models.len(), "Refreshed model availability");
        *entry = Some((Instant::now(), models.clone()));
        Ok(models)
    }

    /// Whether `model_id` is loaded. A listed `<id>:latest` counts for a bare id.
    pub async fn contains(&self, lister: &dyn ModelLister, model_id: &str) -> ClientResult<bool> {
        let models = self.models(lister).await?;
        Ok(is_listed(&models, model_id))
    }
}

pub(crate) fn is_listed(models: &HashSet<String>, model_id: &str) -> bool {
    models.contains(model_id)
        || (!model_id.contains(':') && models.contains(&format!("{model_id}:latest")))
}
