//! In-memory usage store.

use async_trait::async_trait;
use lantern_core::{UsageKey, UsageRecord};
use lantern_error::JobResult;
use lantern_interface::UsageStore;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Usage records in a lock-guarded ordered map.
#[derive(Debug, Default)]
pub struct InMemoryUsageStore {
    records: Mutex<BTreeMap<UsageKey, UsageRecord>>,
}

impl InMemoryUsageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageStore for InMemoryUsageStore {
    async fn increment(
        &self,
        key: &UsageKey,
        tokens: u64,
        elapsed_seconds: f64,
        success: bool,
    ) -> JobResult<UsageRecord> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let record = records
            .entry(key.clone())
            .or_insert_with(|| UsageRecord::new(key.clone()));
        record.apply(tokens, elapsed_seconds, success);
        Ok(record.clone())
    }

    async fn get(&self, key: &UsageKey) -> JobResult<Option<UsageRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    async fn list(&self) -> JobResult<Vec<UsageRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }
}
