//! Fake model listing.

#![allow(dead_code)]

use async_trait::async_trait;
use lantern_error::{ClientError, ClientErrorKind, ClientResult};
use lantern_interface::ModelLister;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Lists a fixed set of models and counts how often it was asked.
#[derive(Debug, Default)]
pub struct FakeLister {
    models: Mutex<Vec<String>>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl FakeLister {
    pub fn with_models(models: &[&str]) -> Self {
        Self {
            models: Mutex::new(models.iter().map(|m| m.to_string()).collect()),
            ..Default::default()
        }
    }

    pub fn set_models(&self, models: &[&str]) {
        *self.models.lock().unwrap() = models.iter().map(|m| m.to_string()).collect();
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelLister for FakeLister {
    async fn list_models(&self) -> ClientResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ClientError::new(ClientErrorKind::Connection(
                "connection refused".into(),
            )));
        }
        Ok(self.models.lock().unwrap().clone())
    }
}
