//! HTTP client for self-hosted inference servers.
//!
//! One [`InferenceClient`] talks to one named server configuration. Every
//! outbound call passes through that configuration's [`RequestPool`], which
//! caps in-flight requests at `max_concurrent_requests` and lets at most
//! `request_queue_size` more wait. Transient faults are retried by
//! [`RetryPolicy`] with exponential backoff.
//!
//! # Example
//!
//! ```no_run
//! use lantern_client::InferenceClient;
//! use lantern_core::{GenerationParams, ServerConfigurationBuilder};
//! use std::sync::{Arc, RwLock};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfigurationBuilder::default().name("local").build()?;
//! let client = InferenceClient::new(Arc::new(RwLock::new(config)))?;
//!
//! if client.health_check().await {
//!     let result = client
//!         .generate("llama3.1:8b", "Write a job ad for a Rust engineer", None, &GenerationParams::default())
//!         .await?;
//!     println!("{}", result.text);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod metrics;
mod pool;
mod retry;
mod stream;
mod wire;

pub use client::{Generation, InferenceClient};
pub use metrics::InferenceMetrics;
pub use pool::{PoolPermit, RequestPool};
pub use retry::{RetryPolicy, backoff_delay};
pub use stream::collect_stream;
pub use wire::{
    ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse, GenerateRequest,
    GenerateResponse, PullRequest, PullStatus, TagModel, TagsResponse, WireMessage,
    options_from_params,
};
