//! Lantern - client and job orchestration for self-hosted LLM inference servers
//!
//! Lantern talks to Ollama-compatible inference servers over HTTP and runs
//! inference jobs through a bounded, prioritized worker pool.
//!
//! # Features
//!
//! - **Configuration Registry**: named server configurations loaded from TOML and the environment
//! - **Inference Client**: generate, chat and embed with retries, streaming and a bounded request pool
//! - **Model Selection**: logical models per task category, ranked by priority and observed metrics
//! - **Job Queue**: priority queue with a fixed worker pool and explicit admission control
//! - **Usage Accounting**: per model, submitter and day counters
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lantern::{InferenceService, JobRequestBuilder, LanternConfig, TaskCategory};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = InferenceService::new(LanternConfig::load()?)?;
//!
//!     let request = JobRequestBuilder::default()
//!         .task_category(TaskCategory::Summarization)
//!         .prompt("Summarize the interview notes below...")
//!         .build()?;
//!
//!     let job = service.submit_and_wait(None, request).await?;
//!     println!("{:?}", job.output_data());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `lantern_core` - data types (jobs, messages, parameters, configuration)
//! - `lantern_interface` - the inference, listing and storage traits
//! - `lantern_error` - error types
//! - `lantern_config` - configuration loading and the server registry
//! - `lantern_client` - HTTP inference client
//! - `lantern_models` - model registry and selector
//! - `lantern_jobs` - job queue and worker pool
//! - `lantern_usage` - usage recorder
//!
//! This crate (`lantern`) re-exports everything for convenience.

pub use lantern_client::*;
pub use lantern_config::*;
pub use lantern_core::*;
pub use lantern_error::*;
pub use lantern_interface::*;
pub use lantern_jobs::*;
pub use lantern_models::*;
pub use lantern_usage::*;

pub mod observability;
mod service;

pub use service::{InferenceService, ServerHandle};
