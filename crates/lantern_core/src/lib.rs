//! Core data types for the Lantern inference layer.
//!
//! This crate provides the records shared by the client, the model registry,
//! the job queue and the usage recorder.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod job;
mod message;
mod params;
mod priority;
mod result;
mod server;
mod status;
mod task;
mod usage;

pub use job::{CancelOutcome, JobRequest, JobRequestBuilder, ProcessingJob};
pub use message::{ChatMessage, Role};
pub use params::GenerationParams;
pub use priority::JobPriority;
pub use result::{GenerationChunk, GenerationResult, ResultMetadata};
pub use server::{ServerConfiguration, ServerConfigurationBuilder};
pub use status::JobStatus;
pub use task::TaskCategory;
pub use usage::{UsageKey, UsageRecord};
