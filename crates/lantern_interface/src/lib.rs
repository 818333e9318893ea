//! Trait definitions for the Lantern inference layer.
//!
//! These are the seams between components: the job worker talks to an
//! [`InferenceDriver`] rather than a concrete HTTP client, the model selector
//! probes availability through [`ModelLister`], and storage goes
//! through [`JobStore`] and [`UsageStore`].

mod traits;

pub use traits::{ChunkStream, InferenceDriver, JobStore, ModelLister, UsageStore};
