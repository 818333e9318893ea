//! Model catalog and selection.
//!
//! [`ModelRegistry`] holds the deployable models, each with its own
//! lock-guarded [`ModelMetrics`]. [`ModelSelector`] ranks the active models
//! of a task category and returns the best one the server has actually
//! loaded, according to a short-lived [`AvailabilityCache`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod availability;
mod descriptor;
mod metrics;
mod registry;
mod selector;

pub use availability::AvailabilityCache;
pub use descriptor::{ModelDescriptor, ModelSummary};
pub use metrics::ModelMetrics;
pub use registry::ModelRegistry;
pub use selector::{ModelSelector, rank};
