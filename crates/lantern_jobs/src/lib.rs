//! Job queue and worker pool.
//!
//! [`JobQueue`] admits jobs up to a fixed number of outstanding entries
//! (one per worker plus `request_queue_size` waiting), drains them by
//! priority class with FIFO order inside a class, and drives each job
//! through `pending → processing → completed | failed`, with
//! `pending → cancelled` on request. Every finished job updates the model
//! metrics and the usage records.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod handler;
mod metrics;
mod queue;
mod store;

pub use handler::{HandlerOutput, TaskHandler};
pub use metrics::JobMetrics;
pub use queue::{JobQueue, JobQueueConfig, QueueStats};
pub use store::InMemoryJobStore;
