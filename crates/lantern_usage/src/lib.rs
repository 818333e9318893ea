//! Usage accounting.
//!
//! [`UsageRecorder`] folds finished jobs into per-model, per-submitter,
//! per-day counters held by a [`UsageStore`](lantern_interface::UsageStore).
//! [`InMemoryUsageStore`] serializes every increment behind one lock.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod recorder;
mod store;

pub use recorder::{UsageRecorder, UsageTotals};
pub use store::InMemoryUsageStore;
