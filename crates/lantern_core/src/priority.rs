//! Job priority classes.

use serde::{Deserialize, Serialize};

/// Priority class of a job.
///
/// Only affects queue draining order (urgent first, FIFO within a class),
/// never admission.
///
/// # Examples
///
/// ```
/// use lantern_core::JobPriority;
///
/// assert!(JobPriority::Urgent > JobPriority::High);
/// assert!(JobPriority::Normal > JobPriority::Low);
/// assert_eq!(JobPriority::default(), JobPriority::Normal);
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobPriority {
    /// Background work
    Low,
    /// Default class
    #[default]
    Normal,
    /// Drains before normal
    High,
    /// Drains before everything else
    Urgent,
}
