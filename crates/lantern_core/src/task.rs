//! Task categories used to route requests to models.

use serde::{Deserialize, Serialize};

/// Closed classification of a request's purpose.
///
/// # Examples
///
/// ```
/// use lantern_core::TaskCategory;
/// use std::str::FromStr;
///
/// assert_eq!(TaskCategory::from_str("text-generation").unwrap(), TaskCategory::TextGeneration);
/// assert_eq!(TaskCategory::Chat.to_string(), "chat");
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
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
    strum::AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TaskCategory {
    /// Free-form completion from a single prompt
    TextGeneration,
    /// Multi-turn conversation
    Chat,
    /// Vector embedding of text
    Embedding,
    /// Condensing a document
    Summarization,
    /// Assigning a label to a document
    Classification,
    /// Translating between languages
    Translation,
    /// Pulling structured fields out of text
    Extraction,
}
