//! Results returned by the inference client.

use serde::{Deserialize, Serialize};

/// Server-reported details that accompany a result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// Tokens consumed by the prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u32>,
    /// Time the server spent generating, in nanoseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_duration_ns: Option<u64>,
    /// Total server-side time, in nanoseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration_ns: Option<u64>,
    /// Why generation stopped, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,
    /// Embedding vector (embedding requests only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Complete result of a generate, chat or embed call.
///
/// # Examples
///
/// ```
/// use lantern_core::GenerationResult;
///
/// let result = GenerationResult::text("llama3", "Hello", 2);
/// assert_eq!(result.token_count, 2);
/// assert!(result.metadata.embedding.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Server-side model identifier that produced the result
    pub model: String,
    /// Generated text (empty for embeddings)
    pub text: String,
    /// Tokens generated
    pub token_count: u32,
    /// Server-reported timing and extras
    pub metadata: ResultMetadata,
}

impl GenerationResult {
    /// Create a plain text result.
    pub fn text(model: impl Into<String>, text: impl Into<String>, token_count: u32) -> Self {
        Self {
            model: model.into(),
            text: text.into(),
            token_count,
            metadata: ResultMetadata::default(),
        }
    }

    /// Create an embedding result.
    pub fn embedding(model: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            model: model.into(),
            text: String::new(),
            token_count: 0,
            metadata: ResultMetadata {
                embedding: Some(vector),
                ..Default::default()
            },
        }
    }

    /// Server-reported generation time in seconds, if any.
    pub fn eval_seconds(&self) -> Option<f64> {
        self.metadata
            .eval_duration_ns
            .map(|ns| ns as f64 / 1_000_000_000.0)
    }
}

/// One partial result of a streamed generate or chat call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationChunk {
    /// Text delta carried by this chunk
    pub content: String,
    /// True on the terminating chunk
    pub done: bool,
    /// Final token count (only on the terminating chunk)
    pub token_count: Option<u32>,
    /// Final server metadata (only on the terminating chunk)
    pub metadata: Option<ResultMetadata>,
}

impl GenerationChunk {
    /// Create an intermediate chunk.
    pub fn partial(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            done: false,
            token_count: None,
            metadata: None,
        }
    }
}
