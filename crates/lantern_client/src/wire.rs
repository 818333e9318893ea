//! Request and response bodies of the inference server's HTTP API.

use lantern_core::{
    ChatMessage, GenerationChunk, GenerationParams, GenerationResult, ResultMetadata, Role,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `GET /api/tags` response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagsResponse {
    /// Models loaded on the server
    #[serde(default)]
    pub models: Vec<TagModel>,
}

/// One entry of the tags listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagModel {
    /// Model identifier (e.g. "llama3.1:8b")
    pub name: String,
    /// Size on disk in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Content digest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// `POST /api/pull` body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullRequest {
    /// Model to fetch
    pub name: String,
    /// Ask for newline-delimited progress
    pub stream: bool,
}

/// One progress line of a pull
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullStatus {
    /// Status text; "success" marks completion
    #[serde(default)]
    pub status: String,
    /// Layer digest being fetched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// Bytes to fetch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Bytes fetched so far
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<u64>,
    /// Error reported by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `POST /api/generate` body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateRequest {
    /// Model identifier
    pub model: String,
    /// Prompt text
    pub prompt: String,
    /// System prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Stream newline-delimited chunks
    pub stream: bool,
    /// Sampling options
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub options: Map<String, Value>,
}

/// `POST /api/generate` response (whole body or one streamed line)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GenerateResponse {
    /// Model that answered
    #[serde(default)]
    pub model: String,
    /// Generated text (a delta when streaming)
    #[serde(default)]
    pub response: String,
    /// True on the final line
    #[serde(default)]
    pub done: bool,
    /// Why generation stopped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,
    /// Tokens generated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u32>,
    /// Generation time in nanoseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_duration: Option<u64>,
    /// Prompt tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u32>,
    /// Total server time in nanoseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<u64>,
    /// Error reported mid-stream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Role-tagged message as sent on the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireMessage {
    /// "system", "user" or "assistant"
    pub role: Role,
    /// Message text
    #[serde(default)]
    pub content: String,
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// `POST /api/chat` body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Ordered conversation
    pub messages: Vec<WireMessage>,
    /// Stream newline-delimited chunks
    pub stream: bool,
    /// Sampling options
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub options: Map<String, Value>,
}

/// `POST /api/chat` response (whole body or one streamed line)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChatResponse {
    /// Model that answered
    #[serde(default)]
    pub model: String,
    /// Assistant message (a delta when streaming)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<WireMessage>,
    /// True on the final line
    #[serde(default)]
    pub done: bool,
    /// Why generation stopped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_reason: Option<String>,
    /// Tokens generated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u32>,
    /// Generation time in nanoseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_duration: Option<u64>,
    /// Prompt tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u32>,
    /// Total server time in nanoseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<u64>,
    /// Error reported mid-stream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `POST /api/embeddings` body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbeddingsRequest {
    /// Model identifier
    pub model: String,
    /// Text to embed
    pub prompt: String,
}

/// `POST /api/embeddings` response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingsResponse {
    /// Embedding vector
    #[serde(default)]
    pub embedding: Vec<f32>,
}

/// Translate generation parameters into the server's `options` object.
///
/// `max_tokens` maps to `num_predict`; extra options pass through and win
/// over the named fields.
pub fn options_from_params(params: &GenerationParams) -> Map<String, Value> {
    let mut options = Map::new();
    if let Some(temperature) = params.temperature {
        options.insert("temperature".into(), Value::from(temperature));
    }
    if let Some(max_tokens) = params.max_tokens {
        options.insert("num_predict".into(), Value::from(max_tokens));
    }
    if let Some(top_p) = params.top_p {
        options.insert("top_p".into(), Value::from(top_p));
    }
    if let Some(top_k) = params.top_k {
        options.insert("top_k".into(), Value::from(top_k));
    }
    for (key, value) in &params.extra {
        options.insert(key.clone(), value.clone());
    }
    options
}

fn metadata(
    done_reason: Option<String>,
    prompt_eval_count: Option<u32>,
    eval_duration: Option<u64>,
    total_duration: Option<u64>,
) -> ResultMetadata {
    ResultMetadata {
        prompt_tokens: prompt_eval_count,
        eval_duration_ns: eval_duration,
        total_duration_ns: total_duration,
        done_reason,
        embedding: None,
    }
}

impl GenerateResponse {
    /// Convert a complete response into a result.
    pub fn into_result(self) -> GenerationResult {
        GenerationResult {
            model: self.model,
            text: self.response,
            token_count: self.eval_count.unwrap_or(0),
            metadata: metadata(
                self.done_reason,
                self.prompt_eval_count,
                self.eval_duration,
                self.total_duration,
            ),
        }
    }

    /// Convert one streamed line into a chunk.
    pub fn into_chunk(self) -> GenerationChunk {
        if self.done {
            GenerationChunk {
                content: self.response,
                done: true,
                token_count: Some(self.eval_count.unwrap_or(0)),
                metadata: Some(metadata(
                    self.done_reason,
                    self.prompt_eval_count,
                    self.eval_duration,
                    self.total_duration,
                )),
            }
        } else {
            GenerationChunk::partial(self.response)
        }
    }
}

impl ChatResponse {
    fn content(&mut self) -> String {
        self.message
            .take()
            .map(|message| message.content)
            .unwrap_or_default()
    }

    /// Convert a complete response into a result.
    pub fn into_result(mut self) -> GenerationResult {
        let text = self.content();
        GenerationResult {
            model: self.model,
            text,
            token_count: self.eval_count.unwrap_or(0),
            metadata: metadata(
                self.done_reason,
                self.prompt_eval_count,
                self.eval_duration,
                self.total_duration,
            ),
        }
    }

    /// Convert one streamed line into a chunk.
    pub fn into_chunk(mut self) -> GenerationChunk {
        let content = self.content();
        if self.done {
            GenerationChunk {
                content,
                done: true,
                token_count: Some(self.eval_count.unwrap_or(0)),
                metadata: Some(metadata(
                    self.done_reason,
                    self.prompt_eval_count,
                    self.eval_duration,
                    self.total_duration,
                )),
            }
        } else {
            GenerationChunk::partial(content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn options_map_max_tokens_to_num_predict() {
        let params = GenerationParams::default()
            .with_temperature(0.5)
            .with_max_tokens(128)
            .with_top_k(20)
            .with_extra("num_ctx", 8192);

        let options = options_from_params(&params);

        assert_eq!(options["num_predict"], json!(128));
        assert_eq!(options["top_k"], json!(20));
        assert_eq!(options["num_ctx"], json!(8192));
        assert!(!options.contains_key("max_tokens"));
        assert!(!options.contains_key("top_p"));
    }

    #[test]
    fn generate_request_omits_empty_fields() {
        let request = GenerateRequest {
            model: "llama3.1:8b".into(),
            prompt: "hi".into(),
            system: None,
            stream: false,
            options: Map::new(),
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body, json!({"model": "llama3.1:8b", "prompt": "hi", "stream": false}));
    }

    #[test]
    fn chat_messages_use_lowercase_roles() {
        let request = ChatRequest {
            model: "m".into(),
            messages: vec![WireMessage::from(&ChatMessage::system("be brief"))],
            stream: true,
            options: Map::new(),
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["messages"][0]["role"], json!("system"));
    }

    #[test]
    fn final_chunk_carries_token_count() {
        let line: GenerateResponse = serde_json::from_value(json!({
            "model": "m", "response": "", "done": true,
            "eval_count": 17, "eval_duration": 1_000_000
        }))
        .unwrap();
        let chunk = line.into_chunk();
        assert!(chunk.done);
        assert_eq!(chunk.token_count, Some(17));
        assert_eq!(chunk.metadata.unwrap().eval_duration_ns, Some(1_000_000));
    }
}
