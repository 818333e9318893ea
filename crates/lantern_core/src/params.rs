//! Tunable generation parameters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sampling and length parameters attached to a model or a single request.
///
/// All fields are optional; `None` leaves the server default in place.
///
/// # Examples
///
/// ```
/// use lantern_core::GenerationParams;
///
/// let params = GenerationParams::default()
///     .with_temperature(0.2)
///     .with_max_tokens(256);
/// assert_eq!(params.temperature, Some(0.2));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_setters::Setters)]
#[setters(prefix = "with_", strip_option)]
pub struct GenerationParams {
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Top-k sampling cutoff
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Default system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[setters(into)]
    pub system_prompt: Option<String>,

    /// Server-specific options passed through verbatim
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    #[setters(skip)]
    pub extra: Map<String, Value>,
}

impl GenerationParams {
    /// Add a pass-through option.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Overlay `overrides` on top of these parameters.
    ///
    /// Every field set in `overrides` wins; extra options are merged key by key.
    pub fn merge(&self, overrides: &GenerationParams) -> GenerationParams {
        let mut extra = self.extra.clone();
        for (key, value) in &overrides.extra {
            extra.insert(key.clone(), value.clone());
        }
        GenerationParams {
            temperature: overrides.temperature.or(self.temperature),
            top_p: overrides.top_p.or(self.top_p),
            top_k: overrides.top_k.or(self.top_k),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            system_prompt: overrides
                .system_prompt
                .clone()
                .or_else(|| self.system_prompt.clone()),
            extra,
        }
    }
}
