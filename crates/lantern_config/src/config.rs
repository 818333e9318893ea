//! Layered configuration for servers, models and selection.

use config::{Config, Environment, File, FileFormat};
use lantern_core::{GenerationParams, ServerConfiguration, TaskCategory};
use lantern_error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Seed for a model descriptor declared in configuration.
///
/// ```toml
/// [[models]]
/// name = "summarizer"
/// model_id = "mistral:7b"
/// task_category = "summarization"
/// priority = 5
///
/// [models.params]
/// temperature = 0.2
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelSpec {
    /// Logical model name (unique)
    pub name: String,
    /// Identifier of the model on the inference server
    pub model_id: String,
    /// Task category the model serves
    pub task_category: TaskCategory,
    /// Default generation parameters
    #[serde(default)]
    pub params: GenerationParams,
    /// Higher wins ties in selection
    #[serde(default)]
    pub priority: i32,
    /// Whether the model may be selected
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Model selection tuning.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SelectorConfig {
    /// How long a `list_models` result is trusted, in seconds
    #[serde(default = "default_availability_ttl")]
    pub availability_ttl_seconds: u64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            availability_ttl_seconds: default_availability_ttl(),
        }
    }
}

fn default_availability_ttl() -> u64 {
    300
}

fn default_health_timeout() -> f64 {
    5.0
}

fn default_true() -> bool {
    true
}

/// Top-level Lantern configuration.
///
/// # Example
///
/// ```
/// use lantern_config::LanternConfig;
///
/// let config = LanternConfig::from_toml_str(r#"
///     default_server = "gpu"
///
///     [servers.gpu]
///     host = "gpu-01"
///     max_concurrent_requests = 2
///     request_queue_size = 4
/// "#).unwrap();
///
/// assert_eq!(config.servers["gpu"].name, "gpu");
/// assert_eq!(config.selector.availability_ttl_seconds, 300);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct LanternConfig {
    /// Named server configurations
    #[serde(default)]
    pub servers: HashMap<String, ServerConfiguration>,

    /// Server used when a caller does not name one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_server: Option<String>,

    /// Timeout of the health probe, in seconds
    #[serde(default = "default_health_timeout")]
    pub health_check_timeout_seconds: f64,

    /// Model selection tuning
    #[serde(default)]
    pub selector: SelectorConfig,

    /// Model descriptors registered at startup
    #[serde(default)]
    pub models: Vec<ModelSpec>,
}

impl LanternConfig {
    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or fails validation.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()
            .map_err(|e| ConfigError::new(format!("Failed to read configuration: {}", e)))?;
        Self::finish(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> ConfigResult<Self> {
        debug!("Loading configuration from file");

        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                ConfigError::new(format!(
                    "Failed to read configuration from {}: {}",
                    path.as_ref().display(),
                    e
                ))
            })?;
        Self::finish(config)
    }

    /// Load configuration with precedence: env > current dir > home dir > bundled default.
    ///
    /// User config files are optional and silently skipped if not found.
    #[instrument]
    pub fn load() -> ConfigResult<Self> {
        debug!("Loading configuration with precedence: env > current dir > home dir > bundled defaults");

        const DEFAULT_CONFIG: &str = include_str!("../../../lantern.toml");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/lantern/lantern.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder
            .add_source(File::with_name("lantern").required(false))
            .add_source(
                Environment::with_prefix("LANTERN")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder
            .build()
            .map_err(|e| ConfigError::new(format!("Failed to build configuration: {}", e)))?;
        Self::finish(config)
    }

    fn finish(config: Config) -> ConfigResult<Self> {
        let mut parsed: LanternConfig = config
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)))?;
        parsed.normalize();
        parsed.validate()?;
        Ok(parsed)
    }

    /// Fill server names from their table keys.
    fn normalize(&mut self) {
        for (key, server) in self.servers.iter_mut() {
            if server.name.is_empty() {
                server.name = key.clone();
            }
        }
    }

    /// Validate every server and the cross-references between sections.
    ///
    /// # Errors
    ///
    /// Returns the first invariant violation found.
    pub fn validate(&self) -> ConfigResult<()> {
        for (key, server) in &self.servers {
            if &server.name != key {
                return Err(ConfigError::new(format!(
                    "Server table '{}' declares mismatched name '{}'",
                    key, server.name
                )));
            }
            server.validate()?;
        }
        if let Some(default) = &self.default_server
            && !self.servers.contains_key(default)
        {
            return Err(ConfigError::new(format!(
                "default_server '{}' is not a configured server",
                default
            )));
        }
        if !self.health_check_timeout_seconds.is_finite() || self.health_check_timeout_seconds <= 0.0
        {
            return Err(ConfigError::new(
                "health_check_timeout_seconds must be positive",
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for model in &self.models {
            if !seen.insert(model.name.as_str()) {
                return Err(ConfigError::new(format!(
                    "Model '{}' is declared more than once",
                    model.name
                )));
            }
            if model.model_id.trim().is_empty() {
                return Err(ConfigError::new(format!(
                    "Model '{}' has an empty model_id",
                    model.name
                )));
            }
        }
        Ok(())
    }

    /// Availability cache TTL as a duration.
    pub fn availability_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.selector.availability_ttl_seconds)
    }

    /// Health probe timeout as a duration.
    pub fn health_check_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.health_check_timeout_seconds)
    }
}
