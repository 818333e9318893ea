//! Connection parameters for one named inference server.

use chrono::{DateTime, Utc};
use derive_builder::Builder;
use lantern_error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection, auth, retry and pool parameters for one inference server.
///
/// The health fields are refreshed by health checks; everything else is
/// managed by configuration and treated as read-only by the client.
///
/// # Examples
///
/// ```
/// use lantern_core::ServerConfigurationBuilder;
///
/// let config = ServerConfigurationBuilder::default()
///     .name("primary")
///     .host("gpu-01.internal")
///     .port(11434)
///     .build()
///     .unwrap();
///
/// assert_eq!(config.base_url(), "http://gpu-01.internal:11434");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(build_fn(error = "lantern_error::BuilderError"))]
pub struct ServerConfiguration {
    /// Unique configuration name
    #[builder(setter(into))]
    #[serde(default)]
    pub name: String,

    /// Host name or address
    #[builder(default = "\"localhost\".to_string()", setter(into))]
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port
    #[builder(default = "11434")]
    #[serde(default = "default_port")]
    pub port: u16,

    /// Use HTTPS instead of HTTP
    #[builder(default)]
    #[serde(default)]
    pub use_ssl: bool,

    /// Bearer token
    #[builder(default, setter(into, strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Basic-auth user name
    #[builder(default, setter(into, strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Basic-auth password
    #[builder(default, setter(into, strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Per-request timeout in seconds
    #[builder(default = "30.0")]
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,

    /// Additional attempts after the first on transient faults
    #[builder(default = "3")]
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay of the exponential backoff, in seconds
    #[builder(default = "1.0")]
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: f64,

    /// Requests allowed in flight at once
    #[builder(default = "4")]
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    /// Requests allowed to wait for a slot
    #[builder(default = "16")]
    #[serde(default = "default_queue_size")]
    pub request_queue_size: usize,

    /// Whether this configuration is in service
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub is_active: bool,

    /// Outcome of the most recent health check
    #[builder(default)]
    #[serde(default)]
    pub is_healthy: bool,

    /// When the most recent health check ran
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_health_check: Option<DateTime<Utc>>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    11434
}

fn default_timeout() -> f64 {
    30.0
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> f64 {
    1.0
}

fn default_max_concurrent() -> usize {
    4
}

fn default_queue_size() -> usize {
    16
}

fn default_true() -> bool {
    true
}

impl ServerConfiguration {
    /// Scheme, host and port, without a trailing slash.
    pub fn base_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }

    /// Base delay of the retry backoff.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay_seconds)
    }

    /// Check the invariants every consumer relies on.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or host is empty, a timing is negative or
    /// non-finite, `max_concurrent_requests` is zero, or the queue is smaller
    /// than the pool.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::new("Server configuration name must not be empty"));
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::new(format!(
                "Server configuration '{}' has an empty host",
                self.name
            )));
        }
        if !self.timeout_seconds.is_finite() || self.timeout_seconds <= 0.0 {
            return Err(ConfigError::new(format!(
                "Server configuration '{}': timeout_seconds must be positive, got {}",
                self.name, self.timeout_seconds
            )));
        }
        if !self.retry_delay_seconds.is_finite() || self.retry_delay_seconds < 0.0 {
            return Err(ConfigError::new(format!(
                "Server configuration '{}': retry_delay_seconds must be non-negative, got {}",
                self.name, self.retry_delay_seconds
            )));
        }
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::new(format!(
                "Server configuration '{}': max_concurrent_requests must be positive",
                self.name
            )));
        }
        if self.request_queue_size < self.max_concurrent_requests {
            return Err(ConfigError::new(format!(
                "Server configuration '{}': request_queue_size ({}) must be at least max_concurrent_requests ({})",
                self.name, self.request_queue_size, self.max_concurrent_requests
            )));
        }
        Ok(())
    }

    /// Record the outcome of a health check.
    pub fn record_health(&mut self, healthy: bool, at: DateTime<Utc>) {
        self.is_healthy = healthy;
        self.last_health_check = Some(at);
    }
}
