//! Top-level error wrapper types.

use crate::{BuilderError, ClientError, ConfigError, JobError, ModelsError};

/// Every error a Lantern operation can produce.
///
/// # Examples
///
/// ```
/// use lantern_error::{LanternError, ConfigError};
///
/// let err: LanternError = ConfigError::new("missing host").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum LanternErrorKind {
    /// Inference client error
    #[from(ClientError)]
    Client(ClientError),
    /// Model registry error
    #[from(ModelsError)]
    Models(ModelsError),
    /// Job lifecycle error
    #[from(JobError)]
    Job(JobError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Builder error
    #[from(BuilderError)]
    Builder(BuilderError),
}

/// Lantern error with kind discrimination.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Lantern Error: {}", _0)]
pub struct LanternError(Box<LanternErrorKind>);

impl LanternError {
    /// Create a new error from a kind.
    pub fn new(kind: LanternErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &LanternErrorKind {
        &self.0
    }
}

// Generic From implementation for any type that converts to LanternErrorKind
impl<T> From<T> for LanternError
where
    T: Into<LanternErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Lantern operations.
pub type LanternResult<T> = std::result::Result<T, LanternError>;
