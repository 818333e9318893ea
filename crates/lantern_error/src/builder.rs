//! Errors raised by derive_builder `build()` calls.

/// Why a builder refused to build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum BuilderErrorKind {
    /// A required field was never set
    #[display("Missing required field: {}", _0)]
    MissingField(String),

    /// A field value was rejected
    #[display("Invalid value: {}", _0)]
    Invalid(String),
}

/// Builder error with location tracking.
///
/// Builders in `lantern_core` return this from `build()`, so `?` lifts a
/// half-filled request straight into [`LanternError`](crate::LanternError).
///
/// # Examples
///
/// ```
/// use lantern_error::{BuilderError, BuilderErrorKind, LanternError, LanternErrorKind};
///
/// let err: BuilderError = derive_builder::UninitializedFieldError::new("prompt").into();
/// assert_eq!(err.kind(), &BuilderErrorKind::MissingField("prompt".into()));
///
/// let err: LanternError = err.into();
/// assert!(matches!(err.kind(), LanternErrorKind::Builder(_)));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Builder Error: {} at line {} in {}", kind, line, file)]
pub struct BuilderError {
    kind: BuilderErrorKind,
    line: u32,
    file: &'static str,
}

impl BuilderError {
    /// Create a new builder error with caller location tracking.
    #[track_caller]
    pub fn new(kind: BuilderErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &BuilderErrorKind {
        &self.kind
    }
}

impl From<derive_builder::UninitializedFieldError> for BuilderError {
    #[track_caller]
    fn from(err: derive_builder::UninitializedFieldError) -> Self {
        Self::new(BuilderErrorKind::MissingField(err.field_name().to_string()))
    }
}

impl From<String> for BuilderError {
    #[track_caller]
    fn from(msg: String) -> Self {
        Self::new(BuilderErrorKind::Invalid(msg))
    }
}
