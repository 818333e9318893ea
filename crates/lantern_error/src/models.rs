//! Model registry errors.

/// Model registry error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ModelsErrorKind {
    /// No descriptor registered under this name
    #[display("Model not found: {}", _0)]
    NotFound(String),

    /// A descriptor with this name is already registered
    #[display("Model already registered: {}", _0)]
    Duplicate(String),

    /// Descriptor failed validation
    #[display("Invalid model descriptor: {}", _0)]
    InvalidDescriptor(String),
}

/// Model registry error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Models Error: {} at {}:{}", kind, file, line)]
pub struct ModelsError {
    /// The specific error kind
    pub kind: ModelsErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// Source file where error occurred
    pub file: &'static str,
}

impl ModelsError {
    /// Create a new models error.
    #[track_caller]
    pub fn new(kind: ModelsErrorKind) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Result type for model registry operations.
pub type ModelsResult<T> = Result<T, ModelsError>;
