//! Error types for the Lantern inference layer.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use lantern_error::{ClientError, ClientErrorKind, LanternResult};
//!
//! fn probe() -> LanternResult<()> {
//!     Err(ClientError::new(ClientErrorKind::Connection("refused".into())))?
//! }
//!
//! assert!(probe().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod client;
mod config;
mod error;
mod jobs;
mod models;

pub use builder::{BuilderError, BuilderErrorKind};
pub use client::{ClientError, ClientErrorKind, ClientResult, RetryableError};
pub use config::{ConfigError, ConfigResult};
pub use error::{LanternError, LanternErrorKind, LanternResult};
pub use jobs::{JobError, JobErrorKind, JobResult};
pub use models::{ModelsError, ModelsErrorKind, ModelsResult};
