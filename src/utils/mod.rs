//! Shared utilities

pub mod error;

pub use error::{ConfigError, FailureKind, RecorderError, RecorderResult};
