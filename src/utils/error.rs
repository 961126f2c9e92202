//! Error types and handling
//!
//! Every failure a camera session can hit is terminal for that session only,
//! so each variant carries the label of the camera it belongs to.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Recording pipeline error type
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("could not open camera {label} (device {device_index}): {reason}")]
    DeviceOpenFailed {
        label: u32,
        device_index: u32,
        reason: String,
    },

    #[error("frame capture failed on camera {label}: {reason}")]
    FrameReadFailed { label: u32, reason: String },

    #[error("could not create segment {path} for camera {label}: {reason}")]
    SegmentCreateFailed {
        label: u32,
        path: PathBuf,
        reason: String,
    },

    #[error("write to segment failed on camera {label}: {reason}")]
    SegmentWriteFailed { label: u32, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecorderError {
    /// Diagnostic class of this failure
    pub fn kind(&self) -> FailureKind {
        match self {
            RecorderError::DeviceOpenFailed { .. } => FailureKind::OpenFailed,
            RecorderError::FrameReadFailed { .. } => FailureKind::ReadFailed,
            RecorderError::SegmentCreateFailed { .. } | RecorderError::Io(_) => {
                FailureKind::CreateFailed
            }
            RecorderError::SegmentWriteFailed { .. } => FailureKind::WriteFailed,
        }
    }
}

/// Reason class reported when a session fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    OpenFailed,
    ReadFailed,
    CreateFailed,
    WriteFailed,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::OpenFailed => "open-failed",
            FailureKind::ReadFailed => "read-failed",
            FailureKind::CreateFailed => "create-failed",
            FailureKind::WriteFailed => "write-failed",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias using RecorderError
pub type RecorderResult<T> = Result<T, RecorderError>;
