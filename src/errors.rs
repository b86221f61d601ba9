// src/errors.rs

//! Crate-wide error types.
//!
//! - [`McpshareError`] covers configuration and service-level failures.
//! - [`ShareError`] is what callers of the share workflow see; every
//!   variant maps to a stable [`ShareErrorKind`] so a tool client can tell
//!   failures apart without parsing text.
//! - [`StartError`] describes why an external process could not be
//!   launched.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum McpshareError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, McpshareError>;

/// Failure to launch an external process.
#[derive(Error, Debug)]
pub enum StartError {
    #[error("executable not found: {program}")]
    NotFound { program: String },

    #[error("permission denied launching {program}")]
    PermissionDenied { program: String },

    #[error("could not capture stdout of {program}")]
    Pipe { program: String },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl StartError {
    /// Map an OS-level spawn error onto the start error taxonomy.
    pub fn from_spawn(program: &str, err: std::io::Error) -> Self {
        let program = program.to_string();
        match err.kind() {
            std::io::ErrorKind::NotFound => StartError::NotFound { program },
            std::io::ErrorKind::PermissionDenied => StartError::PermissionDenied { program },
            _ => StartError::Spawn {
                program,
                source: err,
            },
        }
    }
}

/// Errors returned by `start_share`, `stop_share` and the tool dispatcher.
#[derive(Error, Debug)]
pub enum ShareError {
    #[error("{0}")]
    InvalidName(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Server {0} is already being shared")]
    AlreadySharing(String),

    #[error("Failed to start share command: {source}")]
    StartFailed {
        name: String,
        #[source]
        source: StartError,
    },

    /// The process reported trouble on its own stdout; `output` is the
    /// captured text, verbatim.
    #[error("{output}")]
    ClassifiedFailure { name: String, output: String },

    #[error("Timeout waiting for share URL")]
    TimedOut { name: String, after: Duration },

    #[error("Server {0} is not currently shared")]
    NotSharing(String),

    #[error("Failed to stop sharing server {name}: {detail}")]
    KillFailed { name: String, detail: String },
}

/// Machine-readable discriminant of a [`ShareError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareErrorKind {
    InvalidName,
    InvalidRequest,
    AlreadySharing,
    StartFailed,
    ClassifiedFailure,
    TimedOut,
    NotSharing,
    KillFailed,
}

impl ShareError {
    pub fn kind(&self) -> ShareErrorKind {
        match self {
            ShareError::InvalidName(_) => ShareErrorKind::InvalidName,
            ShareError::InvalidRequest(_) => ShareErrorKind::InvalidRequest,
            ShareError::AlreadySharing(_) => ShareErrorKind::AlreadySharing,
            ShareError::StartFailed { .. } => ShareErrorKind::StartFailed,
            ShareError::ClassifiedFailure { .. } => ShareErrorKind::ClassifiedFailure,
            ShareError::TimedOut { .. } => ShareErrorKind::TimedOut,
            ShareError::NotSharing(_) => ShareErrorKind::NotSharing,
            ShareError::KillFailed { .. } => ShareErrorKind::KillFailed,
        }
    }
}

pub type ShareResult<T> = std::result::Result<T, ShareError>;
