//! Error types
//!
//! The series itself cannot fail. These cover the surfaces around it:
//! configuration loading, the job board, the worker pool and the report sink.

use std::path::PathBuf;

use thiserror::Error;

use crate::job::JobId;

/// Errors loading or validating a [`RunConfig`](crate::RunConfig)
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors returned by the [`JobBoard`](crate::JobBoard)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("job {0} not found")]
    UnknownJob(JobId),

    #[error("job {0} was already completed")]
    AlreadyCompleted(JobId),
}

/// Errors from a pool run
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("worker thread panicked")]
    WorkerPanicked,

    #[error("coordinator channel closed before the run finished")]
    Disconnected,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors writing a statistics report
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}
