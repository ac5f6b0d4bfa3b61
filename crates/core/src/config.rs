//! Run configuration
//!
//! Defaults reproduce the plain three-line run: 10 000 iterations summed
//! directly. A TOML file may override any field:
//!
//! ```toml
//! iterations = 10000
//! workers = 4
//! term_size = 500
//! reduce_term_size = true
//! slow_job_ms = 10000
//! worker_timeout_ms = 10000
//! ```
//!
//! Values given on the command line are applied on top with the builder
//! methods.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::board::{DEFAULT_SLOW_JOB, DEFAULT_TERM_SIZE};
use crate::error::ConfigError;
use crate::registry::DEFAULT_WORKER_TIMEOUT;
use crate::series::DEFAULT_ITERATIONS;

/// Upper bound on worker threads for a pool run
pub const MAX_WORKERS: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Number of series terms; zero or negative sums nothing
    pub iterations: i64,

    /// Worker threads for a pool run. 0 sums directly on the calling thread.
    pub workers: usize,

    /// Terms per job
    pub term_size: u64,

    /// Shrink `term_size` by a tenth after a slow job
    pub reduce_term_size: bool,

    /// Round trip in milliseconds that counts as a slow job
    pub slow_job_ms: u64,

    /// Silence in milliseconds after which a worker is dropped and its
    /// outstanding jobs are handed to others
    pub worker_timeout_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            iterations: DEFAULT_ITERATIONS,
            workers: 0,
            term_size: DEFAULT_TERM_SIZE,
            reduce_term_size: true,
            slow_job_ms: DEFAULT_SLOW_JOB.as_millis() as u64,
            worker_timeout_ms: DEFAULT_WORKER_TIMEOUT.as_millis() as u64,
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        RunConfig::default()
    }

    /// Parse and validate a TOML configuration
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn with_iterations(mut self, iterations: i64) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_term_size(mut self, term_size: u64) -> Self {
        self.term_size = term_size;
        self
    }

    pub fn with_reduce_term_size(mut self, enabled: bool) -> Self {
        self.reduce_term_size = enabled;
        self
    }

    pub fn with_slow_job(mut self, slow_job: Duration) -> Self {
        self.slow_job_ms = slow_job.as_millis() as u64;
        self
    }

    pub fn with_worker_timeout(mut self, timeout: Duration) -> Self {
        self.worker_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.term_size == 0 {
            return Err(ConfigError::Invalid(
                "term_size must be at least 1".to_string(),
            ));
        }
        if self.worker_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "worker_timeout_ms must be at least 1".to_string(),
            ));
        }
        if self.workers > MAX_WORKERS {
            return Err(ConfigError::Invalid(format!(
                "workers must be at most {}, got {}",
                MAX_WORKERS, self.workers
            )));
        }
        Ok(())
    }

    /// Number of terms to sum, with non-positive iteration counts as 0
    pub fn total_terms(&self) -> u64 {
        self.iterations.max(0) as u64
    }

    pub fn slow_job(&self) -> Duration {
        Duration::from_millis(self.slow_job_ms)
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_timeout_ms)
    }

    /// Whether this run goes through the worker pool
    pub fn uses_pool(&self) -> bool {
        self.workers > 0
    }
}
