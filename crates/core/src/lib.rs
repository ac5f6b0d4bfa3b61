//! BBP Core: π from the Bailey-Borwein-Plouffe series in double precision
//!
//! The whole computation is [`series::approximate`]. Everything else splits
//! the same sum into jobs so it can be spread over worker threads and
//! reported on.
//!
//! # Modules
//!
//! - `series`: the series terms, partial sums and the direct approximation
//! - `job`: a contiguous range of terms owned by one worker
//! - `board`: hands out jobs and merges their partial sums in id order
//! - `registry`: names and tracks workers
//! - `pool`: coordinator plus scoped worker threads driving a board
//! - `stats`: serializable snapshot of a run
//! - `report`: the three result lines and the `BBPI_REPORT` statistics sink
//! - `config`: `RunConfig` defaults, TOML loading and validation
//! - `error`: error enums for the surfaces above

pub mod board;
pub mod config;
pub mod error;
pub mod job;
pub mod pool;
pub mod registry;
pub mod report;
pub mod series;
pub mod stats;

pub use board::JobBoard;
pub use config::RunConfig;
pub use error::{BoardError, ConfigError, PoolError, ReportError};
pub use job::{Job, JobId};
pub use pool::PoolOutcome;
pub use registry::WorkerRegistry;
pub use report::{Comparison, ReportConfig};
pub use series::{DEFAULT_ITERATIONS, approximate, partial_sum, term};
pub use stats::Stats;
