//! Run statistics
//!
//! A serializable snapshot of the board and registry. JSON key names follow
//! the calculator dashboard (`termSize`, `pi_decimals`, `start_term`, ...).

use serde::Serialize;

use crate::board::JobBoard;
use crate::job::{Job, JobId};
use crate::registry::{Worker, WorkerRegistry};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub server: ServerStats,
    pub pi: PiStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerStats {
    #[serde(rename = "termSize")]
    pub term_size: u64,
    #[serde(rename = "totalTerms")]
    pub total_terms: u64,
    /// Lost jobs handed to another worker
    pub reassigned: u64,
    pub workers: Vec<WorkerStats>,
    pub jobs: Vec<JobStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PiStats {
    pub pi: String,
    #[serde(rename = "pi_decimals")]
    pub decimal_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerStats {
    pub id: String,
    pub label: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStats {
    pub id: JobId,
    pub worker: String,
    pub completed: bool,
    pub merged: bool,
    pub lost: bool,
    pub start_term: u64,
    pub num_terms: u64,
    /// Send to return, absent while the job is outstanding
    pub elapsed_ms: Option<u64>,
}

impl From<&Job> for JobStats {
    fn from(job: &Job) -> Self {
        JobStats {
            id: job.id,
            worker: job.worker.clone(),
            completed: job.completed,
            merged: job.merged,
            lost: job.lost,
            start_term: job.first_term,
            num_terms: job.num_terms,
            elapsed_ms: job.round_trip().map(|d| d.as_millis() as u64),
        }
    }
}

impl From<&Worker> for WorkerStats {
    fn from(worker: &Worker) -> Self {
        WorkerStats {
            id: worker.name.clone(),
            label: worker.label.clone(),
            active: worker.available,
        }
    }
}

impl PiStats {
    /// Same digits as the printed approximation line
    pub fn new(value: f64) -> Self {
        let pi = format!("{:?}", value);
        let decimal_count = decimal_count(&pi);
        PiStats { pi, decimal_count }
    }
}

impl Stats {
    /// Snapshot the board's jobs and approximation plus the registered workers
    pub fn collect(board: &JobBoard, registry: &WorkerRegistry) -> Self {
        Stats {
            server: ServerStats {
                term_size: board.term_size(),
                total_terms: board.total_terms(),
                reassigned: board.reassigned(),
                workers: registry.list().into_iter().map(WorkerStats::from).collect(),
                jobs: board.jobs().map(JobStats::from).collect(),
            },
            pi: PiStats::new(board.approximation()),
        }
    }

    /// Stats for a direct summation that never went through a board
    pub fn direct(total_terms: u64, value: f64) -> Self {
        Stats {
            server: ServerStats {
                term_size: total_terms,
                total_terms,
                reassigned: 0,
                workers: Vec::new(),
                jobs: Vec::new(),
            },
            pi: PiStats::new(value),
        }
    }

    pub fn merged_jobs(&self) -> usize {
        self.server.jobs.iter().filter(|j| j.merged).count()
    }

    pub fn lost_jobs(&self) -> usize {
        self.server.jobs.iter().filter(|j| j.lost).count()
    }
}

/// Number of digits after the decimal point in a fixed-notation number
pub fn decimal_count(text: &str) -> usize {
    text.split_once('.')
        .map(|(_, fraction)| fraction.chars().take_while(|c| c.is_ascii_digit()).count())
        .unwrap_or(0)
}
