//! A job is a contiguous range of series terms owned by one worker

use std::ops::Range;
use std::time::{Duration, Instant};

use crate::series::partial_sum;

/// Sequential job identifier, starting at 0
pub type JobId = u64;

#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    /// Name of the worker currently owning the job
    pub worker: String,
    pub first_term: u64,
    pub num_terms: u64,
    pub sent_at: Instant,
    pub returned_at: Option<Instant>,
    pub completed: bool,
    /// Result has been folded into the board's approximation
    pub merged: bool,
    /// Owner left before returning a result; the job will be handed out again
    pub lost: bool,
    pub result: Option<f64>,
}

impl Job {
    pub(crate) fn new(id: JobId, worker: &str, first_term: u64, num_terms: u64) -> Self {
        Job {
            id,
            worker: worker.to_string(),
            first_term,
            num_terms,
            sent_at: Instant::now(),
            returned_at: None,
            completed: false,
            merged: false,
            lost: false,
            result: None,
        }
    }

    /// Term indices covered by this job
    pub fn terms(&self) -> Range<u64> {
        self.first_term..self.first_term.saturating_add(self.num_terms)
    }

    /// Compute this job's partial sum
    pub fn compute(&self) -> f64 {
        partial_sum(self.first_term, self.num_terms)
    }

    /// Time between the job being sent and its result coming back
    pub fn round_trip(&self) -> Option<Duration> {
        self.returned_at
            .map(|returned| returned.saturating_duration_since(self.sent_at))
    }
}
