//! Job board
//!
//! Splits `0..total_terms` into jobs of `term_size` terms, hands them to
//! workers, and folds returned partial sums into a running approximation.
//!
//! # Merge order
//!
//! Results are merged strictly by job id. A job that comes back early waits
//! until every lower id has been merged, so the final value does not depend
//! on which worker finished first:
//!
//! ```text
//!   completed:  [0] [1] [ ] [3]      next_merge = 2
//!   merged:      0 + 1               3 waits for 2
//! ```
//!
//! # Lost jobs
//!
//! When a worker leaves with jobs outstanding they are flagged `lost` and
//! handed to the next worker that asks, before any new range is cut. Ids and
//! term ranges of a lost job never change.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::RunConfig;
use crate::error::BoardError;
use crate::job::{Job, JobId};

/// Default number of terms per job
pub const DEFAULT_TERM_SIZE: u64 = 5_000;

/// Adaptive term size never shrinks below this
pub const MIN_TERM_SIZE: u64 = 10;

/// Default round trip above which a job counts as slow
pub const DEFAULT_SLOW_JOB: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct JobBoard {
    jobs: BTreeMap<JobId, Job>,
    total_terms: u64,
    term_size: u64,
    /// First term not yet handed out
    last_term: u64,
    /// Id the next new job will get
    last_job_id: JobId,
    /// Lowest id not yet merged
    next_merge: JobId,
    pi: f64,
    /// Lost jobs handed out again
    reassigned: u64,
    reduce_term_size: bool,
    slow_job: Duration,
}

impl JobBoard {
    /// Create a board for `total_terms` terms cut into `term_size` chunks.
    ///
    /// A `term_size` of 0 is treated as 1.
    pub fn new(total_terms: u64, term_size: u64) -> Self {
        JobBoard {
            jobs: BTreeMap::new(),
            total_terms,
            term_size: term_size.max(1),
            last_term: 0,
            last_job_id: 0,
            next_merge: 0,
            pi: 0.0,
            reassigned: 0,
            reduce_term_size: true,
            slow_job: DEFAULT_SLOW_JOB,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        JobBoard::new(config.total_terms(), config.term_size)
            .with_reduce_term_size(config.reduce_term_size)
            .with_slow_job(config.slow_job())
    }

    /// Enable or disable shrinking the term size after slow jobs
    pub fn with_reduce_term_size(mut self, enabled: bool) -> Self {
        self.reduce_term_size = enabled;
        self
    }

    /// Set the round trip that counts as slow
    pub fn with_slow_job(mut self, slow_job: Duration) -> Self {
        self.slow_job = slow_job;
        self
    }

    /// Hand a job to `worker`.
    ///
    /// Lost jobs go out first, lowest id first. Returns `None` once every
    /// term has been handed out and nothing is lost.
    pub fn assign(&mut self, worker: &str) -> Option<Job> {
        if let Some(job) = self.jobs.values_mut().find(|job| job.lost) {
            job.lost = false;
            job.worker = worker.to_string();
            job.sent_at = Instant::now();
            self.reassigned += 1;
            info!("Gave lost job {} to worker {}", job.id, worker);
            return Some(job.clone());
        }

        if self.last_term >= self.total_terms {
            return None;
        }

        let num_terms = self.term_size.min(self.total_terms - self.last_term);
        let job = Job::new(self.last_job_id, worker, self.last_term, num_terms);
        debug!(
            "Gave new job [id={}] to worker {}: terms {}..{}",
            job.id,
            worker,
            job.first_term,
            job.first_term + num_terms
        );

        self.last_job_id += 1;
        self.last_term += num_terms;
        self.jobs.insert(job.id, job.clone());
        Some(job)
    }

    /// Record the partial sum of job `id` and merge whatever is ready.
    pub fn complete(&mut self, id: JobId, result: f64) -> Result<(), BoardError> {
        let job = self.jobs.get_mut(&id).ok_or(BoardError::UnknownJob(id))?;
        if job.completed {
            return Err(BoardError::AlreadyCompleted(id));
        }

        job.completed = true;
        job.lost = false;
        job.returned_at = Some(Instant::now());
        job.result = Some(result);
        debug!("Job {} completed by {}", id, job.worker);

        self.merge_ready();
        Ok(())
    }

    /// Fold every consecutive completed job starting at `next_merge`
    fn merge_ready(&mut self) {
        let mut last_round_trip = None;
        let mut merged = 0usize;

        loop {
            let Some(job) = self.jobs.get_mut(&self.next_merge) else {
                break;
            };
            if !job.completed {
                break;
            }
            let Some(result) = job.result else {
                break;
            };

            self.pi += result;
            job.merged = true;
            last_round_trip = job.round_trip();
            self.next_merge += 1;
            merged += 1;
        }

        if merged == 0 {
            return;
        }
        debug!(
            "Merged {} job(s), next merge is job {}",
            merged, self.next_merge
        );

        if let Some(round_trip) = last_round_trip {
            self.maybe_reduce_term_size(round_trip);
        }
    }

    fn maybe_reduce_term_size(&mut self, round_trip: Duration) {
        if !self.reduce_term_size || round_trip < self.slow_job || self.term_size <= MIN_TERM_SIZE
        {
            return;
        }

        self.term_size = (self.term_size - self.term_size / 10).max(MIN_TERM_SIZE);
        info!("TermSize reduced to {}", self.term_size);
    }

    /// Flag every uncompleted job owned by `worker` as lost.
    ///
    /// Returns how many jobs were flagged.
    pub fn forget_jobs_of(&mut self, worker: &str) -> usize {
        let mut count = 0;
        for job in self.jobs.values_mut() {
            if !job.completed && !job.lost && job.worker == worker {
                job.lost = true;
                count += 1;
                info!("Job {} of {} marked as lost.", job.id, worker);
            }
        }
        count
    }

    /// Every term handed out and every job merged
    pub fn is_finished(&self) -> bool {
        self.last_term >= self.total_terms && self.next_merge == self.last_job_id
    }

    /// Sum of all merged jobs so far
    pub fn approximation(&self) -> f64 {
        self.pi
    }

    pub fn reassigned(&self) -> u64 {
        self.reassigned
    }

    pub fn term_size(&self) -> u64 {
        self.term_size
    }

    pub fn total_terms(&self) -> u64 {
        self.total_terms
    }

    /// Jobs in id order
    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{approximate, partial_sum};
    use std::f64::consts::PI;

    fn drain(board: &mut JobBoard, worker: &str) -> Vec<Job> {
        std::iter::from_fn(|| board.assign(worker)).collect()
    }

    #[test]
    fn test_jobs_tile_all_terms() {
        let mut board = JobBoard::new(23, 5).with_reduce_term_size(false);
        let jobs = drain(&mut board, "worker-a");

        let ranges: Vec<_> = jobs.iter().map(|j| j.terms()).collect();
        assert_eq!(ranges, vec![0..5, 5..10, 10..15, 15..20, 20..23]);
        let ids: Vec<_> = jobs.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert!(board.assign("worker-b").is_none());
    }

    #[test]
    fn test_zero_terms_is_finished_immediately() {
        let mut board = JobBoard::new(0, 5);
        assert!(board.is_finished());
        assert!(board.assign("worker-a").is_none());
        assert_eq!(board.approximation(), 0.0);
    }

    #[test]
    fn test_zero_term_size_is_clamped() {
        let mut board = JobBoard::new(3, 0).with_reduce_term_size(false);
        assert_eq!(drain(&mut board, "worker-a").len(), 3);
    }

    #[test]
    fn test_in_order_completion_matches_direct_sum() {
        let mut board = JobBoard::new(10_000, DEFAULT_TERM_SIZE);
        for job in drain(&mut board, "worker-a") {
            board.complete(job.id, job.compute()).unwrap();
        }

        assert!(board.is_finished());
        assert_eq!(board.approximation(), approximate(10_000));
        assert!(board.approximation() == PI);
    }

    #[test]
    fn test_out_of_order_completion_is_deterministic() {
        let mut forward = JobBoard::new(200, 4).with_reduce_term_size(false);
        let mut backward = JobBoard::new(200, 4).with_reduce_term_size(false);

        for job in drain(&mut forward, "worker-a") {
            forward.complete(job.id, job.compute()).unwrap();
        }
        let mut jobs = drain(&mut backward, "worker-b");
        jobs.reverse();
        for job in jobs {
            backward.complete(job.id, job.compute()).unwrap();
        }

        assert!(forward.is_finished());
        assert!(backward.is_finished());
        assert_eq!(
            forward.approximation().to_bits(),
            backward.approximation().to_bits()
        );
        assert!((backward.approximation() - PI).abs() < 1e-15);
    }

    #[test]
    fn test_merge_waits_for_lower_ids() {
        let mut board = JobBoard::new(15, 5).with_reduce_term_size(false);
        let jobs = drain(&mut board, "worker-a");

        board.complete(1, jobs[1].compute()).unwrap();
        assert_eq!(board.approximation(), 0.0);
        assert!(!board.job(1).unwrap().merged);

        board.complete(0, jobs[0].compute()).unwrap();
        assert!(board.job(0).unwrap().merged);
        assert!(board.job(1).unwrap().merged);
        assert_eq!(
            board.approximation(),
            jobs[0].compute() + jobs[1].compute()
        );
        assert!(!board.is_finished());
    }

    #[test]
    fn test_complete_unknown_job() {
        let mut board = JobBoard::new(10, 5);
        assert_eq!(board.complete(7, 1.0), Err(BoardError::UnknownJob(7)));
    }

    #[test]
    fn test_complete_twice() {
        let mut board = JobBoard::new(10, 5);
        let job = board.assign("worker-a").unwrap();
        board.complete(job.id, job.compute()).unwrap();
        assert_eq!(
            board.complete(job.id, job.compute()),
            Err(BoardError::AlreadyCompleted(job.id))
        );
        assert_eq!(board.approximation(), partial_sum(0, 5));
    }

    #[test]
    fn test_lost_jobs_are_reassigned_first() {
        let mut board = JobBoard::new(30, 5).with_reduce_term_size(false);
        let a1 = board.assign("worker-a").unwrap();
        let b1 = board.assign("worker-b").unwrap();
        let a2 = board.assign("worker-a").unwrap();
        board.complete(a1.id, a1.compute()).unwrap();

        assert_eq!(board.forget_jobs_of("worker-a"), 1);
        assert!(board.job(a2.id).unwrap().lost);
        assert!(!board.job(b1.id).unwrap().lost);

        let reassigned = board.assign("worker-c").unwrap();
        assert_eq!(reassigned.id, a2.id);
        assert_eq!(reassigned.terms(), a2.terms());
        assert_eq!(reassigned.worker, "worker-c");
        assert!(!reassigned.lost);
        assert_eq!(board.reassigned(), 1);

        // With nothing lost, new ranges resume after the last one cut
        let fresh = board.assign("worker-c").unwrap();
        assert_eq!(fresh.first_term, 15);
    }

    #[test]
    fn test_forget_is_idempotent() {
        let mut board = JobBoard::new(10, 5);
        board.assign("worker-a").unwrap();
        assert_eq!(board.forget_jobs_of("worker-a"), 1);
        assert_eq!(board.forget_jobs_of("worker-a"), 0);
        assert_eq!(board.forget_jobs_of("worker-z"), 0);
    }

    #[test]
    fn test_lost_job_completes_to_same_value() {
        let mut board = JobBoard::new(40, 8).with_reduce_term_size(false);
        let jobs = drain(&mut board, "worker-a");
        board.forget_jobs_of("worker-a");
        for _ in &jobs {
            let job = board.assign("worker-b").unwrap();
            board.complete(job.id, job.compute()).unwrap();
        }

        assert!(board.is_finished());
        let direct = jobs.iter().fold(0.0, |acc, j| acc + j.compute());
        assert_eq!(board.approximation(), direct);
    }

    #[test]
    fn test_slow_jobs_reduce_term_size() {
        let mut board = JobBoard::new(1_000_000, 100).with_slow_job(Duration::ZERO);

        let job = board.assign("worker-a").unwrap();
        board.complete(job.id, job.compute()).unwrap();
        assert_eq!(board.term_size(), 90);

        let job = board.assign("worker-a").unwrap();
        assert_eq!(job.num_terms, 90);
        board.complete(job.id, job.compute()).unwrap();
        assert_eq!(board.term_size(), 81);
    }

    #[test]
    fn test_term_size_floor() {
        let mut board = JobBoard::new(1_000_000, 11).with_slow_job(Duration::ZERO);
        for _ in 0..5 {
            let job = board.assign("worker-a").unwrap();
            board.complete(job.id, job.compute()).unwrap();
        }
        assert_eq!(board.term_size(), MIN_TERM_SIZE);
    }

    #[test]
    fn test_fast_jobs_keep_term_size() {
        let mut board = JobBoard::new(1_000, 100).with_slow_job(Duration::from_secs(3600));
        let job = board.assign("worker-a").unwrap();
        board.complete(job.id, job.compute()).unwrap();
        assert_eq!(board.term_size(), 100);
    }

    #[test]
    fn test_reduction_disabled() {
        let mut board = JobBoard::new(1_000, 100)
            .with_slow_job(Duration::ZERO)
            .with_reduce_term_size(false);
        let job = board.assign("worker-a").unwrap();
        board.complete(job.id, job.compute()).unwrap();
        assert_eq!(board.term_size(), 100);
    }
}
