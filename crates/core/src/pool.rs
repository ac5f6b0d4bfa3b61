//! In-process worker pool
//!
//! The calling thread acts as coordinator: it owns the [`JobBoard`] and the
//! [`WorkerRegistry`] and answers requests from scoped worker threads over a
//! single channel. Workers never touch the board directly.
//!
//! ```text
//!   worker-0 ──┐  Connect / Ask / Give / Leave
//!   worker-1 ──┼──────────────────────────────▶ coordinator (board, registry)
//!   worker-N ──┘ ◀────────────── reply channels (name, Option<Job>)
//! ```
//!
//! A worker that asks while every remaining job is out with someone else is
//! parked until a job turns up or the board is finished. Workers silent for
//! longer than the worker timeout are dropped from the registry and their
//! jobs are handed to whoever asks next. The run ends when every worker has
//! left and the request channel closes.

use std::mem;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use tracing::{debug, info, warn};

use crate::board::JobBoard;
use crate::config::RunConfig;
use crate::error::PoolError;
use crate::job::{Job, JobId};
use crate::registry::WorkerRegistry;
use crate::stats::Stats;

const MIN_TICK: Duration = Duration::from_millis(1);

enum Request {
    Connect {
        label: String,
        reply: Sender<String>,
    },
    Ask {
        worker: String,
        reply: Sender<Option<Job>>,
    },
    Give {
        worker: String,
        job: JobId,
        result: f64,
    },
    Leave {
        worker: String,
    },
}

/// Result of a pool run
#[derive(Debug, Clone)]
pub struct PoolOutcome {
    pub approximation: f64,
    pub stats: Stats,
}

/// Sum the series on `config.workers` threads (at least one).
pub fn run(config: &RunConfig) -> Result<PoolOutcome, PoolError> {
    run_with(config, work)
}

fn run_with<F>(config: &RunConfig, worker: F) -> Result<PoolOutcome, PoolError>
where
    F: Fn(String, Sender<Request>) -> Result<usize, PoolError> + Sync,
{
    config.validate()?;

    let worker_count = config.workers.max(1);
    let mut coordinator =
        Coordinator::new(JobBoard::from_config(config), config.worker_timeout());
    info!(
        "Starting pool: {} workers, {} terms, term size {}",
        worker_count,
        coordinator.board.total_terms(),
        coordinator.board.term_size()
    );

    let (requests, incoming) = unbounded();
    let worker = &worker;
    thread::scope(|scope| {
        let handles: Vec<_> = (0..worker_count)
            .map(|i| {
                let requests = requests.clone();
                scope.spawn(move || worker(format!("thread-{}", i), requests))
            })
            .collect();
        drop(requests);

        coordinator.serve(&incoming);

        for handle in handles {
            let done = handle.join().map_err(|_| PoolError::WorkerPanicked)??;
            debug!("Worker finished after {} job(s)", done);
        }
        Ok::<(), PoolError>(())
    })?;

    let Coordinator { board, registry, .. } = coordinator;
    if !board.is_finished() {
        return Err(PoolError::Disconnected);
    }

    let approximation = board.approximation();
    info!(
        "Pool finished: {:?} ({} job(s) reassigned)",
        approximation,
        board.reassigned()
    );
    Ok(PoolOutcome {
        approximation,
        stats: Stats::collect(&board, &registry),
    })
}

/// A worker waiting for a job to come back from someone else
struct Parked {
    worker: String,
    reply: Sender<Option<Job>>,
}

struct Coordinator {
    board: JobBoard,
    registry: WorkerRegistry,
    worker_timeout: Duration,
    parked: Vec<Parked>,
}

impl Coordinator {
    fn new(board: JobBoard, worker_timeout: Duration) -> Self {
        Coordinator {
            board,
            registry: WorkerRegistry::new(),
            worker_timeout,
            parked: Vec::new(),
        }
    }

    /// Serve requests until every worker has dropped its sender
    fn serve(&mut self, incoming: &Receiver<Request>) {
        let tick = (self.worker_timeout / 2).max(MIN_TICK);
        loop {
            match incoming.recv_timeout(tick) {
                Ok(request) => self.handle(request),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.drop_silent_workers();
            self.serve_parked();
        }
    }

    fn handle(&mut self, request: Request) {
        match request {
            Request::Connect { label, reply } => {
                let name = self.registry.register(&label);
                let _ = reply.send(name);
            }
            Request::Ask { worker, reply } => {
                self.heard_from(&worker);
                self.answer(worker, reply);
            }
            Request::Give {
                worker,
                job,
                result,
            } => {
                self.heard_from(&worker);
                if let Err(e) = self.board.complete(job, result) {
                    warn!("Ignoring result from {}: {}", worker, e);
                }
            }
            Request::Leave { worker } => {
                self.registry.mark_unavailable(&worker);
                let forgotten = self.board.forget_jobs_of(&worker);
                if forgotten > 0 {
                    warn!("{} left with {} job(s) outstanding", worker, forgotten);
                }
            }
        }
    }

    fn heard_from(&mut self, worker: &str) {
        if !self.registry.notify_ping(worker) {
            self.registry.reconnect(worker);
        }
    }

    /// Give `worker` a job, tell it the run is over, or park it
    fn answer(&mut self, worker: String, reply: Sender<Option<Job>>) {
        match self.board.assign(&worker) {
            Some(job) => {
                let id = job.id;
                if reply.send(Some(job)).is_err() {
                    warn!("{} hung up before receiving job {}", worker, id);
                    self.drop_worker(&worker);
                }
            }
            None if self.board.is_finished() => {
                let _ = reply.send(None);
            }
            None => self.parked.push(Parked { worker, reply }),
        }
    }

    fn drop_worker(&mut self, worker: &str) {
        self.registry.remove(worker);
        self.board.forget_jobs_of(worker);
    }

    fn drop_silent_workers(&mut self) {
        // Parked workers are blocked on us, not silent
        for parked in &self.parked {
            self.registry.notify_ping(&parked.worker);
        }

        for worker in self.registry.remove_stale(self.worker_timeout) {
            let forgotten = self.board.forget_jobs_of(&worker.name);
            if forgotten > 0 {
                warn!(
                    "{} dropped with {} job(s) outstanding",
                    worker.name, forgotten
                );
            }
        }
    }

    fn serve_parked(&mut self) {
        for parked in mem::take(&mut self.parked) {
            self.answer(parked.worker, parked.reply);
        }
    }
}

fn connect(label: String, requests: &Sender<Request>) -> Result<String, PoolError> {
    let (name_tx, name_rx) = bounded(1);
    requests
        .send(Request::Connect {
            label,
            reply: name_tx,
        })
        .map_err(|_| PoolError::Disconnected)?;
    let name = name_rx.recv().map_err(|_| PoolError::Disconnected)?;
    debug!("My name is: {}", name);
    Ok(name)
}

/// Worker loop: connect, then ask / compute / give until the run is over.
///
/// Returns the number of jobs computed.
fn work(label: String, requests: Sender<Request>) -> Result<usize, PoolError> {
    let name = connect(label, &requests)?;

    let (job_tx, job_rx) = bounded(1);
    let mut done = 0;
    loop {
        requests
            .send(Request::Ask {
                worker: name.clone(),
                reply: job_tx.clone(),
            })
            .map_err(|_| PoolError::Disconnected)?;

        let Some(job) = job_rx.recv().map_err(|_| PoolError::Disconnected)? else {
            break;
        };

        let result = job.compute();
        debug!(
            "{} computed job {} (terms {}..{})",
            name,
            job.id,
            job.first_term,
            job.first_term + job.num_terms
        );
        requests
            .send(Request::Give {
                worker: name.clone(),
                job: job.id,
                result,
            })
            .map_err(|_| PoolError::Disconnected)?;
        done += 1;
    }

    requests
        .send(Request::Leave { worker: name })
        .map_err(|_| PoolError::Disconnected)?;
    Ok(done)
}
