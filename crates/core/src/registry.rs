//! Worker registry
//!
//! Gives each connecting worker a unique `worker-XXXXXXXX` name and tracks
//! when it was last heard from. A worker silent for longer than the worker
//! timeout is marked unavailable and removed by [`WorkerRegistry::remove_stale`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;
use rand::distributions::Alphanumeric;
use tracing::{info, warn};

const NAME_PREFIX: &str = "worker-";
const NAME_SUFFIX_LEN: usize = 8;

/// Default silence after which a worker is dropped
pub const DEFAULT_WORKER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Worker {
    pub name: String,
    /// Where the worker connected from (thread name, address, ...)
    pub label: String,
    pub available: bool,
    pub last_ping: Instant,
}

#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: HashMap<String, Worker>,
}

fn random_name() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NAME_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("{}{}", NAME_PREFIX, suffix)
}

impl WorkerRegistry {
    pub fn new() -> Self {
        WorkerRegistry::default()
    }

    /// Register a new worker and return its name
    pub fn register(&mut self, label: &str) -> String {
        let mut name = random_name();
        while self.workers.contains_key(&name) {
            name = random_name();
        }

        self.workers.insert(
            name.clone(),
            Worker {
                name: name.clone(),
                label: label.to_string(),
                available: true,
                last_ping: Instant::now(),
            },
        );
        info!("Worker {:?} added at {}", name, label);
        name
    }

    /// Refresh a worker's last ping. Returns false for unknown workers.
    pub fn notify_ping(&mut self, name: &str) -> bool {
        match self.workers.get_mut(name) {
            Some(worker) => {
                worker.last_ping = Instant::now();
                worker.available = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_unavailable(&mut self, name: &str) -> bool {
        match self.workers.get_mut(name) {
            Some(worker) => {
                worker.available = false;
                true
            }
            None => false,
        }
    }

    /// Re-admit a worker that was dropped but is talking again
    pub fn reconnect(&mut self, name: &str) {
        self.workers.insert(
            name.to_string(),
            Worker {
                name: name.to_string(),
                label: "reconnected".to_string(),
                available: true,
                last_ping: Instant::now(),
            },
        );
        info!("Worker {:?} reconnected", name);
    }

    pub fn remove(&mut self, name: &str) -> Option<Worker> {
        let removed = self.workers.remove(name);
        if removed.is_some() {
            info!("Worker {:?} deleted", name);
        }
        removed
    }

    /// Remove every available worker not heard from within `timeout`.
    ///
    /// Workers that already left are kept so they still show up in stats.
    pub fn remove_stale(&mut self, timeout: Duration) -> Vec<Worker> {
        let stale: Vec<String> = self
            .workers
            .values()
            .filter(|w| w.available && w.last_ping.elapsed() > timeout)
            .map(|w| w.name.clone())
            .collect();

        stale
            .iter()
            .filter_map(|name| {
                warn!(
                    "Worker {} didn't notify its status in the last {:?}, disconnecting",
                    name, timeout
                );
                self.mark_unavailable(name);
                self.remove(name)
            })
            .collect()
    }

    /// All workers, sorted by name
    pub fn list(&self) -> Vec<&Worker> {
        let mut workers: Vec<_> = self.workers.values().collect();
        workers.sort_by(|a, b| a.name.cmp(&b.name));
        workers
    }
}
