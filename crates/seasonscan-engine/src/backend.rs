//! Scheduling backends: one tokio task set, or a pool of OS threads.
//!
//! Either way the lookups themselves are the same futures, and pacing comes
//! from the shared dispatch gate, not from the backend.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Mutex;

use anyhow::{Context, Result};
use futures_util::{StreamExt, stream};
use seasonscan_core::WorkQueue;
use serde::{Deserialize, Serialize};

/// How concurrent lookups are scheduled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// `N` OS threads pulling from a shared work queue
    ThreadPool,
    /// Single-threaded runtime, suspending only on network and delay waits
    #[default]
    Cooperative,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ThreadPool => "thread-pool",
            Self::Cooperative => "cooperative",
        })
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thread-pool" | "threadpool" | "threads" => Ok(Self::ThreadPool),
            "cooperative" | "async" => Ok(Self::Cooperative),
            other => Err(format!(
                "unknown backend {other:?} (expected thread-pool or cooperative)"
            )),
        }
    }
}

/// Owns the runtime (and thread pool) a run executes on.
pub struct Scheduler {
    backend: Backend,
    workers: usize,
    runtime: tokio::runtime::Runtime,
    pool: Option<rayon::ThreadPool>,
}

impl Scheduler {
    pub fn new(backend: Backend, workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let (runtime, pool) = match backend {
            Backend::Cooperative => {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .context("Failed to create tokio runtime")?;
                (rt, None)
            }
            Backend::ThreadPool => {
                // Runtime threads only drive timers and sockets; lookups run
                // on the pool threads via `Handle::block_on`.
                let rt = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(2)
                    .enable_all()
                    .build()
                    .context("Failed to create tokio runtime")?;
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("lookup-{i}"))
                    .build()
                    .context("Failed to create thread pool")?;
                (rt, Some(pool))
            }
        };
        Ok(Self {
            backend,
            workers,
            runtime,
            pool,
        })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run one future to completion on this scheduler's runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Apply `f` to every item with at most `workers` running at once.
    ///
    /// Results come back in completion order, not input order.
    pub fn run_all<'a, I, R, F, Fut>(&self, items: &'a [I], f: F) -> Vec<R>
    where
        I: Sync,
        R: Send,
        F: Fn(&'a I) -> Fut + Sync,
        Fut: Future<Output = R>,
    {
        match &self.pool {
            None => self.runtime.block_on(
                stream::iter(items)
                    .map(&f)
                    .buffer_unordered(self.workers)
                    .collect(),
            ),
            Some(pool) => {
                let queue = WorkQueue::new(items);
                let results = Mutex::new(Vec::with_capacity(items.len()));
                let handle = self.runtime.handle();
                let f = &f;
                pool.scope(|s| {
                    for _ in 0..self.workers {
                        s.spawn(|_| {
                            while let Some((_, item)) = queue.claim() {
                                let r = handle.block_on(f(item));
                                results.lock().expect("worker thread panicked").push(r);
                            }
                        });
                    }
                });
                results.into_inner().expect("worker thread panicked")
            }
        }
    }
}
